//! prefixsync core library — domain types, manifest loading, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes for relative paths and version strings
//! - [`error`] — [`ManifestError`]
//! - [`manifest`] — load / parse / validate the deployment manifest
//! - [`config`] — [`SyncConfig`], the per-run parameters

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;

pub use config::SyncConfig;
pub use error::ManifestError;
pub use manifest::{Group, Manifest, SubstitutionSpec};
pub use types::{RelPath, Version};
