// Allow uninlined format args for cleaner bail!/anyhow! macros
#![allow(clippy::uninlined_format_args)]
#![doc = include_str!("../README.md")]

pub mod archive;
pub mod bundler;
pub mod control_plane;
pub mod deploy;
pub mod entrypoint;
pub mod error;
pub mod limits;
pub mod manifest;
pub mod project_config;
pub mod source_store;

#[macro_use]
extern crate lazy_static;

pub use bundler::BundleArtifact;
pub use control_plane::{ApiError, ControlPlane};
pub use deploy::{deploy, DeployRequest, DeploySummary};
pub use error::{DeployError, ErrorCode};
pub use manifest::DeploymentManifest;
pub use serde_json;
