//! Artifact storage gateway.
//!
//! Persists raw uploads and derived artifacts across a ranked list of
//! [`StorageBackend`]s: the remote object-store gateway first, local disk
//! last. Every backend addresses files as `/uploads/<namespace>/<file>`,
//! and the gateway records which backend actually served each write.

pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod local;
pub mod remote;
pub mod s3;

pub use backend::StorageBackend;
pub use config::{BackendKind, StorageConfig};
pub use error::StorageError;
pub use gateway::{StorageGateway, StorageStats, StoredArtifact};
