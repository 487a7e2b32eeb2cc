//! Shared building blocks for the sketchbook conversion pipeline.
//!
//! Domain-agnostic types, the core error enum, environment configuration
//! helpers, artifact naming, and upload validation used by every other
//! crate in the workspace.

pub mod config;
pub mod error;
pub mod naming;
pub mod storage;
pub mod types;
pub mod upload;
