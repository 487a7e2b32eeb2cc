//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

mod job_table;

pub mod image_job_repo;
pub mod script_job_repo;

pub use image_job_repo::ImageJobRepo;
pub use script_job_repo::ScriptJobRepo;
