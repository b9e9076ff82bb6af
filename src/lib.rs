//! Upload large files from a local directory to Amazon S3.
//!
//! Configuration is merged from a JSON file and the command line, validated into
//! [`config::UploadSettings`], and handed to an [`upload::Uploader`] that scans for files
//! above a size threshold and pushes them to an [`upload::store::ObjectStore`].

// s3-offload/src/lib.rs
pub mod cli;
pub mod config;
pub mod errors;
pub mod output;
pub mod upload;

pub use errors::{AppError, Result};
