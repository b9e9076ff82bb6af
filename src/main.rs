//! S3 large-file uploader
//!
//! Command line entry point; see `s3-offload --help`.

// s3-offload/src/main.rs
use clap::Parser;
use s3_offload::cli::{self, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
