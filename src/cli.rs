// s3-offload/src/cli.rs
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::config::{self, Config};
use crate::output::logging::{LogTarget, init_logging};
use crate::output::{LogSink, Output, Terminal, TracingSink};
use crate::upload;

/// Upload large files from a directory to an S3 bucket.
#[derive(Parser, Debug)]
#[command(
    name = "s3-offload",
    version,
    about = "Upload files above a size threshold from a directory to an S3 bucket"
)]
pub struct Cli {
    /// Directory to scan
    #[arg(long)]
    pub path: Option<String>,

    /// Minimum file size, e.g. 500k, 1m, 2Gi
    #[arg(long, value_name = "SIZE")]
    pub size_threshold: Option<String>,

    #[arg(long)]
    pub s3_region: Option<String>,

    #[arg(long)]
    pub s3_bucket: Option<String>,

    #[arg(long)]
    pub s3_key: Option<String>,

    #[arg(long)]
    pub s3_secret: Option<String>,

    /// Maximum number of files to upload, 0 for no limit
    #[arg(long)]
    pub limit: Option<i64>,

    /// Delete local files once they are uploaded or found up to date
    #[arg(long)]
    pub delete: bool,

    /// Skip files whose remote copy has the same size
    #[arg(long)]
    pub skip_up_to_date: bool,

    /// Log destination as [!]level:path, with level one of debug, info, error
    #[arg(long = "log", value_name = "[!]LEVEL:PATH")]
    pub log: Vec<String>,

    /// JSON configuration file, merged before command line options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the merged configuration to the --config file and exit
    #[arg(long, requires = "config")]
    pub dump_config: bool,

    /// Show debug messages on the console
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Options given on the command line, keyed like the configuration file.
    pub fn to_config_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let strings = [
            (config::PATH, &self.path),
            (config::SIZE_THRESHOLD, &self.size_threshold),
            (config::S3_REGION, &self.s3_region),
            (config::S3_BUCKET, &self.s3_bucket),
            (config::S3_KEY, &self.s3_key),
            (config::S3_SECRET, &self.s3_secret),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::from(value.as_str()));
            }
        }
        if let Some(limit) = self.limit {
            map.insert(config::LIMIT.to_string(), Value::from(limit));
        }
        // Absent flags leave file values alone.
        if self.delete {
            map.insert(config::DELETE.to_string(), Value::Bool(true));
        }
        if self.skip_up_to_date {
            map.insert(config::SKIP_UP_TO_DATE.to_string(), Value::Bool(true));
        }
        map
    }

    /// Console output, plus a tracing log sink when a subscriber layer will record it.
    fn output(&self, log_to_tracing: bool) -> Output {
        let log: Option<Box<dyn LogSink>> = if log_to_tracing {
            Some(Box::new(TracingSink))
        } else {
            None
        };
        Output::new(Some(Box::new(Terminal::new(self.verbose))), log)
            .mute_console_exceptions(true)
    }
}

/// Runs one invocation. `main` owns process exit.
pub async fn run(cli: Cli) -> Result<()> {
    let targets = cli
        .log
        .iter()
        .map(|notation| notation.parse::<LogTarget>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    init_logging(&targets).context("Failed to initialise logging")?;

    let output = cli.output(!targets.is_empty() || std::env::var_os("RUST_LOG").is_some());

    let mut config = Config::new();
    if let Some(path) = cli.config.as_deref().filter(|p| p.is_file()) {
        if let Err(e) = config.merge_json_file(path) {
            output.exception(&e);
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to load configuration from {}", path.display())));
        }
    }
    config.merge(&cli.to_config_map());

    if cli.dump_config {
        let path = cli
            .config
            .as_deref()
            .context("--dump-config needs a --config file to write to")?;
        if let Err(e) = config.write_json(path) {
            output.exception(&e);
            return Err(e.into());
        }
        output.success(format!("Configuration written to {}", path.display()));
        return Ok(());
    }

    let settings = match config.validate() {
        Ok(settings) => settings,
        Err(e) => {
            output.exception(&e);
            return Err(e.into());
        }
    };
    tracing::debug!(?settings, "Configuration validated");

    let summary = upload::run_upload_flow(settings, output)
        .await
        .context("Upload process failed")?;
    tracing::info!(
        uploaded = summary.uploaded,
        skipped = summary.skipped,
        deleted = summary.deleted,
        "Upload run finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_supplied_options_are_mapped() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "s3-offload",
            "--path",
            "/srv/media",
            "--size-threshold",
            "1m",
            "--limit",
            "5",
            "--delete",
        ])?;

        assert_eq!(
            Value::Object(cli.to_config_map()),
            json!({
                "path": "/srv/media",
                "size-threshold": "1m",
                "limit": 5,
                "delete": true,
            })
        );
        Ok(())
    }

    #[test]
    fn test_no_options_map_to_nothing() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["s3-offload"])?;
        assert!(cli.to_config_map().is_empty());
        Ok(())
    }

    #[test]
    fn test_cli_overrides_file_values() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "s3-offload",
            "--s3-bucket",
            "from-cli",
            "--skip-up-to-date",
        ])?;

        let mut config = Config::new();
        let file = json!({"s3-bucket": "from-file", "s3-region": "eu-west-1", "delete": true});
        config.merge(file.as_object().unwrap());
        config.merge(&cli.to_config_map());

        assert_eq!(config.get(config::S3_BUCKET)?.as_str(), Some("from-cli"));
        assert_eq!(config.get(config::S3_REGION)?.as_str(), Some("eu-west-1"));
        assert_eq!(config.get(config::DELETE)?.as_bool(), Some(true));
        assert_eq!(config.get(config::SKIP_UP_TO_DATE)?.as_bool(), Some(true));
        Ok(())
    }

    #[test]
    fn test_dump_config_requires_config() {
        let err = Cli::try_parse_from(["s3-offload", "--dump-config"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_log_sink_is_attached_only_when_requested() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["s3-offload"])?;
        assert!(!cli.output(false).has_log_sink());
        assert!(cli.output(true).has_log_sink());
        Ok(())
    }

    #[test]
    fn test_log_is_repeatable() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "s3-offload",
            "--log",
            "info:run.log",
            "--log",
            "!error:errors.log",
        ])?;
        assert_eq!(cli.log, vec!["info:run.log", "!error:errors.log"]);
        Ok(())
    }
}
