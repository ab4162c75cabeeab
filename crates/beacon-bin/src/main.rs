//! Beacon - capture and ship telemetry events from the command line.

mod commands;
mod input;

use std::path::PathBuf;

use beacon_config_and_utils::{init_logging, Config, LogConfig, Paths};
use beacon_insights::{ExportFormat, Interval, TimeRange};
use clap::{Parser, Subcommand};
use tracing::debug;

/// Beacon command-line interface.
#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Capture, batch and deliver telemetry events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.beacon/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base directory for runtime files (identity, logs, exports). Defaults to ~/.beacon
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Analytics API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Capture without sending
    #[arg(long, global = true)]
    offline: bool,

    /// Log every tracked event
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Track one event and deliver it
    Track {
        /// Event type, e.g. page_view
        event_type: String,

        /// Property as key=value (value parsed as JSON when possible)
        #[arg(short, long = "prop", value_name = "KEY=VALUE")]
        props: Vec<String>,
    },
    /// Track events read as JSON lines from a file or stdin
    Replay {
        /// JSONL file with {"type": ..., "properties": {...}} per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Seconds to keep delivering after input ends
        #[arg(long, default_value = "10")]
        grace_secs: u64,
    },
    /// Download a historical export
    Export {
        #[arg(long, default_value = "7d")]
        range: TimeRange,

        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Directory to save into (defaults to ~/.beacon/exports)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print live aggregate metrics
    Realtime,
    /// Print a metric time series
    Metrics {
        #[arg(long, default_value = "page_views")]
        metric: String,

        #[arg(long, default_value = "24h")]
        range: TimeRange,

        #[arg(long, default_value = "hour")]
        interval: Interval,
    },
    /// Show the current session id
    Session {
        /// Start a new session
        #[arg(long)]
        reset: bool,
    },
    /// Attach a user id to future events
    Identify { user_id: String },
    /// Forget the user id
    Logout,
}

fn load_config(cli: &Cli, paths: &Paths) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load(paths)?,
    };

    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if cli.offline {
        config.offline_mode = true;
    }
    if cli.debug {
        config.debug = true;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match &cli.base_dir {
        Some(base) => Paths::with_base_dir(base.clone()),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    let config = load_config(&cli, &paths)?;

    init_logging(&LogConfig {
        service_name: "beacon".into(),
        default_level: config.log_level.clone(),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    })?;

    debug!(
        api_url = %config.api_base(),
        batch_size = config.batch_size,
        offline = config.offline_mode,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Track { event_type, props } => {
            commands::track(&config, &paths, &event_type, &props).await?;
        }
        Commands::Replay { file, grace_secs } => {
            commands::replay(&config, &paths, file, grace_secs).await?;
        }
        Commands::Export { range, format, out } => {
            let dir = out.unwrap_or_else(|| paths.exports_dir());
            commands::export(&config, range, format, &dir).await?;
        }
        Commands::Realtime => {
            commands::realtime(&config).await?;
        }
        Commands::Metrics {
            metric,
            range,
            interval,
        } => {
            commands::metrics(&config, &metric, range, interval).await?;
        }
        Commands::Session { reset } => {
            commands::session(&config, &paths, reset);
        }
        Commands::Identify { user_id } => {
            commands::identify(&config, &paths, &user_id)?;
        }
        Commands::Logout => {
            commands::logout(&config, &paths);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_track_with_props() {
        let cli = Cli::parse_from([
            "beacon", "--offline", "track", "page_view", "-p", "path=/home", "--prop", "n=3",
        ]);
        assert!(cli.offline);
        match cli.command {
            Commands::Track { event_type, props } => {
                assert_eq!(event_type, "page_view");
                assert_eq!(props, ["path=/home", "n=3"]);
            }
            _ => panic!("expected track"),
        }
    }

    #[test]
    fn parses_export_arguments() {
        let cli = Cli::parse_from(["beacon", "export", "--range", "30d", "--format", "xlsx"]);
        match cli.command {
            Commands::Export { range, format, out } => {
                assert_eq!(range, TimeRange::LastMonth);
                assert_eq!(format, ExportFormat::Xlsx);
                assert!(out.is_none());
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn rejects_unknown_range() {
        assert!(Cli::try_parse_from(["beacon", "export", "--range", "2w"]).is_err());
    }

    #[test]
    fn load_config_applies_flag_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let cli = Cli::parse_from([
            "beacon",
            "--api-url",
            "https://ingest.example.com/api",
            "--debug",
            "realtime",
        ]);

        let config = load_config(&cli, &paths).unwrap();
        assert_eq!(config.api_base_url, "https://ingest.example.com/api");
        assert!(config.debug);
    }

    #[test]
    fn load_config_rejects_bad_url_flag() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let cli = Cli::parse_from(["beacon", "--api-url", "not a url", "logout"]);

        assert!(load_config(&cli, &paths).is_err());
    }
}
