//! Subcommand implementations.

use crate::input::{parse_props, parse_replay_line};
use anyhow::{bail, Context};
use beacon_config_and_utils::{Config, Paths};
use beacon_insights::{ExportFormat, InsightsClient, Interval, TimeRange};
use beacon_outbox::{ShutdownReport, Tracker};
use beacon_storage::{create_identity_store, IdentityStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

/// Grace period for delivering a single tracked event on exit.
const TRACK_GRACE: Duration = Duration::from_secs(10);

fn open_identity(config: &Config, paths: &Paths) -> IdentityStore {
    create_identity_store(&paths.identity_file(), &config.app_name)
}

fn open_tracker(config: &Config, paths: &Paths) -> anyhow::Result<Tracker> {
    let identity = Arc::new(open_identity(config, paths));
    Ok(Tracker::from_config(config, identity)?)
}

fn print_report(report: &ShutdownReport, offline: bool) {
    if report.pending == 0 {
        return;
    }
    if offline {
        eprintln!("offline: {} event(s) not sent", report.pending);
    } else if report.timed_out {
        eprintln!("timed out: {} event(s) not sent", report.pending);
    } else {
        eprintln!("delivery failed: {} event(s) not sent", report.pending);
    }
}

/// Track one event and shut down, returning its id and what shutdown achieved.
pub async fn track(
    config: &Config,
    paths: &Paths,
    event_type: &str,
    props: &[String],
) -> anyhow::Result<(String, ShutdownReport)> {
    let properties = parse_props(props)?;
    let tracker = open_tracker(config, paths)?;

    let id = tracker.track_event(event_type, properties);
    let report = tracker.shutdown(TRACK_GRACE).await;

    println!("{id}");
    print_report(&report, config.offline_mode);
    Ok((id, report))
}

pub async fn replay(
    config: &Config,
    paths: &Paths,
    file: Option<PathBuf>,
    grace_secs: u64,
) -> anyhow::Result<()> {
    let reader: Box<dyn AsyncRead + Unpin + Send> = match &file {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(reader).lines();

    let tracker = open_tracker(config, paths)?;
    let mut tracked = 0usize;
    let mut skipped = 0usize;
    let mut line_no = 0usize;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                line_no += 1;
                match parse_replay_line(&line) {
                    Some(Ok(record)) => {
                        tracker.track_event(&record.event_type, record.properties);
                        tracked += 1;
                    }
                    Some(Err(e)) => {
                        warn!(line = line_no, error = %e, "Skipping replay line");
                        skipped += 1;
                    }
                    None => {}
                }
            }
            _ = &mut ctrl_c => {
                info!("Received shutdown signal, flushing...");
                break;
            }
        }
    }

    let report = tracker.shutdown(Duration::from_secs(grace_secs)).await;
    println!(
        "tracked {tracked}, skipped {skipped}, delivered {}, pending {}",
        report.delivered, report.pending
    );
    print_report(&report, config.offline_mode);
    Ok(())
}

pub async fn export(
    config: &Config,
    range: TimeRange,
    format: ExportFormat,
    dir: &Path,
) -> anyhow::Result<()> {
    let client = InsightsClient::from_config(config)?;
    let artifact = client.export_range(range, format).await?;
    let path = artifact.save_to(dir)?;
    println!("{}", path.display());
    Ok(())
}

pub async fn realtime(config: &Config) -> anyhow::Result<()> {
    let client = InsightsClient::from_config(config)?;
    let metrics = client.realtime().await?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

pub async fn metrics(
    config: &Config,
    metric: &str,
    range: TimeRange,
    interval: Interval,
) -> anyhow::Result<()> {
    let client = InsightsClient::from_config(config)?;
    let points = client.metrics(metric, range, interval).await?;
    println!("{}", serde_json::to_string_pretty(&points)?);
    Ok(())
}

pub fn session(config: &Config, paths: &Paths, reset: bool) {
    let identity = open_identity(config, paths);
    if reset {
        identity.reset_session();
    }
    let id = identity.get_or_create_session_id();
    println!("{id}");
    if let Some(origin) = identity.session_origin() {
        info!(session_id = %id, ?origin, "Session resolved");
    }
}

pub fn identify(config: &Config, paths: &Paths, user_id: &str) -> anyhow::Result<()> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        bail!("user id must not be empty");
    }
    if !open_identity(config, paths).set_user_id(user_id) {
        bail!("failed to store user id");
    }
    println!("identified as {user_id}");
    Ok(())
}

pub fn logout(config: &Config, paths: &Paths) {
    open_identity(config, paths).clear_user_id();
    println!("logged out");
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_config_and_utils::ids::is_valid_id;
    use beacon_outbox::EVENT_ID_PREFIX;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, Config, Paths) {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        (dir, Config::default(), paths)
    }

    #[test]
    fn identify_and_logout_round_trip_through_identity_file() {
        let (_dir, config, paths) = fixture();

        identify(&config, &paths, "user-7").unwrap();
        assert_eq!(
            open_identity(&config, &paths).get_user_id().as_deref(),
            Some("user-7")
        );

        logout(&config, &paths);
        assert_eq!(open_identity(&config, &paths).get_user_id(), None);
    }

    #[test]
    fn identify_rejects_blank_user() {
        let (_dir, config, paths) = fixture();
        assert!(identify(&config, &paths, "  ").is_err());
    }

    #[test]
    fn session_reset_changes_id() {
        let (_dir, config, paths) = fixture();

        let first = open_identity(&config, &paths).get_or_create_session_id();
        assert_eq!(open_identity(&config, &paths).get_or_create_session_id(), first);

        session(&config, &paths, true);
        assert_ne!(open_identity(&config, &paths).get_or_create_session_id(), first);
    }

    #[tokio::test]
    async fn offline_track_keeps_event_local() {
        let (_dir, mut config, paths) = fixture();
        config.offline_mode = true;

        let (id, report) = track(&config, &paths, "cli_test", &["n=1".to_string()])
            .await
            .unwrap();

        assert!(is_valid_id(&id, EVENT_ID_PREFIX));
        assert_eq!(
            report,
            ShutdownReport {
                delivered: 0,
                pending: 1,
                timed_out: false,
            }
        );
    }
}
