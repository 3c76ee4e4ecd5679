//! `feedbox` - CLI for offline-tolerant feedback
//!
//! This binary submits, lists and deletes feedback, and keeps the local
//! pending queue in sync with the remote store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::debug;

use feedbox::cli::{
    Cli, Command, ConfigCommand, DeleteCommand, ListCommand, StatusCommand, SubmitCommand,
    WatchCommand,
};
use feedbox::config::ConnectivityMode;
use feedbox::connectivity::spawn_probe;
use feedbox::feedback::search;
use feedbox::{
    init_logging, Config, ConnectivityMonitor, Deletion, FeedbackRecord, FlushReport,
    ReachabilityProbe, RestRemoteStore, SqliteQueueStore, Submission, SubmissionReconciler,
    TcpProbe,
};

/// Everything a command needs once configuration is loaded.
#[derive(Debug)]
struct App {
    config: Config,
    queue: Arc<SqliteQueueStore>,
    reconciler: Arc<SubmissionReconciler>,
    probe: Option<Arc<TcpProbe>>,
}

impl App {
    async fn open(config: Config, force_offline: bool) -> anyhow::Result<Self> {
        let queue = Arc::new(
            SqliteQueueStore::open(config.database_path(), config.queue.key.clone())
                .context("opening pending queue")?,
        );
        let remote = Arc::new(
            RestRemoteStore::new(config.rest_settings()?).context("building remote client")?,
        );
        let probe = TcpProbe::from_url(&config.remote_url()?, config.probe_timeout()).map(Arc::new);

        let monitor = if force_offline {
            ConnectivityMonitor::new(false)
        } else {
            match config.connectivity.mode {
                ConnectivityMode::Online => ConnectivityMonitor::new(true),
                ConnectivityMode::Offline => ConnectivityMonitor::new(false),
                ConnectivityMode::Auto => {
                    let probe = probe.as_deref().map(|p| p as &dyn ReachabilityProbe);
                    ConnectivityMonitor::detect(probe).await
                }
            }
        };
        debug!(online = monitor.is_online(), "Connectivity resolved");

        let reconciler = Arc::new(SubmissionReconciler::new(remote, queue.clone(), monitor));
        Ok(Self {
            config,
            queue,
            reconciler,
            probe,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Config commands must work even when the configuration is broken
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(cli.config, config_cmd),
        other => other,
    };

    let config = Config::load_from(cli.config).context("loading configuration")?;
    let app = App::open(config, cli.offline).await?;

    match command {
        Command::Submit(cmd) => handle_submit(&app, cmd).await,
        Command::List(cmd) => handle_list(&app, &cmd).await,
        Command::Delete(cmd) => handle_delete(&app, &cmd).await,
        Command::Flush(cmd) => handle_flush(&app, cmd.json).await,
        Command::Pending(cmd) => handle_pending(&app, cmd.json),
        Command::Watch(cmd) => handle_watch(&app, &cmd).await,
        Command::Status(cmd) => handle_status(&app, &cmd),
        Command::Config(_) => unreachable!("handled before configuration is loaded"),
    }
}

async fn handle_submit(app: &App, cmd: SubmitCommand) -> anyhow::Result<()> {
    let values = cmd.values().trimmed();
    values.validate()?;

    let submission = app.reconciler.create(values).await?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&submission)?);
        return Ok(());
    }

    match &submission {
        Submission::Committed(record) => println!("Feedback saved ({}).", record.id),
        Submission::Queued(record) => {
            println!("Offline: feedback queued ({}).", record.id);
            println!("It will be sent when the connection is back.");
        }
    }
    Ok(())
}

async fn handle_list(app: &App, cmd: &ListCommand) -> anyhow::Result<()> {
    let records = app.reconciler.get_all().await?;
    let pending_ids: HashSet<String> = app
        .reconciler
        .pending()
        .map(|queue| queue.into_iter().map(|r| r.id).collect())
        .unwrap_or_default();

    let mut matching = search(&records, cmd.search.as_deref().unwrap_or_default());
    if let Some(limit) = cmd.limit {
        matching.truncate(limit);
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&matching)?);
        return Ok(());
    }

    if matching.is_empty() {
        println!("No feedback found.");
        return Ok(());
    }
    for record in matching {
        print_record(record, pending_ids.contains(&record.id));
    }
    Ok(())
}

async fn handle_delete(app: &App, cmd: &DeleteCommand) -> anyhow::Result<()> {
    match app.reconciler.delete(&cmd.id).await? {
        Deletion::Pending => println!("Removed queued feedback {}.", cmd.id),
        Deletion::Remote => println!("Deleted feedback {}.", cmd.id),
    }
    Ok(())
}

async fn handle_flush(app: &App, json: bool) -> anyhow::Result<()> {
    let report = app.reconciler.flush_pending().await?;
    print_flush_report(&report, json)
}

fn handle_pending(app: &App, json: bool) -> anyhow::Result<()> {
    let pending = app.reconciler.pending()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!("No feedback waiting to be sent.");
        return Ok(());
    }
    println!("{} queued submission(s), oldest first:", pending.len());
    for record in &pending {
        print_record(record, true);
    }
    Ok(())
}

async fn handle_watch(app: &App, cmd: &WatchCommand) -> anyhow::Result<()> {
    let Some(probe) = app.probe.clone() else {
        bail!(
            "remote.url '{}' has no host to probe",
            app.config.remote.url
        );
    };
    let interval = cmd
        .interval
        .map_or_else(|| app.config.probe_interval(), Duration::from_millis);
    let monitor = app.reconciler.connectivity().clone();

    let printer = monitor.subscribe(|event| println!("Connectivity: {event}"));
    let (flush_id, flush_task) = app.reconciler.flush_on_reconnect();
    let (probe_handle, probe_task) = spawn_probe(monitor.clone(), probe.clone(), interval);

    println!(
        "Watching {} every {}ms (currently {}). Press Ctrl-C to stop.",
        probe.describe(),
        interval.as_millis(),
        if monitor.is_online() { "online" } else { "offline" }
    );

    if monitor.is_online() {
        let report = app.reconciler.flush_pending().await?;
        if report.attempted() > 0 {
            print_flush_report(&report, false)?;
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    probe_handle.stop();
    probe_task.abort();
    monitor.unsubscribe(printer);
    monitor.unsubscribe(flush_id);
    let _ = flush_task.await;

    let remaining = app.reconciler.pending()?.len();
    println!("Stopped. {remaining} submission(s) still queued.");
    Ok(())
}

fn handle_status(app: &App, cmd: &StatusCommand) -> anyhow::Result<()> {
    let online = app.reconciler.connectivity().is_online();
    let stats = app.queue.stats()?;
    let database_path = app.queue.path().to_path_buf();

    if cmd.json {
        let status = serde_json::json!({
            "online": online,
            "remote_url": app.config.remote.url,
            "table": app.config.remote.table,
            "database_path": database_path,
            "queue_key": app.config.queue.key,
            "pending": stats.pending,
            "oldest_pending": stats.oldest_pending,
            "newest_pending": stats.newest_pending,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("feedbox status");
    println!("--------------");
    println!("Connectivity:  {}", if online { "online" } else { "offline" });
    println!("Remote:        {} (table {})", app.config.remote.url, app.config.remote.table);
    println!("Database:      {}", database_path.display());
    println!("Queue key:     {}", app.config.queue.key);
    println!("Pending:       {}", stats.pending);
    if let Some(oldest) = stats.oldest_pending {
        println!("Oldest queued: {}", oldest.to_rfc3339());
    }
    println!("Database size: {} bytes", stats.db_size_bytes);
    Ok(())
}

fn handle_config(path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path).context("loading configuration")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Remote]");
                println!("  URL:                {}", config.remote.url);
                println!("  Table:              {}", config.remote.table);
                println!(
                    "  API key:            {}",
                    if config.remote.api_key.is_some() { "set" } else { "not set" }
                );
                println!("  Timeout (ms):       {}", config.remote.timeout_ms);
                println!();
                println!("[Queue]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Key:                {}", config.queue.key);
                println!();
                println!("[Connectivity]");
                println!("  Mode:               {:?}", config.connectivity.mode);
                println!("  Probe timeout (ms): {}", config.connectivity.probe_timeout_ms);
                println!("  Probe interval (ms):{}", config.connectivity.probe_interval_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", path.unwrap_or_else(Config::default_config_path).display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("configuration is invalid")?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

fn print_record(record: &FeedbackRecord, pending: bool) {
    let marker = if pending { " [pending]" } else { "" };
    println!(
        "{}  {}  {} <{}>{marker}",
        record.id,
        record.created_at_rfc3339(),
        record.name,
        record.email
    );
    println!("    {}", record.message);
}

fn print_flush_report(report: &FlushReport, json: bool) -> anyhow::Result<()> {
    if json {
        let flushed: Vec<_> = report
            .flushed
            .iter()
            .map(|f| serde_json::json!({ "local_id": f.local_id, "record": f.record }))
            .collect();
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|f| serde_json::json!({ "local_id": f.local_id, "error": f.error.to_string() }))
            .collect();
        let out = serde_json::json!({
            "skipped_offline": report.skipped_offline,
            "flushed": flushed,
            "failed": failed,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if report.skipped_offline {
        println!("Offline: nothing sent.");
        return Ok(());
    }
    if report.attempted() == 0 {
        println!("Nothing to send.");
        return Ok(());
    }
    for entry in &report.flushed {
        println!("Sent {} as {}.", entry.local_id, entry.record.id);
    }
    for entry in &report.failed {
        println!("Kept {}: {}", entry.local_id, entry.error);
    }
    println!(
        "{} sent, {} still queued.",
        report.flushed.len(),
        report.failed.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[remote]\ntable = \"responses\"\n").unwrap();

        let cmd = ConfigCommand::Validate { file: Some(path) };
        assert!(handle_config(None, cmd).is_ok());
    }

    #[test]
    fn test_validate_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[remote]\ntimeout_ms = 0\n").unwrap();

        let cmd = ConfigCommand::Validate { file: Some(path) };
        let err = handle_config(None, cmd).unwrap_err();
        assert!(format!("{err:#}").contains("timeout_ms"));
    }
}
