//! rules-worker: runs a rule session against a fact snapshot file.
//!
//! Loads rulesets from the rules directory (hot-reloaded when `--watch`),
//! evaluates them every tick against the facts file and logs every resolved
//! action through the tracing dispatcher.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use assetflow_core::config::{load_dotenv, Config};
use assetflow_rules::audit_log::AuditLog;
use assetflow_rules::loader::{LoadStatus, RulesetLoader};
use assetflow_rules::tracker::TrackerSnapshot;
use assetflow_rules::{FileFactStore, RuleSession, SessionRunner, TracingDispatcher};

// ── CLI ─────────────────────────────────────────────────────────────

/// Rule session worker. Flags override the environment configuration.
#[derive(Parser, Debug)]
#[command(name = "rules-worker", version, about)]
struct Cli {
    /// Directory containing ruleset files.
    #[arg(long)]
    rules_dir: Option<PathBuf>,

    /// JSON fact snapshot, re-read every tick.
    #[arg(long)]
    facts_file: Option<PathBuf>,

    /// Fact store scope to evaluate.
    #[arg(long)]
    scope: Option<String>,

    /// Evaluation interval in milliseconds.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Disable hot-reload of the rules directory.
    #[arg(long)]
    no_watch: bool,

    /// Trigger history file, restored on start and written on exit.
    #[arg(long, env = "RULES_STATE_FILE")]
    state_file: Option<PathBuf>,
}

fn restore_state(session: &mut RuleSession, path: &PathBuf) {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            info!(path = %path.display(), error = %e, "no trigger history restored");
            return;
        }
    };
    match serde_json::from_str::<TrackerSnapshot>(&text) {
        Ok(snapshot) => {
            let restored = session.restore_tracker(snapshot, Utc::now());
            info!(path = %path.display(), restored, "restored trigger history");
        }
        Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable trigger history"),
    }
}

fn save_state(snapshot: &TrackerSnapshot, path: &PathBuf) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), records = snapshot.records.len(), "saved trigger history");
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.rules_dir {
        config.rules.rules_dir = dir;
    }
    if let Some(file) = cli.facts_file {
        config.rules.facts_file = file;
    }
    if let Some(scope) = cli.scope {
        config.rules.scope = scope;
    }
    if let Some(tick) = cli.tick_ms {
        config.rules.tick_ms = tick.max(1);
    }
    if cli.no_watch {
        config.rules.watch = false;
    }
    config.log_summary();

    let mut loader = RulesetLoader::new(config.rules.rules_dir.clone());
    let results = loader.load_all()?;
    let failed = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
        .count();
    info!(files = results.len(), failed, "initial ruleset scan complete");
    if config.rules.watch {
        loader.watch()?;
    }

    let store = Arc::new(FileFactStore::new(config.rules.facts_file.clone()));
    let audit = AuditLog::with_max_entries(config.rules.audit_max_entries);
    let mut session = RuleSession::new(config.rules.scope.clone(), store).with_audit_log(audit);
    if let Some(path) = &cli.state_file {
        restore_state(&mut session, path);
    }

    let runner = SessionRunner::new(session, Arc::new(TracingDispatcher))
        .with_loader(Arc::new(loader))
        .with_tick(Duration::from_millis(config.rules.tick_ms));
    let session = runner.session();

    info!("rules-worker starting");
    runner
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl_c");
            }
        })
        .await;

    if let Some(path) = &cli.state_file {
        let snapshot = session.lock().await.tracker_snapshot();
        save_state(&snapshot, path)?;
    }
    info!("rules-worker exited cleanly");
    Ok(())
}
