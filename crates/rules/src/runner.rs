//! Drives a [`RuleSession`] on a fixed tick and hands actions to a dispatcher.
//!
//! The runner owns the only `now`: each tick it syncs rulesets from the
//! loader, evaluates the session and spawns one task per dispatch. Tasks
//! honor the accumulated `wait` delay before calling the dispatcher.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::audit_log::{AuditLog, ExecutionPhase, LogLevel};
use crate::dispatch::ActionDispatcher;
use crate::loader::RulesetLoader;
use crate::schema::RulesetEnvelope;
use crate::session::{ActionBatch, ActionDispatch, CycleOutcome, DeployReport, RuleSession};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

pub struct SessionRunner {
    session: Arc<Mutex<RuleSession>>,
    dispatcher: Arc<dyn ActionDispatcher>,
    audit: AuditLog,
    loader: Option<Arc<RulesetLoader>>,
    /// Envelope last deployed per ruleset, to redeploy only what changed.
    deployed: BTreeMap<String, RulesetEnvelope>,
    synced_generation: Option<u64>,
    period: Duration,
    in_flight: JoinSet<()>,
}

impl SessionRunner {
    pub fn new(session: RuleSession, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        let audit = session.audit_log().clone();
        Self {
            session: Arc::new(Mutex::new(session)),
            dispatcher,
            audit,
            loader: None,
            deployed: BTreeMap::new(),
            synced_generation: None,
            period: DEFAULT_TICK,
            in_flight: JoinSet::new(),
        }
    }

    /// Keep the session's rulesets in step with `loader`.
    pub fn with_loader(mut self, loader: Arc<RulesetLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_tick(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Shared handle to the session, e.g. for enabling rules at runtime.
    pub fn session(&self) -> Arc<Mutex<RuleSession>> {
        Arc::clone(&self.session)
    }

    /// Deploy rulesets that changed in the loader since the last sync and
    /// undeploy the ones that disappeared.
    pub async fn sync_rulesets(&mut self, now: DateTime<Utc>) -> Vec<DeployReport> {
        let Some(loader) = self.loader.clone() else {
            return Vec::new();
        };
        let generation = loader.generation();
        if self.synced_generation == Some(generation) {
            return Vec::new();
        }

        let current = loader.rulesets();
        let mut reports = Vec::new();
        let mut stopped = ActionBatch::default();
        {
            let mut session = self.session.lock().await;

            let gone: Vec<String> = self
                .deployed
                .keys()
                .filter(|id| !current.contains_key(*id))
                .cloned()
                .collect();
            for id in gone {
                info!(ruleset = %id, "ruleset removed, undeploying");
                stopped.append(session.undeploy_ruleset(&id, now));
                self.deployed.remove(&id);
            }

            for (id, envelope) in current {
                if self.deployed.get(&id) == Some(&envelope) {
                    continue;
                }
                reports.push(session.deploy_ruleset(&id, &envelope, now));
                self.deployed.insert(id, envelope);
            }
        }
        self.synced_generation = Some(generation);

        self.spawn_all(stopped.dispatches);
        for report in &reports {
            self.spawn_all(report.dispatches.clone());
        }
        reports
    }

    /// One evaluation cycle at `now`. Dispatches are spawned, not awaited.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        self.reap();
        self.sync_rulesets(now).await;
        let outcome = self.session.lock().await.evaluate(now);
        if !outcome.fired.is_empty() || !outcome.otherwise.is_empty() {
            debug!(
                fired = outcome.fired.len(),
                otherwise = outcome.otherwise.len(),
                dispatches = outcome.dispatches.len(),
                "tick"
            );
        }
        self.spawn_all(outcome.dispatches.clone());
        outcome
    }

    /// Tick every interval until `shutdown` resolves, then stop all rules
    /// and wait for outstanding dispatches.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_ms = self.period.as_millis() as u64, "session runner started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        let batch = self.session.lock().await.shutdown(Utc::now());
        self.spawn_all(batch.dispatches);
        self.drain().await;
        info!("session runner stopped");
    }

    /// Wait for every spawned dispatch to finish.
    pub async fn drain(&mut self) {
        while let Some(res) = self.in_flight.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "dispatch task failed");
            }
        }
    }

    fn reap(&mut self) {
        while let Some(res) = self.in_flight.try_join_next() {
            if let Err(e) = res {
                warn!(error = %e, "dispatch task failed");
            }
        }
    }

    fn spawn_all(&mut self, dispatches: Vec<ActionDispatch>) {
        for dispatch in dispatches {
            let dispatcher = Arc::clone(&self.dispatcher);
            let audit = self.audit.clone();
            self.in_flight.spawn(async move {
                if dispatch.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(dispatch.delay_ms)).await;
                }
                let rule_id = dispatch.rule_id.clone();
                let kind = dispatch.action.kind();
                if let Err(e) = dispatcher.dispatch(dispatch).await {
                    warn!(rule_id = %rule_id, action = kind, error = %e, "dispatch failed");
                    audit.record(
                        Utc::now(),
                        &rule_id,
                        LogLevel::Error,
                        ExecutionPhase::Dispatch,
                        e.to_string(),
                    );
                }
            });
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
