//! Handing resolved actions to whatever executes them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::error::DispatchError;
use crate::session::ActionDispatch;

/// Executes actions produced by a rule session.
///
/// Failures are reported back to the caller and recorded in the audit log;
/// they never roll back trigger history.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, dispatch: ActionDispatch) -> Result<(), DispatchError>;
}

/// Logs every action instead of executing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

#[async_trait]
impl ActionDispatcher for TracingDispatcher {
    async fn dispatch(&self, dispatch: ActionDispatch) -> Result<(), DispatchError> {
        let targets = serde_json::to_string(&dispatch.targets).unwrap_or_default();
        info!(
            rule_id = %dispatch.rule_id,
            block = dispatch.block.as_str(),
            action = dispatch.action.kind(),
            delay_ms = dispatch.delay_ms,
            targets = %targets,
            "dispatching action"
        );
        Ok(())
    }
}

/// Keeps every dispatched action in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingDispatcher {
    received: Arc<Mutex<Vec<ActionDispatch>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<ActionDispatch> {
        self.received.lock().expect("dispatch lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.received.lock().expect("dispatch lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ActionDispatcher for RecordingDispatcher {
    async fn dispatch(&self, dispatch: ActionDispatch) -> Result<(), DispatchError> {
        self.received
            .lock()
            .expect("dispatch lock poisoned")
            .push(dispatch);
        Ok(())
    }
}
