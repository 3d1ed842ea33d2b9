//! Declarative asset rule engine.
//!
//! This crate provides:
//! - JSON/YAML rule definitions with serde deserialization
//! - Nested AND/OR condition groups over asset queries and timers
//! - Per-rule recurrence and reset tracking of trigger history
//! - Action target resolution to assets, users or custom recipients
//! - Rule sessions with lifecycle actions and priority-ordered cycles
//! - Filesystem loader with hot-reload via `notify` watcher

pub mod audit_log;
pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod runner;
pub mod scheduler;
pub mod schema;
pub mod session;
pub mod store;
pub mod target;
pub mod tracker;
pub mod trigger;

pub use dispatch::{ActionDispatcher, TracingDispatcher};
pub use error::{DefinitionError, DispatchError, EvaluationError, TargetError};
pub use runner::SessionRunner;
pub use session::{ActionDispatch, CycleOutcome, DeployReport, RuleSession};
pub use store::{FactStore, FileFactStore, InMemoryFactStore};
