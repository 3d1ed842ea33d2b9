//! Filesystem ruleset loader with hot-reload via `notify` watcher.
//!
//! Every `*.json`, `*.yml` or `*.yaml` file under the rules directory is one
//! ruleset, keyed by its file stem. Files are parsed into a
//! [`RulesetEnvelope`](crate::schema::RulesetEnvelope) only; individual rules
//! are validated when the session deploys them, so one bad rule never hides
//! the rest of its file.

mod core;
mod error;
mod watcher;


pub use self::core::RulesetLoader;
pub use self::error::{LoadResult, LoadStatus, LoaderError, Result};
