//! Core [`RulesetLoader`] struct: filesystem-backed ruleset loading with optional hot-reload.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::schema::RulesetEnvelope;

use super::error::{LoadResult, LoadStatus, LoaderError, Result};
use super::watcher::handle_fs_event;

pub(super) type SharedRulesets = Arc<RwLock<BTreeMap<String, RulesetEnvelope>>>;

/// Ruleset file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RulesetFormat {
    Json,
    Yaml,
}

impl RulesetFormat {
    pub(super) fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(RulesetFormat::Json),
            Some("yml") | Some("yaml") => Some(RulesetFormat::Yaml),
            _ => None,
        }
    }
}

/// Ruleset id of a file: its stem. Dotfiles have none.
pub(super) fn ruleset_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

pub(super) fn parse_file(path: &Path) -> Result<RulesetEnvelope> {
    let format = RulesetFormat::from_path(path).ok_or_else(|| {
        LoaderError::Validation(format!("unsupported ruleset file '{}'", path.display()))
    })?;
    let contents = fs::read_to_string(path)?;
    let envelope = match format {
        RulesetFormat::Json => RulesetEnvelope::from_json(&contents)?,
        RulesetFormat::Yaml => RulesetEnvelope::from_yaml(&contents)?,
    };
    Ok(envelope)
}

/// Filesystem-backed ruleset loader with optional hot-reload.
///
/// Scans a directory (recursively), keeps the parsed envelopes keyed by
/// ruleset id and bumps a generation counter on every change so consumers
/// can tell when to redeploy.
pub struct RulesetLoader {
    rules_dir: PathBuf,
    rulesets: SharedRulesets,
    generation: Arc<AtomicU64>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl RulesetLoader {
    /// Create a new loader for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(rules_dir: PathBuf) -> Self {
        if !rules_dir.exists() {
            if let Err(e) = fs::create_dir_all(&rules_dir) {
                warn!(path = %rules_dir.display(), error = %e, "failed to create rules directory");
            }
        }
        Self {
            rules_dir,
            rulesets: Arc::new(RwLock::new(BTreeMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            _watcher: None,
        }
    }

    /// Recursively scan the rules directory and load every ruleset file.
    ///
    /// The scan replaces the loaded set, so rulesets whose files are gone
    /// disappear. Dotfiles and unsupported extensions are skipped. Parse
    /// errors are reported per file but do not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        let mut found = BTreeMap::new();
        Self::scan_dir_recursive(&self.rules_dir, &mut found, &mut results)?;
        *self.rulesets.write().expect("rulesets lock poisoned") = found;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(results)
    }

    fn scan_dir_recursive(
        dir: &Path,
        found: &mut BTreeMap<String, RulesetEnvelope>,
        results: &mut Vec<LoadResult>,
    ) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        paths.sort();

        for path in paths {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                Self::scan_dir_recursive(&path, found, results)?;
                continue;
            }

            if RulesetFormat::from_path(&path).is_none() {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a JSON or YAML file".to_string(),
                    },
                });
                continue;
            }

            let Some(id) = ruleset_id(&path) else {
                continue;
            };
            match parse_file(&path) {
                Ok(envelope) => {
                    let rules = envelope.rules.len();
                    info!(ruleset = %id, rules, path = %path.display(), "loaded ruleset");
                    found.insert(id.clone(), envelope);
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { ruleset: id, rules },
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load ruleset file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Start a filesystem watcher with 500ms debounce.
    ///
    /// On file create/modify the ruleset is re-parsed and replaced. On file
    /// delete the ruleset is removed. Parse errors are logged as warnings;
    /// the previous version is kept.
    pub fn watch(&mut self) -> Result<()> {
        let rulesets = Arc::clone(&self.rulesets);
        let generation = Arc::clone(&self.generation);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => handle_fs_event(&event, &rulesets, &generation),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        watcher.watch(&self.rules_dir, RecursiveMode::Recursive)?;
        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.rules_dir.display(), "watching rules directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Incremented on every full scan and every hot-reload change.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Copy of the currently loaded rulesets.
    pub fn rulesets(&self) -> BTreeMap<String, RulesetEnvelope> {
        self.rulesets.read().expect("rulesets lock poisoned").clone()
    }

    pub fn get(&self, ruleset: &str) -> Option<RulesetEnvelope> {
        self.rulesets
            .read()
            .expect("rulesets lock poisoned")
            .get(ruleset)
            .cloned()
    }
}
