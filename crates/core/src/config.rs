use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RulesConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ASSETFLOW_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ASSETFLOW_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RulesConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  rules:  dir={}, scope={}", self.rules.rules_dir.display(), self.rules.scope);
        tracing::info!("  facts:  file={}", self.rules.facts_file.display());
        tracing::info!(
            "  engine: tick={}ms, watch={}, audit_max_entries={}",
            self.rules.tick_ms,
            self.rules.watch,
            self.rules.audit_max_entries
        );
    }
}

// ── Rules engine ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Directory scanned for ruleset files.
    pub rules_dir: PathBuf,
    /// JSON snapshot of facts and users read by the worker each tick.
    pub facts_file: PathBuf,
    /// Fact-store scope (tenant/realm) the session evaluates against.
    pub scope: String,
    /// Evaluation cycle interval in milliseconds.
    pub tick_ms: u64,
    /// Hot-reload the rules directory.
    pub watch: bool,
    pub audit_max_entries: usize,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_dir: PathBuf::from(profiled_env_or(p, "RULES_DIR", "data/rules")),
            facts_file: PathBuf::from(profiled_env_or(p, "FACTS_FILE", "data/facts.json")),
            scope: profiled_env_or(p, "RULES_SCOPE", "default"),
            tick_ms: profiled_env_u64(p, "RULES_TICK_MS", 1_000).max(1),
            watch: profiled_env_bool(p, "RULES_WATCH", true),
            audit_max_entries: profiled_env_u64(p, "RULES_AUDIT_MAX_ENTRIES", 500) as usize,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_prefixed_key_wins() {
        env::set_var("CFGTEST_RULES_SCOPE", "tenant-a");
        env::set_var("RULES_TICK_MS", "250");
        let config = Config::for_profile("cfgtest");
        assert_eq!(config.profile, "CFGTEST");
        assert_eq!(config.rules.scope, "tenant-a");
        assert_eq!(config.rules.tick_interval(), Duration::from_millis(250));
        env::remove_var("CFGTEST_RULES_SCOPE");
        env::remove_var("RULES_TICK_MS");
    }

    #[test]
    fn default_profile_label() {
        let config = Config::for_profile("");
        assert_eq!(config.profile_label(), "default");
        assert_eq!(config.rules.rules_dir, PathBuf::from("data/rules"));
    }
}
