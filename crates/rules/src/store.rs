//! Fact store adapter: the read-only view the engine pulls facts from.
//!
//! [`FactStore`] is the collaborator boundary. [`InMemoryFactStore`] backs
//! tests and embedding callers; [`FileFactStore`] backs the worker binary by
//! re-reading a JSON snapshot file of the form `{"facts": [...], "users": [...]}`
//! at the start of every cycle.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use assetflow_core::{AssetState, CoreError, StoreError, User, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::evaluator::string_matches;
use crate::schema::UserQuery;

/// Scope of facts whose realm is empty.
pub const DEFAULT_SCOPE: &str = "default";

/// Scope matching every fact regardless of realm.
pub const ALL_SCOPES: &str = "*";

/// Read-only fact source consulted once per evaluation cycle.
pub trait FactStore: Send + Sync {
    /// Every fact currently visible in `scope`.
    fn current_facts(&self, scope: &str) -> Result<Vec<AssetState>, StoreError>;

    /// Users linked to an asset.
    fn linked_users(&self, asset_id: &str) -> Result<Vec<UserId>, StoreError>;

    /// Users selected by a query. Stores without user search report `Unsupported`.
    fn find_users(&self, _query: &UserQuery) -> Result<Vec<UserId>, StoreError> {
        Err(StoreError::Unsupported("find_users"))
    }
}

/// Which scope a fact belongs to.
pub fn fact_scope(fact: &AssetState) -> &str {
    if fact.realm.is_empty() {
        DEFAULT_SCOPE
    } else {
        &fact.realm
    }
}

/// On-disk snapshot format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactSnapshot {
    #[serde(default)]
    pub facts: Vec<AssetState>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl FactSnapshot {
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

// ── In-memory store ─────────────────────────────────────────────────

/// Facts and users held in memory behind `RwLock`s.
///
/// Setting a fact replaces any fact with the same key and keeps the
/// replaced value as `old_value`.
#[derive(Debug, Default)]
pub struct InMemoryFactStore {
    facts: RwLock<Vec<AssetState>>,
    users: RwLock<Vec<User>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: FactSnapshot) -> Self {
        Self {
            facts: RwLock::new(snapshot.facts),
            users: RwLock::new(snapshot.users),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        Ok(Self::from_snapshot(FactSnapshot::from_file(path)?))
    }

    /// Replace all facts and users with the contents of `snapshot`.
    pub fn replace(&self, snapshot: FactSnapshot) {
        *self.facts.write().expect("facts lock poisoned") = snapshot.facts;
        *self.users.write().expect("users lock poisoned") = snapshot.users;
    }

    /// Insert or replace one fact, carrying the previous value forward.
    pub fn set(&self, mut fact: AssetState) {
        let mut facts = self.facts.write().expect("facts lock poisoned");
        match facts.iter_mut().find(|f| f.key() == fact.key()) {
            Some(existing) => {
                if fact.old_value.is_none() {
                    fact.old_value = existing.value.clone();
                    fact.old_value_timestamp = Some(existing.timestamp);
                }
                *existing = fact;
            }
            None => facts.push(fact),
        }
    }

    /// Remove every fact of an asset.
    pub fn remove_asset(&self, asset_id: &str) {
        self.facts
            .write()
            .expect("facts lock poisoned")
            .retain(|f| f.id != asset_id);
    }

    pub fn add_user(&self, user: User) {
        let mut users = self.users.write().expect("users lock poisoned");
        users.retain(|u| u.id != user.id);
        users.push(user);
    }

    pub fn len(&self) -> usize {
        self.facts.read().expect("facts lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FactStore for InMemoryFactStore {
    fn current_facts(&self, scope: &str) -> Result<Vec<AssetState>, StoreError> {
        let facts = self.facts.read().expect("facts lock poisoned");
        let out: Vec<AssetState> = facts
            .iter()
            .filter(|f| scope == ALL_SCOPES || fact_scope(f) == scope)
            .cloned()
            .collect();
        debug!(scope = %scope, count = out.len(), "served facts");
        Ok(out)
    }

    fn linked_users(&self, asset_id: &str) -> Result<Vec<UserId>, StoreError> {
        let users = self.users.read().expect("users lock poisoned");
        Ok(users
            .iter()
            .filter(|u| u.is_linked_to(asset_id))
            .map(|u| u.id.clone())
            .collect())
    }

    fn find_users(&self, query: &UserQuery) -> Result<Vec<UserId>, StoreError> {
        let users = self.users.read().expect("users lock poisoned");
        let mut ids: BTreeSet<UserId> = BTreeSet::new();
        for user in users.iter() {
            if !query.ids.is_empty() && !query.ids.contains(&user.id) {
                continue;
            }
            if !query.usernames.is_empty()
                && !query.usernames.iter().any(|p| string_matches(p, &user.username))
            {
                continue;
            }
            if !query.assets.is_empty() && !query.assets.iter().any(|a| user.is_linked_to(a)) {
                continue;
            }
            if let Some(realm) = query.realm.as_ref().and_then(|r| r.name.as_deref()) {
                if user.realm != realm {
                    continue;
                }
            }
            ids.insert(user.id.clone());
        }
        let limit = query.limit.filter(|l| *l > 0).unwrap_or(usize::MAX);
        Ok(ids.into_iter().take(limit).collect())
    }
}

// ── Snapshot file store ─────────────────────────────────────────────

/// Re-reads a [`FactSnapshot`] file once per evaluation cycle.
///
/// Lets an external process publish facts by rewriting one JSON file. A
/// missing or unparsable file reports the store as unavailable. Every
/// `current_facts` call reads the file again; user lookups are answered
/// from the snapshot that call read, so a cycle never mixes two versions.
#[derive(Debug)]
pub struct FileFactStore {
    path: PathBuf,
    cycle: RwLock<Option<Arc<InMemoryFactStore>>>,
}

impl FileFactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cycle: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reload(&self) -> Result<Arc<InMemoryFactStore>, StoreError> {
        let store = InMemoryFactStore::from_file(&self.path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", self.path.display())))?;
        let store = Arc::new(store);
        *self.cycle.write().expect("snapshot lock poisoned") = Some(Arc::clone(&store));
        debug!(path = %self.path.display(), facts = store.len(), "reloaded fact snapshot");
        Ok(store)
    }

    /// The snapshot of the current cycle, read on first use.
    fn cycle_snapshot(&self) -> Result<Arc<InMemoryFactStore>, StoreError> {
        let cached = self.cycle.read().expect("snapshot lock poisoned").clone();
        match cached {
            Some(store) => Ok(store),
            None => self.reload(),
        }
    }
}

impl FactStore for FileFactStore {
    fn current_facts(&self, scope: &str) -> Result<Vec<AssetState>, StoreError> {
        self.reload()?.current_facts(scope)
    }

    fn linked_users(&self, asset_id: &str) -> Result<Vec<UserId>, StoreError> {
        self.cycle_snapshot()?.linked_users(asset_id)
    }

    fn find_users(&self, query: &UserQuery) -> Result<Vec<UserId>, StoreError> {
        self.cycle_snapshot()?.find_users(query)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
