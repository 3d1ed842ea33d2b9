//! Filesystem event handler for the notify watcher (hot-reload).

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use super::core::{parse_file, ruleset_id, RulesetFormat, SharedRulesets};

/// Handle a single filesystem event from the notify watcher.
pub(super) fn handle_fs_event(event: &Event, rulesets: &SharedRulesets, generation: &AtomicU64) {
    for path in &event.paths {
        if RulesetFormat::from_path(path).is_none() {
            continue;
        }
        // Dotfiles, including our .tmp files, have no ruleset id.
        let Some(id) = ruleset_id(path) else {
            continue;
        };

        match &event.kind {
            EventKind::Create(CreateKind::File)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_)) => reload(path, &id, rulesets, generation),
            EventKind::Remove(RemoveKind::File) => {
                let removed = rulesets
                    .write()
                    .expect("rulesets lock poisoned")
                    .remove(&id);
                if removed.is_some() {
                    generation.fetch_add(1, Ordering::SeqCst);
                    info!(ruleset = %id, path = %path.display(), "removed ruleset after file deletion");
                }
            }
            _ => {}
        }
    }
}

fn reload(path: &Path, id: &str, rulesets: &SharedRulesets, generation: &AtomicU64) {
    // A rename away from this path shows up as a modify on the old name.
    if !path.exists() {
        if rulesets
            .write()
            .expect("rulesets lock poisoned")
            .remove(id)
            .is_some()
        {
            generation.fetch_add(1, Ordering::SeqCst);
            info!(ruleset = %id, path = %path.display(), "removed ruleset after rename");
        }
        return;
    }

    match parse_file(path) {
        Ok(envelope) => {
            let mut guard = rulesets.write().expect("rulesets lock poisoned");
            if guard.get(id) == Some(&envelope) {
                return;
            }
            info!(ruleset = %id, rules = envelope.rules.len(), path = %path.display(), "hot-reloaded ruleset");
            guard.insert(id.to_string(), envelope);
            generation.fetch_add(1, Ordering::SeqCst);
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "failed to parse ruleset during hot-reload, keeping previous version"
            );
        }
    }
}
