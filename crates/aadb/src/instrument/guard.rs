//! Process-wide identity registry for instrumented handles.
//!
//! Entries are keyed by the address of the handle's allocation and hold only a
//! `Weak` reference to it, so the registry never keeps a handle alive. An entry
//! whose handle has been dropped is treated as absent, which also covers a new
//! allocation reusing the address.

use super::instrumented::Shared;
use crate::driver::CallbackHandle;
use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};

const MIN_PRUNE_AT: usize = 64;

static REGISTRY: LazyLock<Mutex<Registry>> = LazyLock::new(|| Mutex::new(Registry::default()));

pub(super) fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

fn identity(target: &Arc<dyn CallbackHandle>) -> usize {
    Arc::as_ptr(target).cast::<()>() as usize
}

/// Display-only parameter context of a handle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(super) struct BoundParams {
    /// Rendered arguments of the `prepare` call that created the handle.
    pub(super) inherited: Option<String>,
    /// Rendered arguments of the most recent `bind`.
    pub(super) last_bound: Option<String>,
}

impl BoundParams {
    /// The prefix for rendering the next call: bound params win over inherited ones.
    pub(super) fn prefix(&self) -> Option<&str> {
        self.last_bound.as_deref().or(self.inherited.as_deref())
    }
}

/// Per-handle instrumentation record.
#[derive(Debug, Default)]
pub(super) struct CallRecord {
    params: Mutex<BoundParams>,
}

impl CallRecord {
    pub(super) fn params(&self) -> MutexGuard<'_, BoundParams> {
        self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn set_inherited(&self, rendered: String) {
        self.params().inherited = Some(rendered);
    }
}

pub(super) struct Entry {
    target: Weak<dyn CallbackHandle>,
    pub(super) record: Arc<CallRecord>,
    pub(super) facade: Weak<Shared>,
}

impl Entry {
    fn new(target: &Arc<dyn CallbackHandle>) -> Self {
        Self {
            target: Arc::downgrade(target),
            record: Arc::default(),
            facade: Weak::new(),
        }
    }

    fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }
}

#[derive(Default)]
pub(super) struct Registry {
    entries: HashMap<usize, Entry>,
    prune_at: usize,
}

impl Registry {
    /// Mark `target` as processed.
    ///
    /// Returns whether it already was, together with its entry.
    pub(super) fn claim(&mut self, target: &Arc<dyn CallbackHandle>) -> (bool, &mut Entry) {
        let key = identity(target);
        if self.entries.get(&key).is_some_and(|e| !e.is_live()) {
            self.entries.remove(&key);
        }
        if self.entries.len() >= self.prune_at.max(MIN_PRUNE_AT) {
            self.prune();
        }
        match self.entries.entry(key) {
            MapEntry::Occupied(entry) => (true, entry.into_mut()),
            MapEntry::Vacant(entry) => (false, entry.insert(Entry::new(target))),
        }
    }

    pub(super) fn contains(&self, target: &Arc<dyn CallbackHandle>) -> bool {
        self.entries
            .get(&identity(target))
            .is_some_and(Entry::is_live)
    }

    /// Drop entries whose handle is gone.
    fn prune(&mut self) {
        self.entries.retain(|_, entry| entry.is_live());
        self.prune_at = self.entries.len() * 2;
    }

    #[cfg(test)]
    pub(super) fn live_len(&self) -> usize {
        self.entries.values().filter(|e| e.is_live()).count()
    }
}

/// Mark `target` as instrumented.
///
/// Returns `true` if it already was, `false` if this call marked it. Works on
/// identity alone; the handle needs no equality or hashing of its own.
pub fn guard(target: &Arc<dyn CallbackHandle>) -> bool {
    registry().claim(target).0
}

/// Whether `target` has been instrumented and is still alive.
pub fn is_instrumented(target: &Arc<dyn CallbackHandle>) -> bool {
    registry().contains(target)
}
