//! Debounced autosave of editor content.
//!
//! Each [`EditTarget`] has at most one armed timer. A content change stores
//! the draft and restarts that timer; when it fires, only the latest content
//! of the quiet period is persisted through the [`Store`]. Timers are the
//! only cancellable part: once a save has started, its gateway call runs to
//! completion even if newer changes arrive.
//!
//! Timer tasks hold a weak reference to the scheduler, so dropping the last
//! [`AutosaveScheduler`] handle aborts pending timers without flushing them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace};

use quire_core::{defaults, is_blank, EditTarget, NoteId, StoreEvent};

use crate::outcome::Outcome;
use crate::store::Store;

/// Autosave timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Quiet period after the last change before saving, in milliseconds.
    pub debounce_ms: u64,
    /// How long the saving indicator stays on after a save resolves.
    pub indicator_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::AUTOSAVE_DEBOUNCE_MS,
            indicator_ms: defaults::SAVING_INDICATOR_MS,
        }
    }
}

impl AutosaveConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUIRE_AUTOSAVE_DEBOUNCE_MS` | `1000` | Quiet period before a save |
    /// | `QUIRE_SAVING_INDICATOR_MS` | `1000` | Saving indicator window |
    pub fn from_env() -> Self {
        let debounce_ms = std::env::var("QUIRE_AUTOSAVE_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::AUTOSAVE_DEBOUNCE_MS);

        let indicator_ms = std::env::var("QUIRE_SAVING_INDICATOR_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SAVING_INDICATOR_MS);

        Self {
            debounce_ms,
            indicator_ms,
        }
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn with_indicator_ms(mut self, ms: u64) -> Self {
        self.indicator_ms = ms;
        self
    }

    fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn indicator(&self) -> Duration {
        Duration::from_millis(self.indicator_ms)
    }
}

struct Timer {
    ticket: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
    drafts: HashMap<EditTarget, String>,
    timers: HashMap<EditTarget, Timer>,
    in_flight: HashMap<EditTarget, usize>,
    /// Ticket of the save that currently owns each visible indicator.
    saving: HashMap<EditTarget, u64>,
    /// Note created by the first save of the current draft.
    bound_draft: Option<NoteId>,
    draft_epoch: u64,
    next_ticket: u64,
}

impl SchedulerState {
    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

struct SchedulerInner {
    store: Store,
    config: AutosaveConfig,
    state: Mutex<SchedulerState>,
    /// Draft saves run one at a time so a second change cannot create a
    /// second note while the first creation is in flight.
    draft_save: tokio::sync::Mutex<()>,
}

/// Debounced per-target autosave. Cloning shares the same timers.
#[derive(Clone)]
pub struct AutosaveScheduler {
    inner: Arc<SchedulerInner>,
}

impl AutosaveScheduler {
    pub fn new(store: Store, config: AutosaveConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                config,
                state: Mutex::new(SchedulerState::default()),
                draft_save: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.inner.config
    }

    /// Record new content for `target` and restart its debounce timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_change(&self, target: EditTarget, content: impl Into<String>) {
        let delay = self.inner.config.debounce();
        let mut state = self.inner.lock();
        state.drafts.insert(target.clone(), content.into());

        if let Some(previous) = state.timers.remove(&target) {
            previous.handle.abort();
            trace!(edit_target = %target, "Debounce restarted");
        }

        let ticket = state.ticket();
        let weak = Arc::downgrade(&self.inner);
        let fired = target.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            SchedulerInner::fire(weak, fired, ticket).await;
        });
        state.timers.insert(target, Timer { ticket, handle });
    }

    /// Latest content recorded for `target`.
    pub fn draft(&self, target: &EditTarget) -> Option<String> {
        self.inner.lock().drafts.get(target).cloned()
    }

    /// Note the current draft was saved as, once its first save succeeded.
    pub fn bound_draft(&self) -> Option<NoteId> {
        self.inner.lock().bound_draft.clone()
    }

    /// Whether a timer is armed or a save is running for `target`.
    pub fn is_pending(&self, target: &EditTarget) -> bool {
        let state = self.inner.lock();
        state.timers.contains_key(target) || state.in_flight.contains_key(target)
    }

    /// Whether the saving indicator for `target` is on.
    pub fn is_saving(&self, target: &EditTarget) -> bool {
        self.inner.lock().saving.contains_key(target)
    }

    /// Drop the pending change for `target` without saving it.
    pub fn cancel(&self, target: &EditTarget) {
        let mut state = self.inner.lock();
        if let Some(timer) = state.timers.remove(target) {
            timer.handle.abort();
            debug!(edit_target = %target, "Pending autosave cancelled");
        }
        state.drafts.remove(target);
    }

    /// Start a fresh draft. Later draft changes create a new note.
    pub fn reset_draft(&self) {
        self.cancel(&EditTarget::Draft);
        let mut state = self.inner.lock();
        state.bound_draft = None;
        state.draft_epoch += 1;
    }

    /// Abort every pending timer. Saves already running complete.
    pub fn shutdown(&self) {
        let aborted = self.inner.abort_timers();
        info!(aborted, "Autosave scheduler shut down");
    }
}

impl SchedulerInner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn abort_timers(&self) -> usize {
        let mut state = self.lock();
        let count = state.timers.len();
        for (_, timer) in state.timers.drain() {
            timer.handle.abort();
        }
        count
    }

    /// Timer expiry. Claims the timer (so later changes can no longer abort
    /// this task) and runs the save.
    async fn fire(weak: Weak<SchedulerInner>, target: EditTarget, ticket: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };

        let content = {
            let mut state = inner.lock();
            match state.timers.get(&target) {
                Some(timer) if timer.ticket == ticket => {}
                _ => return,
            }
            // Dropping the handle detaches this task.
            state.timers.remove(&target);

            let content = state.drafts.get(&target).cloned().unwrap_or_default();
            if is_blank(&content) {
                debug!(edit_target = %target, "Skipping autosave of blank content");
                return;
            }
            *state.in_flight.entry(target.clone()).or_default() += 1;
            content
        };

        inner.save(target, content).await;
    }

    #[instrument(skip(self, content), fields(subsystem = "autosave", edit_target = %target, content_len = content.len()))]
    async fn save(self: &Arc<Self>, target: EditTarget, content: String) {
        {
            let mut state = self.lock();
            let ticket = state.ticket();
            state.saving.insert(target.clone(), ticket);
        }
        self.store.events().emit(StoreEvent::SaveStarted {
            target: target.clone(),
        });

        let success = match &target {
            EditTarget::Note(note_id) => matches!(
                self.store.edit_note(note_id, &content).await,
                Ok(Outcome::Applied(()))
            ),
            EditTarget::Draft => self.save_draft(&content).await,
        };

        debug!(success, "Autosave finished");
        self.store.events().emit(StoreEvent::SaveFinished {
            target: target.clone(),
            success,
        });

        let ticket = {
            let mut state = self.lock();
            if let Some(count) = state.in_flight.get_mut(&target) {
                *count -= 1;
                if *count == 0 {
                    state.in_flight.remove(&target);
                }
            }
            let ticket = state.ticket();
            state.saving.insert(target.clone(), ticket);
            ticket
        };
        self.clear_indicator_later(target, ticket);
    }

    /// First save of a draft creates the note; later saves edit it.
    async fn save_draft(&self, content: &str) -> bool {
        let _serial = self.draft_save.lock().await;
        let (bound, epoch) = {
            let state = self.lock();
            (state.bound_draft.clone(), state.draft_epoch)
        };

        if let Some(note_id) = bound {
            return matches!(
                self.store.edit_note(&note_id, content).await,
                Ok(Outcome::Applied(()))
            );
        }

        match self.store.add_note(content).await {
            Ok(Outcome::Applied(note)) => {
                let mut state = self.lock();
                if state.draft_epoch == epoch {
                    debug!(note_id = %note.id, "Draft bound to created note");
                    state.bound_draft = Some(note.id);
                }
                true
            }
            _ => false,
        }
    }

    fn clear_indicator_later(self: &Arc<Self>, target: EditTarget, ticket: u64) {
        let weak = Arc::downgrade(self);
        let delay = self.config.indicator();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let cleared = {
                let mut state = inner.lock();
                let owned = state.saving.get(&target) == Some(&ticket);
                if owned && !state.in_flight.contains_key(&target) {
                    state.saving.remove(&target);
                    true
                } else {
                    false
                }
            };
            if cleared {
                inner
                    .store
                    .events()
                    .emit(StoreEvent::SavingIndicatorCleared { target });
            }
        });
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        let aborted = self.abort_timers();
        if aborted > 0 {
            debug!(aborted, "Autosave scheduler dropped with pending changes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AutosaveConfig::default();
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.indicator_ms, 1000);
    }

    #[test]
    fn test_config_builders() {
        let config = AutosaveConfig::default()
            .with_debounce_ms(2000)
            .with_indicator_ms(250);
        assert_eq!(config.debounce(), Duration::from_millis(2000));
        assert_eq!(config.indicator(), Duration::from_millis(250));
    }

    #[test]
    fn test_config_deserializes_partial_table() {
        let config: AutosaveConfig = serde_json::from_str(r#"{"debounce_ms": 2000}"#).unwrap();
        assert_eq!(config.debounce_ms, 2000);
        assert_eq!(config.indicator_ms, defaults::SAVING_INDICATOR_MS);
    }
}
