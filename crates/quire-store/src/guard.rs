//! Per-entity ordering of gateway calls.
//!
//! Two mutations of the same folder or note never overlap: each entity key
//! has its own async mutex, and tokio's mutex grants the lock in FIFO order,
//! so calls for one entity reach the server in issue order. Unrelated
//! entities proceed concurrently.
//!
//! Content edits additionally carry a sequence number. An edit still queued
//! behind an in-flight call for the same note is dropped once a newer edit
//! has been issued, since the newer content supersedes it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

type EntityLock = Arc<tokio::sync::Mutex<()>>;

/// Serializes gateway calls per entity key.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    locks: Arc<Mutex<HashMap<String, EntityLock>>>,
    edit_seq: Mutex<HashMap<String, u64>>,
}

/// Exclusive right to call the gateway for one entity. Released on drop.
#[derive(Debug)]
pub struct EntityPermit {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<HashMap<String, EntityLock>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for a folder entity.
    pub fn folder_key(folder_id: &str) -> String {
        format!("folder:{folder_id}")
    }

    /// Key for a note entity.
    pub fn note_key(note_id: &str) -> String {
        format!("note:{note_id}")
    }

    /// Wait until no other call for `key` is in flight.
    pub async fn acquire(&self, key: String) -> EntityPermit {
        let lock = {
            let mut locks = lock_map(&self.locks);
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        EntityPermit {
            key,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of entity keys currently tracked.
    pub fn tracked(&self) -> usize {
        lock_map(&self.locks).len()
    }

    /// Register a new content edit for `note_id` and return its sequence
    /// number.
    pub fn next_edit(&self, note_id: &str) -> u64 {
        let mut seqs = lock_map(&self.edit_seq);
        let seq = seqs.entry(note_id.to_string()).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Whether `seq` is still the newest edit issued for `note_id`.
    pub fn is_latest_edit(&self, note_id: &str, seq: u64) -> bool {
        lock_map(&self.edit_seq).get(note_id).copied() == Some(seq)
    }

    /// Release `seq` once its call has resolved. The entry is dropped only
    /// when no newer edit was issued meanwhile.
    pub fn finish_edit(&self, note_id: &str, seq: u64) {
        let mut seqs = lock_map(&self.edit_seq);
        if seqs.get(note_id).copied() == Some(seq) {
            seqs.remove(note_id);
        }
    }

    /// Number of notes with edit sequencing in use.
    pub fn tracked_edits(&self) -> usize {
        lock_map(&self.edit_seq).len()
    }

    /// Forget edit sequencing for a note that left the local state.
    pub fn forget_edits(&self, note_id: &str) {
        lock_map(&self.edit_seq).remove(note_id);
    }
}

impl Drop for EntityPermit {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let mut locks = lock_map(&self.locks);
        // The map and this permit hold the only references: nobody is queued.
        if Arc::strong_count(OwnedMutexGuard::mutex(&guard)) == 2 {
            locks.remove(&self.key);
        }
        drop(guard);
    }
}

fn lock_map<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let guard = Arc::new(InFlightGuard::new());
        let first = guard.acquire(InFlightGuard::note_key("1")).await;

        let waiter = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move {
                let _permit = guard.acquire(InFlightGuard::note_key("1")).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let guard = InFlightGuard::new();
        let _a = guard.acquire(InFlightGuard::note_key("1")).await;
        let _b = guard.acquire(InFlightGuard::folder_key("1")).await;
        assert_eq!(guard.tracked(), 2);
    }

    #[tokio::test]
    async fn test_idle_keys_are_released() {
        let guard = InFlightGuard::new();
        {
            let _permit = guard.acquire(InFlightGuard::note_key("1")).await;
            assert_eq!(guard.tracked(), 1);
        }
        assert_eq!(guard.tracked(), 0);
    }

    #[test]
    fn test_edit_sequence_tracks_latest() {
        let guard = InFlightGuard::new();
        let first = guard.next_edit("1");
        let second = guard.next_edit("1");
        assert!(!guard.is_latest_edit("1", first));
        assert!(guard.is_latest_edit("1", second));

        guard.forget_edits("1");
        assert!(!guard.is_latest_edit("1", second));
    }

    #[test]
    fn test_finished_latest_edit_is_released() {
        let guard = InFlightGuard::new();
        let first = guard.next_edit("1");
        let second = guard.next_edit("1");

        guard.finish_edit("1", first);
        assert_eq!(guard.tracked_edits(), 1);
        assert!(guard.is_latest_edit("1", second));

        guard.finish_edit("1", second);
        assert_eq!(guard.tracked_edits(), 0);
    }

    #[test]
    fn test_keys_are_namespaced() {
        assert_ne!(InFlightGuard::folder_key("1"), InFlightGuard::note_key("1"));
    }
}
