//! In-memory gateway for deterministic testing.
//!
//! Behaves like the notes server (server-assigned sequential ids, soft
//! deletes, 404 on unknown ids) and records every call so tests can assert
//! what reached the "network".
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quire_gateway::mock::MockGateway;
//! use quire_core::NotesGateway;
//!
//! #[tokio::test]
//! async fn test_with_mock_gateway() {
//!     let gateway = MockGateway::new().with_folder("A", "Inbox");
//!     gateway.fail("list_notes");
//!
//!     assert!(gateway.list_notes("A").await.is_err());
//!     assert_eq!(gateway.call_count("list_notes"), 1);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use quire_core::{Error, Folder, Note, NotesGateway, Result};

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: String,
    pub args: Vec<String>,
}

#[derive(Debug, Default)]
struct MockState {
    folders: Vec<Folder>,
    notes: Vec<Note>,
    deleted: HashSet<String>,
    next_id: u64,
    failing: HashSet<String>,
    latency_ms: HashMap<String, u64>,
    keyed_latency_ms: HashMap<(String, String), u64>,
    calls: Vec<MockCall>,
}

/// Mock notes server.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    /// Create an empty mock server. Generated ids start at `"1"`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a folder.
    pub fn with_folder(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.lock().folders.push(Folder::new(id, name));
        self
    }

    /// Seed a live note.
    pub fn with_note(
        self,
        id: impl Into<String>,
        folder_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.lock().notes.push(Note::new(id, folder_id, content));
        self
    }

    /// Seed a soft-deleted note.
    pub fn with_deleted_note(
        self,
        id: impl Into<String>,
        folder_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let note = Note::new(id, folder_id, content);
        {
            let mut state = self.lock();
            state.deleted.insert(note.id.clone());
            state.notes.push(note);
        }
        self
    }

    /// Start generated ids at `next` (e.g. `9` makes the next created entity `"9"`).
    pub fn with_next_id(self, next: u64) -> Self {
        self.lock().next_id = next.saturating_sub(1);
        self
    }

    /// Delay every call of `operation` by `ms` milliseconds.
    pub fn with_latency_ms(self, operation: &str, ms: u64) -> Self {
        self.lock().latency_ms.insert(operation.to_string(), ms);
        self
    }

    /// Delay calls of `operation` whose first argument is `key`.
    pub fn with_latency_for(self, operation: &str, key: &str, ms: u64) -> Self {
        self.lock()
            .keyed_latency_ms
            .insert((operation.to_string(), key.to_string()), ms);
        self
    }

    /// Make every subsequent call of `operation` fail with a 500.
    pub fn fail(&self, operation: &str) {
        self.lock().failing.insert(operation.to_string());
    }

    /// Undo [`MockGateway::fail`].
    pub fn recover(&self, operation: &str) {
        self.lock().failing.remove(operation);
    }

    /// All recorded calls, in issue order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Recorded calls of one operation.
    pub fn calls_for(&self, operation: &str) -> Vec<MockCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    /// Number of recorded calls of one operation.
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.lock().calls.clear()
    }

    /// Server-side folders.
    pub fn folders(&self) -> Vec<Folder> {
        self.lock().folders.clone()
    }

    /// Server-side note, live or deleted.
    pub fn note(&self, id: &str) -> Option<Note> {
        self.lock().notes.iter().find(|n| n.id == id).cloned()
    }

    /// Whether the server holds `id` as soft-deleted.
    pub fn is_deleted(&self, id: &str) -> bool {
        self.lock().deleted.contains(id)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log the call, wait out any configured latency, then check failure
    /// injection. Latency applies before the state change, like a real
    /// round trip.
    async fn begin(&self, operation: &str, args: &[&str]) -> Result<()> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(MockCall {
                operation: operation.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            });
            let keyed = args.first().and_then(|key| {
                state
                    .keyed_latency_ms
                    .get(&(operation.to_string(), key.to_string()))
                    .copied()
            });
            keyed.or_else(|| state.latency_ms.get(operation).copied())
        };

        if let Some(ms) = delay {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        if self.lock().failing.contains(operation) {
            return Err(Error::Remote {
                status: 500,
                body: format!("mock failure: {}", operation),
            });
        }
        Ok(())
    }

    fn next_id(state: &mut MockState) -> String {
        state.next_id += 1;
        state.next_id.to_string()
    }

    fn not_found(what: &str, id: &str) -> Error {
        Error::Remote {
            status: 404,
            body: format!("{} {} not found", what, id),
        }
    }
}

#[async_trait]
impl NotesGateway for MockGateway {
    async fn list_folders(&self) -> Result<Vec<Folder>> {
        self.begin("list_folders", &[]).await?;
        Ok(self.lock().folders.clone())
    }

    async fn create_folder(&self, name: &str, parent_folder_id: Option<&str>) -> Result<Folder> {
        self.begin("create_folder", &[name]).await?;
        let mut state = self.lock();
        let folder = Folder {
            id: Self::next_id(&mut state),
            name: name.to_string(),
            parent_folder_id: parent_folder_id.map(str::to_string),
        };
        state.folders.push(folder.clone());
        Ok(folder)
    }

    async fn rename_folder(&self, folder_id: &str, name: &str) -> Result<Folder> {
        self.begin("rename_folder", &[folder_id, name]).await?;
        let mut state = self.lock();
        let folder = state
            .folders
            .iter_mut()
            .find(|f| f.id == folder_id)
            .ok_or_else(|| Self::not_found("folder", folder_id))?;
        folder.name = name.to_string();
        Ok(folder.clone())
    }

    async fn delete_folder(&self, folder_id: &str) -> Result<()> {
        self.begin("delete_folder", &[folder_id]).await?;
        let mut state = self.lock();
        let before = state.folders.len();
        state.folders.retain(|f| f.id != folder_id);
        if state.folders.len() == before {
            return Err(Self::not_found("folder", folder_id));
        }
        Ok(())
    }

    async fn list_notes(&self, folder_id: &str) -> Result<Vec<Note>> {
        self.begin("list_notes", &[folder_id]).await?;
        let state = self.lock();
        Ok(state
            .notes
            .iter()
            .filter(|n| n.folder_id == folder_id && !state.deleted.contains(&n.id))
            .cloned()
            .collect())
    }

    async fn list_deleted_notes(&self) -> Result<Vec<Note>> {
        self.begin("list_deleted_notes", &[]).await?;
        let state = self.lock();
        Ok(state
            .notes
            .iter()
            .filter(|n| state.deleted.contains(&n.id))
            .cloned()
            .collect())
    }

    async fn create_note(&self, content: &str, folder_id: &str) -> Result<Note> {
        self.begin("create_note", &[folder_id, content]).await?;
        let mut state = self.lock();
        let id = Self::next_id(&mut state);
        let note = Note::new(id, folder_id, content);
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn edit_note(&self, note_id: &str, content: &str) -> Result<()> {
        self.begin("edit_note", &[note_id, content]).await?;
        let mut state = self.lock();
        let note = state
            .notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or_else(|| Self::not_found("note", note_id))?;
        note.content = content.to_string();
        note.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        self.begin("delete_note", &[note_id]).await?;
        let mut state = self.lock();
        if !state.notes.iter().any(|n| n.id == note_id) {
            return Err(Self::not_found("note", note_id));
        }
        state.deleted.insert(note_id.to_string());
        Ok(())
    }

    async fn move_note(&self, note_id: &str, target_folder_id: &str) -> Result<()> {
        self.begin("move_note", &[note_id, target_folder_id]).await?;
        let mut state = self.lock();
        let note = state
            .notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or_else(|| Self::not_found("note", note_id))?;
        note.folder_id = target_folder_id.to_string();
        Ok(())
    }

    async fn restore_note(&self, note_id: &str) -> Result<()> {
        self.begin("restore_note", &[note_id]).await?;
        let mut state = self.lock();
        if !state.deleted.remove(note_id) {
            return Err(Self::not_found("deleted note", note_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_folder_assigns_sequential_ids() {
        let gateway = MockGateway::new();
        let a = gateway.create_folder("A", None).await.unwrap();
        let b = gateway.create_folder("B", None).await.unwrap();
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
        assert_eq!(gateway.folders().len(), 2);
    }

    #[tokio::test]
    async fn test_with_next_id() {
        let gateway = MockGateway::new().with_next_id(9);
        let folder = gateway.create_folder("New Folder", None).await.unwrap();
        assert_eq!(folder.id, "9");
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let gateway = MockGateway::new()
            .with_folder("A", "Inbox")
            .with_note("1", "A", "hello");

        gateway.delete_note("1").await.unwrap();
        assert!(gateway.list_notes("A").await.unwrap().is_empty());
        assert_eq!(gateway.list_deleted_notes().await.unwrap().len(), 1);

        gateway.restore_note("1").await.unwrap();
        assert_eq!(gateway.list_notes("A").await.unwrap().len(), 1);
        assert!(!gateway.is_deleted("1"));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_404() {
        let gateway = MockGateway::new();
        let err = gateway.edit_note("nope", "x").await.unwrap_err();
        assert!(matches!(err, Error::Remote { status: 404, .. }));
        assert!(gateway.restore_note("nope").await.is_err());
        assert!(gateway.delete_folder("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_failure_injection_logs_call_and_leaves_state() {
        let gateway = MockGateway::new().with_folder("A", "Inbox");
        gateway.fail("rename_folder");

        assert!(gateway.rename_folder("A", "Work").await.is_err());
        assert_eq!(gateway.folders()[0].name, "Inbox");
        assert_eq!(gateway.call_count("rename_folder"), 1);

        gateway.recover("rename_folder");
        assert_eq!(gateway.rename_folder("A", "Work").await.unwrap().name, "Work");
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyed_latency_overrides_operation_latency() {
        let gateway = MockGateway::new()
            .with_folder("A", "Slow")
            .with_folder("B", "Fast")
            .with_latency_ms("list_notes", 10)
            .with_latency_for("list_notes", "A", 500);

        let start = tokio::time::Instant::now();
        gateway.list_notes("B").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));

        let start = tokio::time::Instant::now();
        gateway.list_notes("A").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_move_note_changes_folder() {
        let gateway = MockGateway::new().with_note("1", "A", "hello");
        gateway.move_note("1", "B").await.unwrap();
        assert_eq!(gateway.note("1").unwrap().folder_id, "B");
        assert_eq!(
            gateway.calls_for("move_note")[0].args,
            vec!["1".to_string(), "B".to_string()]
        );
    }
}
