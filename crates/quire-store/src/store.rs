//! The client-side state store.
//!
//! [`Store`] owns the folder list, the notes of the selected folder, the
//! recycle-bin list and the [`Selection`]. Every mutation is a gateway call
//! followed by a local update derived from the confirmed result; nothing is
//! applied before the server answers and nothing is refetched blindly
//! afterwards.
//!
//! Locking: state sits behind one `RwLock` that is never held across a
//! gateway await. After each call the operation re-acquires the lock and
//! checks that its result is still relevant (view generation, entity
//! presence) before writing.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument, warn};

use quire_core::{
    defaults, is_blank, Error, EventBus, EventEnvelope, Folder, FolderId, Note, NotesGateway,
    Result, StoreEvent,
};

use crate::guard::InFlightGuard;
use crate::outcome::Outcome;
use crate::selection::Selection;

/// Snapshot of everything the store tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreState {
    /// All folders, in server order.
    pub folders: Vec<Folder>,
    /// Notes of the selected folder. Empty while browsing the recycle bin.
    pub notes: Vec<Note>,
    /// Soft-deleted notes from the last recycle-bin fetch.
    pub deleted_notes: Vec<Note>,
    pub selection: Selection,
    /// Folder currently in rename-edit mode.
    pub editing_folder_id: Option<FolderId>,
    /// Last rejected intent or failed call, for display.
    pub last_error: Option<String>,
}

impl StoreState {
    pub fn folder(&self, folder_id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == folder_id)
    }

    /// A note of the active list.
    pub fn note(&self, note_id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == note_id)
    }

    pub fn deleted_note(&self, note_id: &str) -> Option<&Note> {
        self.deleted_notes.iter().find(|n| n.id == note_id)
    }

    /// Whether `note_id` is in the active list or open in the editor.
    fn knows_note(&self, note_id: &str) -> bool {
        self.note(note_id).is_some()
            || self
                .selection
                .current_note()
                .is_some_and(|n| n.id == note_id)
    }

    fn notes_changed(&self) -> StoreEvent {
        StoreEvent::NotesChanged {
            folder_id: self.selection.selected_folder_id().map(str::to_string),
            count: self.notes.len(),
        }
    }
}

struct StoreInner {
    gateway: Arc<dyn NotesGateway>,
    state: RwLock<StoreState>,
    events: EventBus,
    guard: InFlightGuard,
}

/// Shared handle to the state store. Cloning is cheap.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store on top of `gateway` with a default event bus.
    pub fn new(gateway: Arc<dyn NotesGateway>) -> Self {
        Self::with_event_bus(gateway, EventBus::default())
    }

    pub fn with_event_bus(gateway: Arc<dyn NotesGateway>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                gateway,
                state: RwLock::new(StoreState::default()),
                events,
                guard: InFlightGuard::new(),
            }),
        }
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> StoreState {
        self.inner.state.read().await.clone()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub async fn clear_error(&self) {
        self.inner.state.write().await.last_error = None;
    }

    // ========================================================================
    // Folders
    // ========================================================================

    /// Fetch the folder list and replace the local one wholesale.
    #[instrument(skip(self), fields(subsystem = "store", component = "folders", op = "load_folders"))]
    pub async fn load_folders(&self) -> Result<Outcome> {
        let folders = match self.inner.gateway.list_folders().await {
            Ok(folders) => folders,
            Err(e) => return Ok(self.remote_failed("load_folders", e).await),
        };

        let count = folders.len();
        self.inner.state.write().await.folders = folders;
        debug!(count, "Folders loaded");
        self.emit(StoreEvent::FoldersChanged { count });
        Ok(Outcome::Applied(()))
    }

    /// Create a folder at the root and put it in rename-edit mode. A blank
    /// name falls back to the placeholder name.
    #[instrument(skip(self), fields(subsystem = "store", component = "folders", op = "add_folder"))]
    pub async fn add_folder(&self, name: &str) -> Result<Outcome<Folder>> {
        let name = if is_blank(name) {
            defaults::FOLDER_NAME
        } else {
            name.trim()
        };

        let folder = match self.inner.gateway.create_folder(name, None).await {
            Ok(folder) => folder,
            Err(e) => return Ok(self.remote_failed("add_folder", e).await),
        };

        let count = {
            let mut state = self.inner.state.write().await;
            match state.folders.iter_mut().find(|f| f.id == folder.id) {
                Some(existing) => *existing = folder.clone(),
                None => state.folders.push(folder.clone()),
            }
            state.editing_folder_id = Some(folder.id.clone());
            state.folders.len()
        };

        info!(folder_id = %folder.id, name = %folder.name, "Folder created");
        self.emit(StoreEvent::FoldersChanged { count });
        self.emit(StoreEvent::EditingFolderChanged {
            folder_id: Some(folder.id.clone()),
        });
        Ok(Outcome::Applied(folder))
    }

    /// Rename a folder. On failure the folder stays in edit mode so the
    /// user can retry.
    #[instrument(skip(self), fields(subsystem = "store", component = "folders", op = "rename_folder"))]
    pub async fn rename_folder(&self, folder_id: &str, new_name: &str) -> Result<Outcome<Folder>> {
        if is_blank(new_name) {
            return Err(self.reject("Folder name cannot be empty").await);
        }

        let _permit = self
            .inner
            .guard
            .acquire(InFlightGuard::folder_key(folder_id))
            .await;

        if self.inner.state.read().await.folder(folder_id).is_none() {
            debug!(folder_id, "Rename of unknown folder ignored");
            return Ok(Outcome::Missing);
        }

        let renamed = match self
            .inner
            .gateway
            .rename_folder(folder_id, new_name.trim())
            .await
        {
            Ok(folder) => folder,
            Err(e) => return Ok(self.remote_failed("rename_folder", e).await),
        };

        let (count, left_edit_mode) = {
            let mut state = self.inner.state.write().await;
            let Some(existing) = state.folders.iter_mut().find(|f| f.id == folder_id) else {
                debug!(folder_id, "Folder vanished while renaming");
                return Ok(Outcome::Superseded);
            };
            *existing = renamed.clone();
            let left_edit_mode = state.editing_folder_id.as_deref() == Some(folder_id);
            if left_edit_mode {
                state.editing_folder_id = None;
            }
            (state.folders.len(), left_edit_mode)
        };

        info!(folder_id, name = %renamed.name, "Folder renamed");
        self.emit(StoreEvent::FoldersChanged { count });
        if left_edit_mode {
            self.emit(StoreEvent::EditingFolderChanged { folder_id: None });
        }
        Ok(Outcome::Applied(renamed))
    }

    /// Delete a folder. When it was selected, selection falls back to the
    /// previous folder in list order (or the first, or none).
    #[instrument(skip(self), fields(subsystem = "store", component = "folders", op = "delete_folder"))]
    pub async fn delete_folder(&self, folder_id: &str) -> Result<Outcome> {
        let permit = self
            .inner
            .guard
            .acquire(InFlightGuard::folder_key(folder_id))
            .await;

        if self.inner.state.read().await.folder(folder_id).is_none() {
            debug!(folder_id, "Delete of unknown folder ignored");
            return Ok(Outcome::Missing);
        }

        if let Err(e) = self.inner.gateway.delete_folder(folder_id).await {
            return Ok(self.remote_failed("delete_folder", e).await);
        }
        drop(permit);

        let (count, fallback, left_edit_mode) = {
            let mut state = self.inner.state.write().await;
            let Some(index) = state.folders.iter().position(|f| f.id == folder_id) else {
                debug!(folder_id, "Folder vanished while deleting");
                return Ok(Outcome::Superseded);
            };
            state.folders.remove(index);

            let left_edit_mode = state.editing_folder_id.as_deref() == Some(folder_id);
            if left_edit_mode {
                state.editing_folder_id = None;
            }

            let fallback = (state.selection.selected_folder_id() == Some(folder_id)).then(|| {
                let neighbour = match index {
                    0 => state.folders.first(),
                    i => state.folders.get(i - 1),
                };
                neighbour.map(|f| f.id.clone())
            });
            (state.folders.len(), fallback, left_edit_mode)
        };

        info!(folder_id, "Folder deleted");
        self.emit(StoreEvent::FoldersChanged { count });
        if left_edit_mode {
            self.emit(StoreEvent::EditingFolderChanged { folder_id: None });
        }

        if let Some(next) = fallback {
            debug!(next = ?next, "Selected folder deleted, moving selection");
            // The refetch reports its own failure.
            let _ = self.select_folder(next.as_deref()).await?;
        }
        Ok(Outcome::Applied(()))
    }

    /// Enter or leave rename-edit mode. Unknown folder ids are ignored.
    pub async fn set_editing_folder(&self, folder_id: Option<&str>) -> bool {
        {
            let mut state = self.inner.state.write().await;
            if let Some(id) = folder_id {
                if state.folder(id).is_none() {
                    return false;
                }
            }
            state.editing_folder_id = folder_id.map(str::to_string);
        }
        self.emit(StoreEvent::EditingFolderChanged {
            folder_id: folder_id.map(str::to_string),
        });
        true
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select a folder (or none) and fetch its notes.
    ///
    /// Closes the open note and empties the recycle-bin list immediately.
    /// The notes fetch is applied only if no other view switch happened
    /// while it was in flight.
    #[instrument(skip(self), fields(subsystem = "store", component = "selection", op = "select_folder"))]
    pub async fn select_folder(&self, folder_id: Option<&str>) -> Result<Outcome> {
        let (generation, selection_changed) = {
            let mut state = self.inner.state.write().await;
            let generation = state
                .selection
                .select_folder(folder_id.map(str::to_string));
            state.notes.clear();
            state.deleted_notes.clear();
            (generation, state.selection.changed_event())
        };

        self.emit(selection_changed);
        self.emit(StoreEvent::NotesChanged {
            folder_id: folder_id.map(str::to_string),
            count: 0,
        });
        self.emit(StoreEvent::DeletedNotesChanged { count: 0 });

        let Some(folder_id) = folder_id else {
            return Ok(Outcome::Applied(()));
        };

        let notes = match self.inner.gateway.list_notes(folder_id).await {
            Ok(notes) => notes,
            Err(e) => return Ok(self.view_fetch_failed("select_folder", e, generation).await),
        };

        let count = notes.len();
        {
            let mut state = self.inner.state.write().await;
            if !state.selection.is_current(generation) {
                debug!(folder_id, generation, "Discarding notes for a replaced view");
                return Ok(Outcome::Superseded);
            }
            state.notes = notes;
        }

        debug!(folder_id, count, "Notes loaded");
        self.emit(StoreEvent::NotesChanged {
            folder_id: Some(folder_id.to_string()),
            count,
        });
        Ok(Outcome::Applied(()))
    }

    /// Open a note in the editor, or close it with `None`. Opening is
    /// ignored unless the note is in the visible list: the selected
    /// folder's notes, or the recycle bin.
    pub async fn set_current_note(&self, note: Option<Note>) -> bool {
        let event = {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;
            let visible = if state.selection.is_browsing_deleted() {
                &state.deleted_notes
            } else {
                &state.notes
            };
            if !state.selection.open_note(note, visible) {
                debug!("Open note ignored, not in the visible list");
                return false;
            }
            state.selection.changed_event()
        };
        self.emit(event);
        true
    }

    /// Switch to the recycle bin and fetch the soft-deleted notes.
    ///
    /// The active list, the selected folder and the open note are cleared
    /// before the fetch is issued. The previous recycle-bin contents stay
    /// until the new set arrives.
    #[instrument(skip(self), fields(subsystem = "store", component = "selection", op = "fetch_deleted_notes"))]
    pub async fn fetch_deleted_notes(&self) -> Result<Outcome> {
        let (generation, selection_changed) = {
            let mut state = self.inner.state.write().await;
            let generation = state.selection.enter_recycle_bin();
            state.notes.clear();
            (generation, state.selection.changed_event())
        };

        self.emit(selection_changed);
        self.emit(StoreEvent::NotesChanged {
            folder_id: None,
            count: 0,
        });

        let deleted = match self.inner.gateway.list_deleted_notes().await {
            Ok(notes) => notes,
            Err(e) => {
                return Ok(self
                    .view_fetch_failed("fetch_deleted_notes", e, generation)
                    .await)
            }
        };

        let count = deleted.len();
        {
            let mut state = self.inner.state.write().await;
            if !state.selection.is_current(generation) {
                debug!(generation, "Discarding deleted notes for a replaced view");
                return Ok(Outcome::Superseded);
            }
            state.deleted_notes = deleted;
        }

        debug!(count, "Deleted notes loaded");
        self.emit(StoreEvent::DeletedNotesChanged { count });
        Ok(Outcome::Applied(()))
    }

    // ========================================================================
    // Notes
    // ========================================================================

    /// Create a note in the selected folder and make it the current note.
    ///
    /// The created note is appended only if the same folder is still shown
    /// when the server answers.
    #[instrument(skip(self, content), fields(subsystem = "store", component = "notes", op = "add_note", content_len = content.len()))]
    pub async fn add_note(&self, content: &str) -> Result<Outcome<Note>> {
        let folder_id = self
            .inner
            .state
            .read()
            .await
            .selection
            .selected_folder_id()
            .map(str::to_string);
        let Some(folder_id) = folder_id else {
            return Err(self.reject("No folder selected").await);
        };
        if is_blank(content) {
            return Err(self.reject("Note content cannot be empty").await);
        }

        let note = match self.inner.gateway.create_note(content, &folder_id).await {
            Ok(note) => note,
            Err(e) => return Ok(self.remote_failed("add_note", e).await),
        };

        let (notes_changed, selection_changed) = {
            let mut state = self.inner.state.write().await;
            if !state.selection.shows_folder(&folder_id) {
                debug!(folder_id = %folder_id, note_id = %note.id, "Created note belongs to a replaced view");
                return Ok(Outcome::Superseded);
            }
            match state.notes.iter_mut().find(|n| n.id == note.id) {
                Some(existing) => *existing = note.clone(),
                None => state.notes.push(note.clone()),
            }
            state.selection.set_current_note_id(Some(note.id.clone()));
            (state.notes_changed(), state.selection.changed_event())
        };

        info!(note_id = %note.id, folder_id = %folder_id, "Note created");
        self.emit(notes_changed);
        self.emit(selection_changed);
        Ok(Outcome::Applied(note))
    }

    /// Replace a note's content.
    ///
    /// Edits of one note reach the server in issue order; an edit that is
    /// still queued when a newer one is issued is dropped as `Superseded`.
    #[instrument(skip(self, content), fields(subsystem = "store", component = "notes", op = "edit_note", content_len = content.len()))]
    pub async fn edit_note(&self, note_id: &str, content: &str) -> Result<Outcome> {
        if is_blank(content) {
            return Err(self.reject("Note content cannot be empty").await);
        }

        let seq = self.inner.guard.next_edit(note_id);
        let _permit = self
            .inner
            .guard
            .acquire(InFlightGuard::note_key(note_id))
            .await;

        if !self.inner.guard.is_latest_edit(note_id, seq) {
            debug!(note_id, seq, "Queued edit superseded by a newer one");
            return Ok(Outcome::Superseded);
        }
        if !self.inner.state.read().await.knows_note(note_id) {
            debug!(note_id, "Edit of unknown note ignored");
            self.inner.guard.forget_edits(note_id);
            return Ok(Outcome::Missing);
        }

        let saved = self.inner.gateway.edit_note(note_id, content).await;
        self.inner.guard.finish_edit(note_id, seq);
        if let Err(e) = saved {
            return Ok(self.remote_failed("edit_note", e).await);
        }

        let (notes_changed, selection_changed) = {
            let mut state = self.inner.state.write().await;
            let in_list = match state.notes.iter_mut().find(|n| n.id == note_id) {
                Some(note) => {
                    note.content = content.to_string();
                    true
                }
                None => false,
            };
            let in_editor = state.selection.update_current_content(note_id, content);
            if !in_list && !in_editor {
                debug!(note_id, "Note left the local state while saving");
                return Ok(Outcome::Superseded);
            }
            (
                in_list.then(|| state.notes_changed()),
                in_editor.then(|| state.selection.changed_event()),
            )
        };

        info!(note_id, "Note saved");
        for event in [notes_changed, selection_changed].into_iter().flatten() {
            self.emit(event);
        }
        Ok(Outcome::Applied(()))
    }

    /// Soft-delete a note and drop every reference to it.
    #[instrument(skip(self), fields(subsystem = "store", component = "notes", op = "delete_note"))]
    pub async fn delete_note(&self, note_id: &str) -> Result<Outcome> {
        let _permit = self
            .inner
            .guard
            .acquire(InFlightGuard::note_key(note_id))
            .await;

        if !self.inner.state.read().await.knows_note(note_id) {
            debug!(note_id, "Delete of unknown note ignored");
            return Ok(Outcome::Missing);
        }

        if let Err(e) = self.inner.gateway.delete_note(note_id).await {
            return Ok(self.remote_failed("delete_note", e).await);
        }

        let (notes_changed, selection_changed) = {
            let mut state = self.inner.state.write().await;
            state.notes.retain(|n| n.id != note_id);
            let forgot = state.selection.forget_note(note_id);
            (
                state.notes_changed(),
                forgot.then(|| state.selection.changed_event()),
            )
        };
        self.inner.guard.forget_edits(note_id);

        info!(note_id, "Note deleted");
        self.emit(notes_changed);
        if let Some(event) = selection_changed {
            self.emit(event);
        }
        Ok(Outcome::Applied(()))
    }

    /// Move a note to another folder. The note leaves the active list even
    /// when the target is the folder being shown.
    #[instrument(skip(self), fields(subsystem = "store", component = "notes", op = "move_note"))]
    pub async fn move_note(&self, note_id: &str, target_folder_id: &str) -> Result<Outcome> {
        let _permit = self
            .inner
            .guard
            .acquire(InFlightGuard::note_key(note_id))
            .await;

        if !self.inner.state.read().await.knows_note(note_id) {
            debug!(note_id, "Move of unknown note ignored");
            return Ok(Outcome::Missing);
        }

        if let Err(e) = self.inner.gateway.move_note(note_id, target_folder_id).await {
            return Ok(self.remote_failed("move_note", e).await);
        }

        let (notes_changed, selection_changed) = {
            let mut state = self.inner.state.write().await;
            state.notes.retain(|n| n.id != note_id);
            let moved_open_note = state
                .selection
                .update_current_folder(note_id, target_folder_id);
            (
                state.notes_changed(),
                moved_open_note.then(|| state.selection.changed_event()),
            )
        };

        info!(note_id, target_folder_id, "Note moved");
        self.emit(notes_changed);
        if let Some(event) = selection_changed {
            self.emit(event);
        }
        Ok(Outcome::Applied(()))
    }

    /// Restore a soft-deleted note. It reappears in the active list the next
    /// time its folder is selected.
    #[instrument(skip(self), fields(subsystem = "store", component = "notes", op = "restore_note"))]
    pub async fn restore_note(&self, note_id: &str) -> Result<Outcome> {
        let _permit = self
            .inner
            .guard
            .acquire(InFlightGuard::note_key(note_id))
            .await;

        if self.inner.state.read().await.deleted_note(note_id).is_none() {
            debug!(note_id, "Restore of unknown note ignored");
            return Ok(Outcome::Missing);
        }

        if let Err(e) = self.inner.gateway.restore_note(note_id).await {
            return Ok(self.remote_failed("restore_note", e).await);
        }

        let count = {
            let mut state = self.inner.state.write().await;
            state.deleted_notes.retain(|n| n.id != note_id);
            state.deleted_notes.len()
        };

        info!(note_id, "Note restored");
        self.emit(StoreEvent::DeletedNotesChanged { count });
        Ok(Outcome::Applied(()))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn emit(&self, event: StoreEvent) {
        self.inner.events.emit(event);
    }

    /// Record and broadcast a rejected intent.
    async fn reject(&self, message: &str) -> Error {
        debug!(message, "Intent rejected");
        self.inner.state.write().await.last_error = Some(message.to_string());
        self.emit(StoreEvent::ValidationFailed {
            message: message.to_string(),
        });
        Error::Validation(message.to_string())
    }

    /// Record and broadcast a failed gateway call. Local state is untouched.
    async fn remote_failed<T>(&self, op: &'static str, err: Error) -> Outcome<T> {
        warn!(op, error = %err, "Remote call failed, local state unchanged");
        let message = err.to_string();
        self.inner.state.write().await.last_error = Some(format!("{op}: {message}"));
        self.emit(StoreEvent::RemoteFailed {
            op: op.to_string(),
            message,
        });
        Outcome::RemoteFailed
    }

    /// A failed fetch for a view. Reported only while that view is still
    /// the visible one.
    async fn view_fetch_failed(&self, op: &'static str, err: Error, generation: u64) -> Outcome {
        let message = err.to_string();
        {
            let mut state = self.inner.state.write().await;
            if !state.selection.is_current(generation) {
                debug!(op, generation, error = %err, "Discarding failure for a replaced view");
                return Outcome::Superseded;
            }
            state.last_error = Some(format!("{op}: {message}"));
        }
        warn!(op, error = %err, "Remote call failed, local state unchanged");
        self.emit(StoreEvent::RemoteFailed {
            op: op.to_string(),
            message,
        });
        Outcome::RemoteFailed
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("subscribers", &self.inner.events.subscriber_count())
            .finish_non_exhaustive()
    }
}
