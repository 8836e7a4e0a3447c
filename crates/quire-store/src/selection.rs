//! Selection state machine.
//!
//! Tracks which folder is selected, which note is open, and whether the
//! recycle bin is being browsed. Every view switch bumps a generation
//! counter; asynchronous results tagged with an older generation belong to
//! a view that no longer exists and must be discarded.
//!
//! The type is pure (no I/O, no locking) so the store can drive it under its
//! state lock and tests can exercise every transition directly.

use serde::Serialize;

use quire_core::{FolderId, Note, NoteId, StoreEvent};

/// Current selection and view mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    selected_folder_id: Option<FolderId>,
    current_note_id: Option<NoteId>,
    current_note: Option<Note>,
    browsing_deleted: bool,
    #[serde(skip)]
    generation: u64,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_folder_id(&self) -> Option<&str> {
        self.selected_folder_id.as_deref()
    }

    /// Id of the note being edited, whether opened in the editor or just
    /// created from the composer.
    pub fn current_note_id(&self) -> Option<&str> {
        self.current_note_id.as_deref()
    }

    /// The note open in the editor view.
    pub fn current_note(&self) -> Option<&Note> {
        self.current_note.as_ref()
    }

    pub fn is_browsing_deleted(&self) -> bool {
        self.browsing_deleted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a result tagged with `generation` still belongs to the
    /// visible view.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Whether the per-folder list of `folder_id` is the visible view.
    pub fn shows_folder(&self, folder_id: &str) -> bool {
        !self.browsing_deleted && self.selected_folder_id.as_deref() == Some(folder_id)
    }

    /// Whether `note_id` is referenced by either note slot.
    pub fn references_note(&self, note_id: &str) -> bool {
        self.current_note_id.as_deref() == Some(note_id)
            || self.current_note.as_ref().is_some_and(|n| n.id == note_id)
    }

    /// Switch to a folder (or to nothing). Leaves the recycle bin and closes
    /// the open note. Returns the new generation.
    pub fn select_folder(&mut self, folder_id: Option<FolderId>) -> u64 {
        self.selected_folder_id = folder_id;
        self.browsing_deleted = false;
        self.close_note();
        self.bump()
    }

    /// Switch to the recycle bin. Deselects the folder and closes the open
    /// note. Returns the new generation.
    pub fn enter_recycle_bin(&mut self) -> u64 {
        self.selected_folder_id = None;
        self.browsing_deleted = true;
        self.close_note();
        self.bump()
    }

    /// Open `note` in the editor, or close the editor with `None`.
    ///
    /// `visible` is the list currently shown (the folder's notes, or the
    /// recycle bin). Opening a note that is not in it returns `false` and
    /// changes nothing.
    pub fn open_note(&mut self, note: Option<Note>, visible: &[Note]) -> bool {
        match note {
            Some(note) => {
                if self.selected_folder_id.is_none() && !self.browsing_deleted {
                    return false;
                }
                if !visible.iter().any(|n| n.id == note.id) {
                    return false;
                }
                self.current_note_id = Some(note.id.clone());
                self.current_note = Some(note);
                true
            }
            None => {
                self.close_note();
                true
            }
        }
    }

    /// Point the composer at a freshly created note. An open note with a
    /// different id is closed.
    pub fn set_current_note_id(&mut self, note_id: Option<NoteId>) {
        if self.current_note.as_ref().map(|n| &n.id) != note_id.as_ref() {
            self.current_note = None;
        }
        self.current_note_id = note_id;
    }

    /// Drop every reference to `note_id`. Returns `true` if anything changed.
    pub fn forget_note(&mut self, note_id: &str) -> bool {
        let mut changed = false;
        if self.current_note_id.as_deref() == Some(note_id) {
            self.current_note_id = None;
            changed = true;
        }
        if self.current_note.as_ref().is_some_and(|n| n.id == note_id) {
            self.current_note = None;
            changed = true;
        }
        changed
    }

    /// Mirror a confirmed content edit into the open note.
    pub fn update_current_content(&mut self, note_id: &str, content: &str) -> bool {
        match self.current_note.as_mut() {
            Some(note) if note.id == note_id => {
                note.content = content.to_string();
                true
            }
            _ => false,
        }
    }

    /// Mirror a confirmed move into the open note.
    pub fn update_current_folder(&mut self, note_id: &str, folder_id: &str) -> bool {
        match self.current_note.as_mut() {
            Some(note) if note.id == note_id => {
                note.folder_id = folder_id.to_string();
                true
            }
            _ => false,
        }
    }

    /// The event announcing this selection.
    pub fn changed_event(&self) -> StoreEvent {
        StoreEvent::SelectionChanged {
            selected_folder_id: self.selected_folder_id.clone(),
            current_note_id: self.current_note_id.clone(),
            browsing_deleted: self.browsing_deleted,
        }
    }

    fn close_note(&mut self) {
        self.current_note_id = None;
        self.current_note = None;
    }

    fn bump(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}
