//! Core traits for quire abstractions.
//!
//! The state store only ever talks to the server through [`NotesGateway`],
//! which keeps the HTTP transport pluggable and the store testable.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Folder, Note};

/// One operation per server endpoint. Calls are not idempotent; nothing
/// here retries.
#[async_trait]
pub trait NotesGateway: Send + Sync {
    /// List every folder, in server order.
    async fn list_folders(&self) -> Result<Vec<Folder>>;

    /// Create a folder; the server assigns the id.
    async fn create_folder(&self, name: &str, parent_folder_id: Option<&str>) -> Result<Folder>;

    /// Rename a folder and return the updated object.
    async fn rename_folder(&self, folder_id: &str, name: &str) -> Result<Folder>;

    /// Delete a folder.
    async fn delete_folder(&self, folder_id: &str) -> Result<()>;

    /// List the live notes of one folder.
    async fn list_notes(&self, folder_id: &str) -> Result<Vec<Note>>;

    /// List soft-deleted notes (the recycle bin).
    async fn list_deleted_notes(&self) -> Result<Vec<Note>>;

    /// Create a note in a folder.
    async fn create_note(&self, content: &str, folder_id: &str) -> Result<Note>;

    /// Replace a note's content.
    async fn edit_note(&self, note_id: &str, content: &str) -> Result<()>;

    /// Soft-delete a note.
    async fn delete_note(&self, note_id: &str) -> Result<()>;

    /// Move a note into another folder.
    async fn move_note(&self, note_id: &str, target_folder_id: &str) -> Result<()>;

    /// Bring a soft-deleted note back.
    async fn restore_note(&self, note_id: &str) -> Result<()>;
}
