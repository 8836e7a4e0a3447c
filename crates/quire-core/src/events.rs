//! Store event types, envelope, and event bus for change notifications.
//!
//! The state store is the only writer of client state. Every time it applies
//! a confirmed result (or rejects an intent) it emits a [`StoreEvent`] on the
//! [`EventBus`]; presentation code subscribes and re-reads the snapshot.
//! Slow subscribers may lag and miss events, which is harmless because each
//! event only says *what* changed, never the new value.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{FolderId, NoteId};

// ============================================================================
// Edit targets
// ============================================================================

/// What the autosave scheduler is persisting content for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EditTarget {
    /// A note that already exists on the server (the open editor).
    Note(NoteId),
    /// A note being composed that has not been saved yet.
    Draft,
}

impl std::fmt::Display for EditTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditTarget::Note(id) => write!(f, "note:{id}"),
            EditTarget::Draft => write!(f, "draft"),
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Sequenced wrapper around a [`StoreEvent`].
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Per-bus sequence number, starting at 1.
    pub seq: u64,
    /// When the event was emitted (UTC).
    pub emitted_at: DateTime<Utc>,
    /// Domain event.
    pub payload: StoreEvent,
}

// ============================================================================
// Store events
// ============================================================================

/// Change notifications emitted by the store and the autosave scheduler.
///
/// Serialized as JSON with a `type` tag, e.g.
/// `{"type":"RemoteFailed","op":"edit_note","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    /// The folder collection changed.
    FoldersChanged { count: usize },
    /// The active (per-folder) notes list changed.
    NotesChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        folder_id: Option<FolderId>,
        count: usize,
    },
    /// The recycle-bin list changed.
    DeletedNotesChanged { count: usize },
    /// Selected folder, open note, or view mode changed.
    SelectionChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        selected_folder_id: Option<FolderId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_note_id: Option<NoteId>,
        browsing_deleted: bool,
    },
    /// A folder entered or left rename-edit mode.
    EditingFolderChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        folder_id: Option<FolderId>,
    },
    /// An intent was rejected before reaching the server.
    ValidationFailed { message: String },
    /// A gateway call failed; local state was left untouched.
    RemoteFailed { op: String, message: String },
    /// An autosave call started.
    SaveStarted { target: EditTarget },
    /// An autosave call resolved.
    SaveFinished { target: EditTarget, success: bool },
    /// The saving indicator window for a target elapsed.
    SavingIndicatorCleared { target: EditTarget },
}

impl StoreEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            StoreEvent::FoldersChanged { .. } => "FoldersChanged",
            StoreEvent::NotesChanged { .. } => "NotesChanged",
            StoreEvent::DeletedNotesChanged { .. } => "DeletedNotesChanged",
            StoreEvent::SelectionChanged { .. } => "SelectionChanged",
            StoreEvent::EditingFolderChanged { .. } => "EditingFolderChanged",
            StoreEvent::ValidationFailed { .. } => "ValidationFailed",
            StoreEvent::RemoteFailed { .. } => "RemoteFailed",
            StoreEvent::SaveStarted { .. } => "SaveStarted",
            StoreEvent::SaveFinished { .. } => "SaveFinished",
            StoreEvent::SavingIndicatorCleared { .. } => "SavingIndicatorCleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus distributing store events to any number of
/// subscribers.
///
/// Uses `tokio::sync::broadcast` with a fixed buffer. Emitting with no
/// subscribers is a no-op.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
    seq: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: StoreEvent) {
        let envelope = EventEnvelope {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            emitted_at: Utc::now(),
            payload: event,
        };
        tracing::trace!(
            event_type = envelope.payload.event_type(),
            seq = envelope.seq,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive events. Each subscriber gets its own stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        bus.emit(StoreEvent::FoldersChanged { count: 3 });

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.payload, StoreEvent::FoldersChanged { count: 3 });
        assert_eq!(envelope.seq, 1);
    }

    #[tokio::test]
    async fn test_event_bus_sequence_increments() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        bus.emit(StoreEvent::DeletedNotesChanged { count: 0 });
        bus.emit(StoreEvent::DeletedNotesChanged { count: 1 });

        assert_eq!(rx.recv().await.unwrap().seq, 1);
        assert_eq!(rx.recv().await.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(StoreEvent::ValidationFailed {
            message: "No folder selected".into(),
        });

        assert_eq!(rx1.recv().await.unwrap().payload.event_type(), "ValidationFailed");
        assert_eq!(rx2.recv().await.unwrap().payload.event_type(), "ValidationFailed");
    }

    #[test]
    fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::default();
        bus.emit(StoreEvent::FoldersChanged { count: 0 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_bus_subscriber_count() {
        let bus = EventBus::new(8);
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_store_event_json_serialization() {
        let event = StoreEvent::RemoteFailed {
            op: "edit_note".into(),
            message: "timeout".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"RemoteFailed""#));
        assert!(json.contains(r#""op":"edit_note""#));
    }

    #[test]
    fn test_selection_changed_skips_empty_ids() {
        let event = StoreEvent::SelectionChanged {
            selected_folder_id: None,
            current_note_id: None,
            browsing_deleted: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("selected_folder_id"));
        assert!(json.contains(r#""browsing_deleted":true"#));
    }

    #[test]
    fn test_edit_target_serialization_and_display() {
        let json = serde_json::to_string(&EditTarget::Note("7".into())).unwrap();
        assert_eq!(json, r#"{"kind":"note","id":"7"}"#);
        assert_eq!(EditTarget::Note("7".into()).to_string(), "note:7");
        assert_eq!(EditTarget::Draft.to_string(), "draft");
    }
}
