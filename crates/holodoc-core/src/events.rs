//! Document event types, envelope, and event bus.
//!
//! The session reports everything the presentation layer has to react to
//! (a match arrived, an ingest failed, a link broke, a request failed) as a
//! [`DocumentEvent`] on a broadcast [`EventBus`]. Consumers subscribe
//! independently; emitting without subscribers is not an error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{DocumentId, EntityId, LinkId};

// ============================================================================
// Event Envelope
// ============================================================================

/// Self-describing wrapper around a [`DocumentEvent`].
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g., `"document.matched"`, `"link.broken"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Entity this event relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    /// Domain-specific event data.
    pub payload: DocumentEvent,
}

impl EventEnvelope {
    pub fn new(event: DocumentEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            entity_id: event.entity_id(),
            payload: event,
        }
    }
}

// ============================================================================
// Document Event (domain payloads)
// ============================================================================

/// Session events, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DocumentEvent {
    /// A frame was captured and a match-or-create request dispatched.
    Captured { entity: EntityId },
    /// Match-or-create returned an identity for the entity.
    Matched {
        entity: EntityId,
        identity: DocumentId,
    },
    /// Match-or-create failed; the record stays speculative until re-captured.
    IngestFailed { entity: EntityId, reason: String },
    /// Local edit applied (and dispatched when the document is durable).
    Edited { entity: EntityId, dispatched: bool },
    /// Server confirmed an edit; these records now mirror the server.
    Reconciled {
        identity: DocumentId,
        entities: Vec<EntityId>,
    },
    /// A metadata or photo update was not confirmed. Local state kept.
    SyncFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        entity: Option<EntityId>,
        operation: String,
        reason: String,
    },
    /// Photo replaced on the server.
    PhotoUpdated {
        entity: EntityId,
        identity: DocumentId,
    },
    /// Two entities now share a link group.
    Linked {
        source: EntityId,
        target: EntityId,
        link: LinkId,
    },
    /// Entity left its link group; its outline should be cleared.
    LinkBroken { entity: EntityId, previous: LinkId },
    /// Mirroring a link change to the server failed. Local grouping kept.
    LinkSyncFailed {
        entity: EntityId,
        operation: String,
        reason: String,
    },
    /// Result of an are-connected query.
    ConnectionChecked {
        first: DocumentId,
        second: DocumentId,
        connected: bool,
    },
    /// Background colour request completed.
    BackgroundColorSet { success: bool },
    /// Ping completed.
    Pong { success: bool },
}

impl DocumentEvent {
    /// Namespaced event type for the envelope.
    pub fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::Captured { .. } => "document.captured",
            DocumentEvent::Matched { .. } => "document.matched",
            DocumentEvent::IngestFailed { .. } => "document.ingest_failed",
            DocumentEvent::Edited { .. } => "document.edited",
            DocumentEvent::Reconciled { .. } => "document.reconciled",
            DocumentEvent::SyncFailed { .. } => "document.sync_failed",
            DocumentEvent::PhotoUpdated { .. } => "document.photo_updated",
            DocumentEvent::Linked { .. } => "link.created",
            DocumentEvent::LinkBroken { .. } => "link.broken",
            DocumentEvent::LinkSyncFailed { .. } => "link.sync_failed",
            DocumentEvent::ConnectionChecked { .. } => "link.connection_checked",
            DocumentEvent::BackgroundColorSet { .. } => "server.background_color",
            DocumentEvent::Pong { .. } => "server.pong",
        }
    }

    /// Primary entity this event relates to.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            DocumentEvent::Captured { entity }
            | DocumentEvent::Matched { entity, .. }
            | DocumentEvent::IngestFailed { entity, .. }
            | DocumentEvent::Edited { entity, .. }
            | DocumentEvent::PhotoUpdated { entity, .. }
            | DocumentEvent::LinkBroken { entity, .. }
            | DocumentEvent::LinkSyncFailed { entity, .. } => Some(*entity),
            DocumentEvent::Linked { source, .. } => Some(*source),
            DocumentEvent::SyncFailed { entity, .. } => *entity,
            DocumentEvent::Reconciled { entities, .. } => entities.first().copied(),
            DocumentEvent::ConnectionChecked { .. }
            | DocumentEvent::BackgroundColorSet { .. }
            | DocumentEvent::Pong { .. } => None,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus for session events.
///
/// Slow receivers that fall behind receive a `Lagged` error and miss events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: DocumentEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}
