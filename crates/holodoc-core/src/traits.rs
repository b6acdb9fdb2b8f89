//! Core traits for HoloDoc abstractions.
//!
//! [`DocumentService`] is the seam between the session and the remote
//! document-matching server, so the session can run against HTTP or a mock.

use async_trait::async_trait;

use crate::frame::CameraFrame;
use crate::models::{DocumentId, PendingEdit, Rgb};
use crate::wire::{ConnectedAnswer, DocumentAnswer, Reply, SimpleAnswer};

/// Remote document-matching backend.
///
/// Methods never return `Err` for network problems: failures are reported
/// through [`Reply::success`] and [`Reply::failure`].
#[async_trait]
pub trait DocumentService: Send + Sync + 'static {
    /// Liveness probe.
    async fn ping(&self) -> Reply<SimpleAnswer>;

    /// Match the frame against known documents, creating one if none matches.
    async fn match_or_create(&self, frame: &CameraFrame) -> Reply<DocumentAnswer>;

    /// Persist edited metadata.
    async fn update_document(&self, edit: &PendingEdit) -> Reply<DocumentAnswer>;

    /// Replace the stored photo of a document.
    async fn update_photo(&self, identity: &DocumentId, frame: &CameraFrame)
        -> Reply<DocumentAnswer>;

    /// Tell the page detector which colour is background.
    async fn set_background_color(&self, color: Rgb) -> Reply<SimpleAnswer>;

    /// Record a link between two documents.
    async fn create_link(&self, first: &DocumentId, second: &DocumentId) -> Reply<SimpleAnswer>;

    /// Remove a document from its link group.
    async fn remove_link(&self, first: &DocumentId) -> Reply<SimpleAnswer>;

    /// Ask whether two documents are connected through links.
    async fn are_connected(&self, first: &DocumentId, second: &DocumentId)
        -> Reply<ConnectedAnswer>;
}
