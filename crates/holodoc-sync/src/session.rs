//! Session orchestration: local state plus asynchronous server round trips.
//!
//! A [`Session`] owns the [`DocumentRegistry`] and [`LinkGraph`]. Every
//! operation updates local state immediately, dispatches its remote call and
//! returns. Completions come back over a channel and are applied on the
//! caller's task through [`Session::next_completion`] or
//! [`Session::drain_completions`], so registry mutation stays single-threaded.
//!
//! Edits are optimistic. Confirmations are applied in arrival order; a
//! confirmation that arrives late overwrites newer local edits. Failures keep
//! local state and are reported as events. Nothing is rolled back.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

use holodoc_core::defaults;
use holodoc_core::{
    CameraFrame, ConnectedAnswer, DocumentAnswer, DocumentEvent, DocumentField, DocumentFields,
    DocumentId, DocumentRecord, DocumentRegistry, DocumentService, EntityId, Endpoint, Error, EventBus,
    EventEnvelope, FieldEditSession, LinkGraph, LinkId, LinkOutcome, PendingEdit, Reconciliation,
    Reply, Result, Rgb, SimpleAnswer, SyncFailure,
};

use crate::dispatch::Dispatcher;

/// A finished remote call, tagged with what it was for.
#[derive(Debug, Clone)]
pub enum Completion {
    Matched {
        entity: EntityId,
        reply: Reply<DocumentAnswer>,
    },
    Updated {
        entity: EntityId,
        reply: Reply<DocumentAnswer>,
    },
    PhotoUpdated {
        entity: EntityId,
        reply: Reply<DocumentAnswer>,
    },
    LinkCreated {
        entity: EntityId,
        reply: Reply<SimpleAnswer>,
    },
    LinkRemoved {
        entity: EntityId,
        reply: Reply<SimpleAnswer>,
    },
    Connected {
        first: DocumentId,
        second: DocumentId,
        reply: Reply<ConnectedAnswer>,
    },
    BackgroundColor {
        reply: Reply<SimpleAnswer>,
    },
    Pong {
        reply: Reply<SimpleAnswer>,
    },
}

impl Completion {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Completion::Matched { .. } => Endpoint::MatchOrCreate,
            Completion::Updated { .. } => Endpoint::UpdateDocument,
            Completion::PhotoUpdated { .. } => Endpoint::UpdatePhoto,
            Completion::LinkCreated { .. } => Endpoint::CreateLink,
            Completion::LinkRemoved { .. } => Endpoint::RemoveLink,
            Completion::Connected { .. } => Endpoint::Connected,
            Completion::BackgroundColor { .. } => Endpoint::BackgroundColor,
            Completion::Pong { .. } => Endpoint::Ping,
        }
    }

    /// Whether the call succeeded.
    pub fn success(&self) -> bool {
        match self {
            Completion::Matched { reply, .. }
            | Completion::Updated { reply, .. }
            | Completion::PhotoUpdated { reply, .. } => reply.success,
            Completion::LinkCreated { reply, .. }
            | Completion::LinkRemoved { reply, .. }
            | Completion::BackgroundColor { reply }
            | Completion::Pong { reply } => reply.success,
            Completion::Connected { reply, .. } => reply.success,
        }
    }
}

/// What [`Session::edit`] did beyond the local update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditDispatch {
    /// An update request is in flight.
    Sent,
    /// The record has no identity yet; the edit stays local.
    LocalOnly,
}

fn reason(failure: &Option<SyncFailure>) -> String {
    failure
        .as_ref()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "unknown failure".to_string())
}

/// Documents, links and the server connection of one running session.
pub struct Session {
    registry: DocumentRegistry,
    links: LinkGraph,
    dispatcher: Dispatcher<dyn DocumentService>,
    events: EventBus,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl Session {
    pub fn new(service: Arc<dyn DocumentService>) -> Self {
        Self::with_event_bus(service, EventBus::default())
    }

    pub fn with_event_bus(service: Arc<dyn DocumentService>, events: EventBus) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            registry: DocumentRegistry::new(),
            links: LinkGraph::new(),
            dispatcher: Dispatcher::new(service),
            events,
            tx,
            rx,
        }
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn links(&self) -> &LinkGraph {
        &self.links
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    pub fn record(&self, entity: EntityId) -> Option<&DocumentRecord> {
        self.registry.get(entity)
    }

    /// Remote calls not yet applied.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    // =========================================================================
    // Matcher / ingest
    // =========================================================================

    /// Register a speculative record for `frame` and ask the server to match
    /// or create it.
    #[instrument(skip(self, frame), fields(subsystem = "sync", component = "session", op = "capture"))]
    pub fn capture(&mut self, frame: CameraFrame) -> EntityId {
        let entity = self.registry.create_local().entity();
        if let Err(e) = self.registry.attach_photo(entity, frame.clone()) {
            warn!(entity_id = %entity, error = %e, "Could not attach captured frame");
        }
        self.events.emit(DocumentEvent::Captured { entity });
        self.dispatch_match(entity, frame);
        entity
    }

    /// Re-send match-or-create for a record whose ingest failed.
    pub fn retry_capture(&mut self, entity: EntityId) -> Result<()> {
        let record = self
            .registry
            .get(entity)
            .ok_or(Error::EntityNotFound(entity))?;
        if record.is_durable() {
            return Err(Error::InvalidInput(format!(
                "entity {} already has a server identity",
                entity
            )));
        }
        let frame = record
            .photo()
            .cloned()
            .ok_or_else(|| Error::InvalidInput(format!("entity {} has no captured frame", entity)))?;
        self.dispatch_match(entity, frame);
        Ok(())
    }

    fn dispatch_match(&self, entity: EntityId, frame: CameraFrame) {
        let tx = self.tx.clone();
        self.dispatcher.spawn(
            Endpoint::MatchOrCreate,
            move |service| async move { service.match_or_create(&frame).await },
            move |reply| {
                let _ = tx.send(Completion::Matched { entity, reply });
            },
        );
    }

    // =========================================================================
    // Metadata edits
    // =========================================================================

    /// Apply `fields` locally and, if the record is durable, send the update.
    #[instrument(skip(self, fields), fields(subsystem = "sync", component = "session", op = "edit", entity_id = %entity))]
    pub fn edit(&mut self, entity: EntityId, fields: DocumentFields) -> Result<EditDispatch> {
        let identity = self
            .registry
            .get(entity)
            .ok_or(Error::EntityNotFound(entity))?
            .identity()
            .cloned();

        match identity {
            Some(identity) => {
                self.registry.update(&identity, fields.clone())?;
                self.dispatch_update(entity, PendingEdit { identity, fields });
                self.events.emit(DocumentEvent::Edited {
                    entity,
                    dispatched: true,
                });
                Ok(EditDispatch::Sent)
            }
            None => {
                self.registry.update_entity(entity, fields)?;
                debug!("Record not yet durable, edit kept local");
                self.events.emit(DocumentEvent::Edited {
                    entity,
                    dispatched: false,
                });
                Ok(EditDispatch::LocalOnly)
            }
        }
    }

    /// Apply `fields` to every record showing `identity` and send the update.
    pub fn edit_document(&mut self, identity: &DocumentId, fields: DocumentFields) -> Result<()> {
        let entity = self
            .registry
            .entity_for(identity)
            .ok_or_else(|| Error::DocumentNotFound(identity.clone()))?;
        self.edit(entity, fields).map(|_| ())
    }

    /// Begin a single-field edit.
    pub fn open_field(&self, entity: EntityId, field: DocumentField) -> Result<FieldEditSession> {
        let record = self
            .registry
            .get(entity)
            .ok_or(Error::EntityNotFound(entity))?;
        Ok(FieldEditSession::open(record, field))
    }

    /// Finish a single-field edit and apply it like [`edit`](Self::edit).
    pub fn submit_field(&mut self, session: FieldEditSession) -> Result<EditDispatch> {
        let entity = session.entity();
        self.edit(entity, session.submit())
    }

    fn dispatch_update(&self, entity: EntityId, edit: PendingEdit) {
        let tx = self.tx.clone();
        self.dispatcher.spawn(
            Endpoint::UpdateDocument,
            move |service| async move { service.update_document(&edit).await },
            move |reply| {
                let _ = tx.send(Completion::Updated { entity, reply });
            },
        );
    }

    /// Attach `frame` locally and replace the photo of a durable document.
    #[instrument(skip(self, frame), fields(subsystem = "sync", component = "session", op = "update_photo", entity_id = %entity))]
    pub fn update_photo(&mut self, entity: EntityId, frame: CameraFrame) -> Result<()> {
        let identity = self
            .registry
            .get(entity)
            .ok_or(Error::EntityNotFound(entity))?
            .identity()
            .cloned()
            .ok_or(Error::Unassigned(entity))?;
        self.registry.attach_photo(entity, frame.clone())?;

        let tx = self.tx.clone();
        self.dispatcher.spawn(
            Endpoint::UpdatePhoto,
            move |service| async move { service.update_photo(&identity, &frame).await },
            move |reply| {
                let _ = tx.send(Completion::PhotoUpdated { entity, reply });
            },
        );
        Ok(())
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Remember `source` as the anchor of a link gesture.
    pub fn start_link(&mut self, source: EntityId) -> Result<()> {
        if !self.registry.contains(source) {
            return Err(Error::EntityNotFound(source));
        }
        self.links.start_link(source);
        Ok(())
    }

    pub fn cancel_link(&mut self) -> Option<EntityId> {
        self.links.cancel_link()
    }

    /// Complete a link gesture on `target` and mirror it to the server.
    #[instrument(skip(self), fields(subsystem = "sync", component = "session", op = "end_link", entity_id = %target))]
    pub fn end_link(&mut self, target: EntityId) -> Result<LinkOutcome> {
        let outcome = self.links.end_link(&mut self.registry, target)?;

        if let (Some(link), Some((source, target))) = (outcome.link(), outcome.endpoints()) {
            self.events.emit(DocumentEvent::Linked {
                source,
                target,
                link,
            });
            self.mirror_link(source, target);
        }
        Ok(outcome)
    }

    fn mirror_link(&mut self, source: EntityId, target: EntityId) {
        let first = self.registry.get(source).and_then(|r| r.identity().cloned());
        let second = self.registry.get(target).and_then(|r| r.identity().cloned());

        match (first, second) {
            (Some(first), Some(second)) => {
                let tx = self.tx.clone();
                self.dispatcher.spawn(
                    Endpoint::CreateLink,
                    move |service| async move { service.create_link(&first, &second).await },
                    move |reply| {
                        let _ = tx.send(Completion::LinkCreated {
                            entity: source,
                            reply,
                        });
                    },
                );
            }
            (first, _) => {
                let unassigned = if first.is_none() { source } else { target };
                warn!(entity_id = %unassigned, "Link kept local: document has no server identity");
                self.events.emit(DocumentEvent::LinkSyncFailed {
                    entity: unassigned,
                    operation: Endpoint::CreateLink.operation().to_string(),
                    reason: Error::Unassigned(unassigned).to_string(),
                });
            }
        }
    }

    /// Remove `entity` from its link group and mirror the removal.
    #[instrument(skip(self), fields(subsystem = "sync", component = "session", op = "break_link", entity_id = %entity))]
    pub fn break_link(&mut self, entity: EntityId) -> Result<Option<LinkId>> {
        let previous = self.links.break_link(&mut self.registry, entity)?;
        let Some(link) = previous else {
            return Ok(None);
        };

        self.events.emit(DocumentEvent::LinkBroken {
            entity,
            previous: link,
        });

        match self.registry.get(entity).and_then(|r| r.identity().cloned()) {
            Some(identity) => {
                let tx = self.tx.clone();
                self.dispatcher.spawn(
                    Endpoint::RemoveLink,
                    move |service| async move { service.remove_link(&identity).await },
                    move |reply| {
                        let _ = tx.send(Completion::LinkRemoved { entity, reply });
                    },
                );
            }
            None => {
                self.events.emit(DocumentEvent::LinkSyncFailed {
                    entity,
                    operation: Endpoint::RemoveLink.operation().to_string(),
                    reason: Error::Unassigned(entity).to_string(),
                });
            }
        }
        Ok(Some(link))
    }

    pub fn linked_entities(&self, link: LinkId) -> Vec<EntityId> {
        self.links
            .linked_entities(&self.registry, link)
            .into_iter()
            .collect()
    }

    /// Other members of `entity`'s group, at most the preview limit.
    pub fn link_previews(&self, entity: EntityId) -> Vec<EntityId> {
        let mut peers = self.links.linked_peers(&self.registry, entity);
        peers.truncate(defaults::LINK_PREVIEW_LIMIT);
        peers
    }

    /// Ask the server whether two documents are linked.
    pub fn are_connected(&self, first: EntityId, second: EntityId) -> Result<()> {
        let first = self.durable_identity(first)?;
        let second = self.durable_identity(second)?;

        let tx = self.tx.clone();
        self.dispatcher.spawn(
            Endpoint::Connected,
            {
                let (first, second) = (first.clone(), second.clone());
                move |service| async move { service.are_connected(&first, &second).await }
            },
            move |reply| {
                let _ = tx.send(Completion::Connected {
                    first,
                    second,
                    reply,
                });
            },
        );
        Ok(())
    }

    fn durable_identity(&self, entity: EntityId) -> Result<DocumentId> {
        self.registry
            .get(entity)
            .ok_or(Error::EntityNotFound(entity))?
            .identity()
            .cloned()
            .ok_or(Error::Unassigned(entity))
    }

    // =========================================================================
    // Server utilities
    // =========================================================================

    pub fn set_background_color(&self, color: Rgb) {
        let tx = self.tx.clone();
        self.dispatcher.spawn(
            Endpoint::BackgroundColor,
            move |service| async move { service.set_background_color(color).await },
            move |reply| {
                let _ = tx.send(Completion::BackgroundColor { reply });
            },
        );
    }

    pub fn ping(&self) {
        let tx = self.tx.clone();
        self.dispatcher.spawn(
            Endpoint::Ping,
            |service| async move { service.ping().await },
            move |reply| {
                let _ = tx.send(Completion::Pong { reply });
            },
        );
    }

    // =========================================================================
    // Completions
    // =========================================================================

    /// Wait for the next completion and apply it.
    ///
    /// Returns `None` once nothing is in flight and every completion has been
    /// applied.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        let completion = match self.rx.try_recv() {
            Ok(completion) => completion,
            Err(_) if self.dispatcher.in_flight() == 0 => self.rx.try_recv().ok()?,
            Err(_) => self.rx.recv().await?,
        };
        self.apply(&completion);
        Some(completion)
    }

    /// Apply every completion that has already arrived, without waiting.
    pub fn drain_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(&completion);
            applied += 1;
        }
        applied
    }

    /// Apply completions until nothing is in flight.
    pub async fn settle(&mut self) -> usize {
        let mut applied = 0;
        while self.next_completion().await.is_some() {
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, completion: &Completion) {
        match completion {
            Completion::Matched { entity, reply } => self.apply_match(*entity, reply),
            Completion::Updated { entity, reply } => {
                self.apply_reconcile(*entity, Endpoint::UpdateDocument, reply);
            }
            Completion::PhotoUpdated { entity, reply } => self.apply_photo(*entity, reply),
            Completion::LinkCreated { entity, reply } => {
                self.apply_link_reply(*entity, Endpoint::CreateLink, reply)
            }
            Completion::LinkRemoved { entity, reply } => {
                self.apply_link_reply(*entity, Endpoint::RemoveLink, reply)
            }
            Completion::Connected {
                first,
                second,
                reply,
            } => match (&reply.answer, reply.success) {
                (Some(answer), true) => self.events.emit(DocumentEvent::ConnectionChecked {
                    first: first.clone(),
                    second: second.clone(),
                    connected: answer.connected,
                }),
                _ => self.events.emit(DocumentEvent::SyncFailed {
                    entity: None,
                    operation: Endpoint::Connected.operation().to_string(),
                    reason: reason(&reply.failure),
                }),
            },
            Completion::BackgroundColor { reply } => {
                self.events.emit(DocumentEvent::BackgroundColorSet {
                    success: reply.success,
                })
            }
            Completion::Pong { reply } => self.events.emit(DocumentEvent::Pong {
                success: reply.success,
            }),
        }
    }

    fn apply_match(&mut self, entity: EntityId, reply: &Reply<DocumentAnswer>) {
        let answer = match (&reply.answer, reply.success) {
            (Some(answer), true) => answer,
            _ => {
                let reason = reason(&reply.failure);
                warn!(entity_id = %entity, error = %reason, "Match-or-create failed");
                self.events
                    .emit(DocumentEvent::IngestFailed { entity, reason });
                return;
            }
        };

        match self.registry.apply_match(entity, answer) {
            Ok(record) => {
                let identity = record.identity().cloned();
                if let Some(identity) = identity {
                    info!(entity_id = %entity, document_id = %identity, "Capture matched");
                    self.events
                        .emit(DocumentEvent::Matched { entity, identity });
                }
            }
            Err(e) => {
                warn!(entity_id = %entity, error = %e, "Match answer rejected");
                self.events.emit(DocumentEvent::IngestFailed {
                    entity,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn apply_reconcile(
        &mut self,
        entity: EntityId,
        endpoint: Endpoint,
        reply: &Reply<DocumentAnswer>,
    ) -> Option<DocumentId> {
        let failure = match self.registry.reconcile(reply) {
            Ok(Reconciliation::Applied { identity, entities }) => {
                self.events.emit(DocumentEvent::Reconciled {
                    identity: identity.clone(),
                    entities,
                });
                return Some(identity);
            }
            Ok(Reconciliation::Kept { failure }) => reason(&failure),
            Err(e) => e.to_string(),
        };

        warn!(entity_id = %entity, op = endpoint.operation(), error = %failure, "Server did not confirm change");
        self.events.emit(DocumentEvent::SyncFailed {
            entity: Some(entity),
            operation: endpoint.operation().to_string(),
            reason: failure,
        });
        None
    }

    fn apply_photo(&mut self, entity: EntityId, reply: &Reply<DocumentAnswer>) {
        let Some(identity) = self.apply_reconcile(entity, Endpoint::UpdatePhoto, reply) else {
            return;
        };

        match reply.answer.as_ref().and_then(|a| a.photo()) {
            Some(Ok(frame)) => {
                let entities: Vec<EntityId> = self
                    .registry
                    .find(&identity)
                    .iter()
                    .map(|r| r.entity())
                    .collect();
                for shown in entities {
                    if let Err(e) = self.registry.attach_photo(shown, frame.clone()) {
                        warn!(entity_id = %shown, document_id = %identity, error = %e, "Could not refresh photo");
                    }
                }
            }
            Some(Err(e)) => warn!(
                entity_id = %entity,
                document_id = %identity,
                error = %e,
                "Returned document image could not be decoded, keeping local photo"
            ),
            None => {}
        }
        self.events
            .emit(DocumentEvent::PhotoUpdated { entity, identity });
    }

    fn apply_link_reply(&mut self, entity: EntityId, endpoint: Endpoint, reply: &Reply<SimpleAnswer>) {
        if reply.success {
            debug!(entity_id = %entity, op = endpoint.operation(), "Link change mirrored");
            return;
        }
        let reason = reason(&reply.failure);
        warn!(entity_id = %entity, op = endpoint.operation(), error = %reason, "Link change not mirrored, local grouping kept");
        self.events.emit(DocumentEvent::LinkSyncFailed {
            entity,
            operation: endpoint.operation().to_string(),
            reason,
        });
    }
}
