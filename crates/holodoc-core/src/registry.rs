//! Document registry: the canonical set of local document records.
//!
//! Records are keyed by [`EntityId`]. Several entities may show the same
//! server document (a page scanned twice matches the same identity); edits and
//! confirmations addressed by [`DocumentId`] apply to all of them.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::CameraFrame;
use crate::models::{DocumentFields, DocumentId, DocumentRecord, EntityId, LinkId};
use crate::wire::{DocumentAnswer, Reply, SyncFailure};

/// Outcome of [`DocumentRegistry::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Server values overwrote these records.
    Applied {
        identity: DocumentId,
        entities: Vec<EntityId>,
    },
    /// Reply was not successful; local (optimistic) state kept as-is.
    Kept { failure: Option<SyncFailure> },
}

/// Owner of every [`DocumentRecord`] in a session.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    records: BTreeMap<EntityId, DocumentRecord>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a speculative record with placeholder metadata.
    pub fn create_local(&mut self) -> &DocumentRecord {
        let entity = EntityId::new();
        debug!(entity_id = %entity, "Created speculative document record");
        self.records
            .entry(entity)
            .or_insert_with(|| DocumentRecord::speculative(entity))
    }

    /// Bind a record to the identity returned by match-or-create and
    /// overwrite every field with the server's values.
    pub fn apply_match(&mut self, entity: EntityId, answer: &DocumentAnswer) -> Result<&DocumentRecord> {
        let identity = answer.identity()?;
        let record = self
            .records
            .get_mut(&entity)
            .ok_or(Error::EntityNotFound(entity))?;

        if let Some(existing) = record.identity() {
            if existing != &identity {
                return Err(Error::IdentityConflict {
                    entity,
                    existing: existing.clone(),
                    incoming: identity,
                });
            }
        }

        record.assign_identity(identity.clone());
        overwrite_from_answer(record, answer);

        match answer.photo() {
            Some(Ok(frame)) => record.set_photo(frame),
            Some(Err(e)) => warn!(
                entity_id = %entity,
                document_id = %identity,
                error = %e,
                "Matched document image could not be decoded, keeping local photo"
            ),
            None => {}
        }

        info!(entity_id = %entity, document_id = %identity, "Document matched");
        Ok(&*record)
    }

    /// Optimistic edit of every record showing `identity`.
    pub fn update(&mut self, identity: &DocumentId, fields: DocumentFields) -> Result<()> {
        let mut touched = 0usize;
        for record in self.records.values_mut() {
            if record.identity() == Some(identity) {
                record.set_fields(fields.clone());
                touched += 1;
            }
        }
        if touched == 0 {
            return Err(Error::DocumentNotFound(identity.clone()));
        }
        debug!(document_id = %identity, records = touched, "Applied local edit");
        Ok(())
    }

    /// Optimistic edit of one record, durable or not.
    pub fn update_entity(&mut self, entity: EntityId, fields: DocumentFields) -> Result<&DocumentRecord> {
        let record = self
            .records
            .get_mut(&entity)
            .ok_or(Error::EntityNotFound(entity))?;
        record.set_fields(fields);
        debug!(entity_id = %entity, "Applied local edit");
        Ok(&*record)
    }

    /// Apply a confirmation (or rejection) of an earlier edit.
    ///
    /// A successful reply overwrites local fields even if newer local edits
    /// exist: the last confirmation to arrive wins. A failed reply changes
    /// nothing and nothing is rolled back.
    pub fn reconcile(&mut self, reply: &Reply<DocumentAnswer>) -> Result<Reconciliation> {
        let answer = match (&reply.answer, reply.success) {
            (Some(answer), true) => answer,
            _ => {
                debug!(failure = ?reply.failure, "Edit not confirmed, keeping local state");
                return Ok(Reconciliation::Kept {
                    failure: reply.failure.clone(),
                });
            }
        };

        let identity = answer.identity()?;
        let mut entities = Vec::new();
        for record in self.records.values_mut() {
            if record.identity() == Some(&identity) {
                overwrite_from_answer(record, answer);
                entities.push(record.entity());
            }
        }
        if entities.is_empty() {
            return Err(Error::DocumentNotFound(identity));
        }

        debug!(document_id = %identity, records = entities.len(), "Server values applied");
        Ok(Reconciliation::Applied { identity, entities })
    }

    /// Attach a photo locally.
    pub fn attach_photo(&mut self, entity: EntityId, frame: CameraFrame) -> Result<()> {
        let record = self
            .records
            .get_mut(&entity)
            .ok_or(Error::EntityNotFound(entity))?;
        record.set_photo(frame);
        Ok(())
    }

    pub(crate) fn set_link(&mut self, entity: EntityId, link: Option<LinkId>) -> Result<()> {
        let record = self
            .records
            .get_mut(&entity)
            .ok_or(Error::EntityNotFound(entity))?;
        record.set_link(link);
        Ok(())
    }

    pub fn get(&self, entity: EntityId) -> Option<&DocumentRecord> {
        self.records.get(&entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.records.contains_key(&entity)
    }

    /// Every record showing `identity`.
    pub fn find(&self, identity: &DocumentId) -> Vec<&DocumentRecord> {
        self.records
            .values()
            .filter(|r| r.identity() == Some(identity))
            .collect()
    }

    /// Oldest entity showing `identity`.
    pub fn entity_for(&self, identity: &DocumentId) -> Option<EntityId> {
        self.records
            .values()
            .find(|r| r.identity() == Some(identity))
            .map(DocumentRecord::entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop a record when its presentation entity is destroyed.
    pub fn remove(&mut self, entity: EntityId) -> Option<DocumentRecord> {
        self.records.remove(&entity)
    }
}

fn overwrite_from_answer(record: &mut DocumentRecord, answer: &DocumentAnswer) {
    record.set_name(answer.name.clone());
    record.set_path(answer.path.clone());
    record.set_fields(answer.fields());
    record.set_linked_documents(answer.linked_documents());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::SuccessPolicy;

    fn answer(id: &str, label: &str) -> DocumentAnswer {
        DocumentAnswer {
            id: id.to_string(),
            name: "scan.jpg".to_string(),
            label: label.to_string(),
            desc: "desc".to_string(),
            author: "Ada".to_string(),
            date: "2018-03-01".to_string(),
            path: "/docs/scan.jpg".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_local_is_speculative() {
        let mut registry = DocumentRegistry::new();
        let record = registry.create_local();
        assert!(!record.is_durable());
        assert_eq!(record.label(), "label");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_apply_match_assigns_identity_and_mirrors_fields() {
        let mut registry = DocumentRegistry::new();
        let entity = registry.create_local().entity();

        let record = registry.apply_match(entity, &answer("doc-42", "label")).unwrap();
        assert_eq!(record.identity().unwrap().as_str(), "doc-42");
        assert_eq!(record.label(), "label");
        assert_eq!(record.author(), "Ada");
        assert_eq!(record.description(), "desc");
        assert_eq!(record.date(), "2018-03-01");
        assert_eq!(record.name(), "scan.jpg");
        assert_eq!(record.path(), "/docs/scan.jpg");
    }

    #[test]
    fn test_apply_match_rejects_empty_identity() {
        let mut registry = DocumentRegistry::new();
        let entity = registry.create_local().entity();

        let err = registry.apply_match(entity, &answer("", "x")).unwrap_err();
        assert!(matches!(err, Error::Sync(_)));
        assert!(!registry.get(entity).unwrap().is_durable());
    }

    #[test]
    fn test_identity_is_immutable_once_assigned() {
        let mut registry = DocumentRegistry::new();
        let entity = registry.create_local().entity();
        registry.apply_match(entity, &answer("doc-1", "a")).unwrap();

        let err = registry.apply_match(entity, &answer("doc-2", "b")).unwrap_err();
        assert!(matches!(err, Error::IdentityConflict { .. }));
        assert_eq!(registry.get(entity).unwrap().identity().unwrap().as_str(), "doc-1");
        assert_eq!(registry.get(entity).unwrap().label(), "a");

        // same identity refreshes
        registry.apply_match(entity, &answer("doc-1", "c")).unwrap();
        assert_eq!(registry.get(entity).unwrap().label(), "c");
    }

    #[test]
    fn test_apply_match_unknown_entity() {
        let mut registry = DocumentRegistry::new();
        let err = registry.apply_match(EntityId::new(), &answer("doc-1", "a")).unwrap_err();
        assert!(matches!(err, Error::EntityNotFound(_)));
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut registry = DocumentRegistry::new();
        let entity = registry.create_local().entity();
        registry.apply_match(entity, &answer("doc-42", "label")).unwrap();
        let id = DocumentId::new("doc-42").unwrap();
        let fields = DocumentFields::new("Invoice", "Ada", "desc", "2018");

        registry.update(&id, fields.clone()).unwrap();
        let once = registry.get(entity).unwrap().fields().clone();
        registry.update(&id, fields).unwrap();
        let twice = registry.get(entity).unwrap().fields().clone();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_update_unknown_identity() {
        let mut registry = DocumentRegistry::new();
        let id = DocumentId::new("missing").unwrap();
        let err = registry.update(&id, DocumentFields::default()).unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }

    #[test]
    fn test_update_applies_to_every_view_of_a_document() {
        let mut registry = DocumentRegistry::new();
        let a = registry.create_local().entity();
        let b = registry.create_local().entity();
        registry.apply_match(a, &answer("doc-42", "label")).unwrap();
        registry.apply_match(b, &answer("doc-42", "label")).unwrap();

        let id = DocumentId::new("doc-42").unwrap();
        registry
            .update(&id, DocumentFields::default().with_label("Invoice"))
            .unwrap();
        assert_eq!(registry.get(a).unwrap().label(), "Invoice");
        assert_eq!(registry.get(b).unwrap().label(), "Invoice");
        assert_eq!(registry.find(&id).len(), 2);
        assert_eq!(registry.entity_for(&id), Some(a));
    }

    #[test]
    fn test_reconcile_success_overwrites_newer_local_edit() {
        let mut registry = DocumentRegistry::new();
        let entity = registry.create_local().entity();
        registry.apply_match(entity, &answer("doc-42", "label")).unwrap();
        let id = DocumentId::new("doc-42").unwrap();

        registry
            .update(&id, DocumentFields::default().with_label("Invoice"))
            .unwrap();
        let stale = Reply::ok(answer("doc-42", "label"));
        let outcome = registry.reconcile(&stale).unwrap();

        assert!(matches!(outcome, Reconciliation::Applied { .. }));
        assert_eq!(registry.get(entity).unwrap().label(), "label");
    }

    #[test]
    fn test_reconcile_failure_keeps_optimistic_state() {
        let mut registry = DocumentRegistry::new();
        let entity = registry.create_local().entity();
        registry.apply_match(entity, &answer("doc-42", "label")).unwrap();
        let id = DocumentId::new("doc-42").unwrap();
        registry
            .update(&id, DocumentFields::default().with_label("Invoice"))
            .unwrap();

        let failed: Reply<DocumentAnswer> = Reply::from_body("", SuccessPolicy::Strict);
        let outcome = registry.reconcile(&failed).unwrap();
        assert_eq!(
            outcome,
            Reconciliation::Kept {
                failure: Some(SyncFailure::EmptyResponse)
            }
        );
        assert_eq!(registry.get(entity).unwrap().label(), "Invoice");
    }

    #[test]
    fn test_reconcile_success_without_id_is_sync_error() {
        let mut registry = DocumentRegistry::new();
        let reply = Reply::ok(answer("", "x"));
        assert!(matches!(registry.reconcile(&reply), Err(Error::Sync(_))));
    }

    #[test]
    fn test_remove_record() {
        let mut registry = DocumentRegistry::new();
        let entity = registry.create_local().entity();
        assert!(registry.remove(entity).is_some());
        assert!(registry.is_empty());
    }
}
