//! Registry and link graph working together, driven by decoded server bodies.

use holodoc_core::{
    DocumentAnswer, DocumentFields, DocumentId, DocumentRegistry, EntityId, Error, LinkGraph,
    LinkId, LinkOutcome, Reconciliation, Reply, SuccessPolicy,
};

fn answer(body: serde_json::Value) -> DocumentAnswer {
    Reply::<DocumentAnswer>::from_body(&body.to_string(), SuccessPolicy::Strict)
        .into_result()
        .unwrap()
}

fn durable(registry: &mut DocumentRegistry, id: &str) -> EntityId {
    let entity = registry.create_local().entity();
    registry
        .apply_match(entity, &answer(serde_json::json!({"id": id, "error": ""})))
        .unwrap();
    entity
}

#[test]
fn test_match_then_competing_confirmations() {
    let mut registry = DocumentRegistry::new();
    let entity = registry.create_local().entity();
    registry
        .apply_match(
            entity,
            &answer(serde_json::json!({
                "Id": "doc-42",
                "Label": "label",
                "Author": null,
                "Link": null
            })),
        )
        .unwrap();
    let identity = DocumentId::new("doc-42").unwrap();
    assert_eq!(registry.get(entity).unwrap().author(), "");

    registry
        .update(&identity, DocumentFields::default().with_label("Invoice"))
        .unwrap();
    registry
        .update(&identity, DocumentFields::default().with_label("Receipt"))
        .unwrap();

    // Confirmations arrive in reverse order of the edits
    let receipt = Reply::from_body(
        r#"{"id":"doc-42","label":"Receipt","error":""}"#,
        SuccessPolicy::Strict,
    );
    let invoice = Reply::from_body(
        r#"{"id":"doc-42","label":"Invoice","error":""}"#,
        SuccessPolicy::Strict,
    );
    registry.reconcile(&receipt).unwrap();
    let outcome = registry.reconcile(&invoice).unwrap();

    assert_eq!(
        outcome,
        Reconciliation::Applied {
            identity,
            entities: vec![entity]
        }
    );
    assert_eq!(registry.get(entity).unwrap().label(), "Invoice");
}

#[test]
fn test_rejected_confirmation_is_kept() {
    let mut registry = DocumentRegistry::new();
    let entity = durable(&mut registry, "doc-1");
    registry
        .update_entity(entity, DocumentFields::default().with_label("Mine"))
        .unwrap();

    for body in ["", "not json", r#"{"id":"doc-1","label":"Theirs","error":"locked"}"#] {
        let reply = Reply::from_body(body, SuccessPolicy::Strict);
        assert!(matches!(
            registry.reconcile(&reply).unwrap(),
            Reconciliation::Kept { .. }
        ));
    }
    assert_eq!(registry.get(entity).unwrap().label(), "Mine");
}

#[test]
fn test_identity_is_write_once() {
    let mut registry = DocumentRegistry::new();
    let entity = durable(&mut registry, "doc-1");

    let err = registry
        .apply_match(entity, &answer(serde_json::json!({"id": "doc-2"})))
        .unwrap_err();
    assert!(matches!(err, Error::IdentityConflict { .. }));
    assert_eq!(
        registry.get(entity).unwrap().identity().unwrap().as_str(),
        "doc-1"
    );
}

#[test]
fn test_linking_lifecycle() {
    let mut registry = DocumentRegistry::new();
    let mut links = LinkGraph::new();
    let a = durable(&mut registry, "a");
    let b = durable(&mut registry, "b");
    let c = durable(&mut registry, "c");

    links.start_link(a);
    let link = match links.end_link(&mut registry, b).unwrap() {
        LinkOutcome::Created { link, .. } => link,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(links.pending(), None);

    links.start_link(c);
    assert!(matches!(
        links.end_link(&mut registry, a).unwrap(),
        LinkOutcome::Joined { adopted, .. } if adopted == c
    ));
    assert_eq!(links.linked_entities(&registry, link).len(), 3);

    assert_eq!(links.break_link(&mut registry, b).unwrap(), Some(link));
    assert_eq!(links.linked_peers(&registry, a), vec![c]);
    assert_eq!(
        LinkId::to_sentinel(registry.get(b).unwrap().link_id()),
        LinkId::NO_LINK_SENTINEL
    );
    assert_eq!(links.break_link(&mut registry, b).unwrap(), None);
}

#[test]
fn test_unknown_entities_are_rejected() {
    let mut registry = DocumentRegistry::new();
    let mut links = LinkGraph::new();
    let a = durable(&mut registry, "a");
    let ghost = EntityId::new();

    // A failed gesture leaves the anchor in place
    links.start_link(a);
    assert!(matches!(
        links.end_link(&mut registry, ghost),
        Err(Error::EntityNotFound(_))
    ));
    assert!(matches!(
        links.break_link(&mut registry, ghost),
        Err(Error::EntityNotFound(_))
    ));
    assert!(matches!(
        links.end_link(&mut registry, a),
        Ok(LinkOutcome::Unchanged)
    ));
}
