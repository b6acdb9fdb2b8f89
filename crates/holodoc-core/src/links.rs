//! Link graph: grouping documents into link groups.
//!
//! Membership is stored on the records themselves (one optional [`LinkId`]
//! per record), so a document is in at most one group. The graph owns the
//! pending link gesture and the allocation of new group ids.

use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{EntityId, LinkId};
use crate::registry::DocumentRegistry;

/// What [`LinkGraph::end_link`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Same entity, or both already in the same group.
    Unchanged,
    /// Neither was linked; both now share a fresh group.
    Created {
        link: LinkId,
        source: EntityId,
        target: EntityId,
    },
    /// One side was linked; the other joined its group.
    Joined {
        link: LinkId,
        adopted: EntityId,
        source: EntityId,
        target: EntityId,
    },
    /// Both were linked to different groups; the target's whole group moved
    /// into the source's group.
    Merged {
        link: LinkId,
        absorbed: LinkId,
        moved: Vec<EntityId>,
        source: EntityId,
        target: EntityId,
    },
}

impl LinkOutcome {
    /// Group both ends belong to after the gesture, if anything changed.
    pub fn link(&self) -> Option<LinkId> {
        match self {
            LinkOutcome::Unchanged => None,
            LinkOutcome::Created { link, .. }
            | LinkOutcome::Joined { link, .. }
            | LinkOutcome::Merged { link, .. } => Some(*link),
        }
    }

    /// The two ends of the gesture, if anything changed.
    pub fn endpoints(&self) -> Option<(EntityId, EntityId)> {
        match self {
            LinkOutcome::Unchanged => None,
            LinkOutcome::Created { source, target, .. }
            | LinkOutcome::Joined { source, target, .. }
            | LinkOutcome::Merged { source, target, .. } => Some((*source, *target)),
        }
    }
}

/// Link gesture state and group id allocator.
#[derive(Debug, Default)]
pub struct LinkGraph {
    pending: Option<EntityId>,
    next_link: u32,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a link gesture anchored at `source`. Replaces any pending anchor.
    pub fn start_link(&mut self, source: EntityId) {
        if let Some(previous) = self.pending.replace(source) {
            debug!(previous = %previous, entity_id = %source, "Replaced pending link anchor");
        } else {
            debug!(entity_id = %source, "Link gesture started");
        }
    }

    pub fn pending(&self) -> Option<EntityId> {
        self.pending
    }

    /// Abandon the pending gesture.
    pub fn cancel_link(&mut self) -> Option<EntityId> {
        self.pending.take()
    }

    /// Complete the pending gesture against `target`.
    pub fn end_link(&mut self, registry: &mut DocumentRegistry, target: EntityId) -> Result<LinkOutcome> {
        let source = self.pending.ok_or(Error::NoPendingLink)?;
        // A vanished anchor cannot complete any gesture
        let Some(source_record) = registry.get(source) else {
            self.pending = None;
            return Err(Error::EntityNotFound(source));
        };
        let source_link = source_record.link_id();
        let target_link = registry
            .get(target)
            .ok_or(Error::EntityNotFound(target))?
            .link_id();
        self.pending = None;

        if source == target {
            return Ok(LinkOutcome::Unchanged);
        }

        let outcome = match (source_link, target_link) {
            (None, None) => {
                let link = self.allocate(registry);
                registry.set_link(source, Some(link))?;
                registry.set_link(target, Some(link))?;
                LinkOutcome::Created {
                    link,
                    source,
                    target,
                }
            }
            (Some(link), None) => {
                registry.set_link(target, Some(link))?;
                LinkOutcome::Joined {
                    link,
                    adopted: target,
                    source,
                    target,
                }
            }
            (None, Some(link)) => {
                registry.set_link(source, Some(link))?;
                LinkOutcome::Joined {
                    link,
                    adopted: source,
                    source,
                    target,
                }
            }
            (Some(a), Some(b)) if a == b => LinkOutcome::Unchanged,
            (Some(link), Some(absorbed)) => {
                let moved: Vec<EntityId> = self.linked_entities(registry, absorbed).into_iter().collect();
                for entity in &moved {
                    registry.set_link(*entity, Some(link))?;
                }
                LinkOutcome::Merged {
                    link,
                    absorbed,
                    moved,
                    source,
                    target,
                }
            }
        };

        if let Some(link) = outcome.link() {
            info!(link_id = %link, source = %source, target = %target, "Documents linked");
        }
        Ok(outcome)
    }

    /// Every entity currently tagged with `link`.
    pub fn linked_entities(&self, registry: &DocumentRegistry, link: LinkId) -> BTreeSet<EntityId> {
        registry
            .iter()
            .filter(|r| r.link_id() == Some(link))
            .map(|r| r.entity())
            .collect()
    }

    /// Other members of `entity`'s group; empty when it is not linked.
    pub fn linked_peers(&self, registry: &DocumentRegistry, entity: EntityId) -> Vec<EntityId> {
        let Some(link) = registry.get(entity).and_then(|r| r.link_id()) else {
            return Vec::new();
        };
        self.linked_entities(registry, link)
            .into_iter()
            .filter(|e| *e != entity)
            .collect()
    }

    /// Remove `entity` from its group. Other members keep their link id.
    ///
    /// Returns the group it left, if any.
    pub fn break_link(&mut self, registry: &mut DocumentRegistry, entity: EntityId) -> Result<Option<LinkId>> {
        let previous = registry
            .get(entity)
            .ok_or(Error::EntityNotFound(entity))?
            .link_id();
        registry.set_link(entity, None)?;
        if let Some(link) = previous {
            info!(entity_id = %entity, link_id = %link, "Link broken");
        }
        Ok(previous)
    }

    fn allocate(&mut self, registry: &DocumentRegistry) -> LinkId {
        let in_use: BTreeSet<LinkId> = registry.iter().filter_map(|r| r.link_id()).collect();
        loop {
            let candidate = LinkId::new(self.next_link);
            self.next_link = self.next_link.wrapping_add(1);
            if !in_use.contains(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(n: usize) -> (DocumentRegistry, LinkGraph, Vec<EntityId>) {
        let mut registry = DocumentRegistry::new();
        let entities = (0..n).map(|_| registry.create_local().entity()).collect();
        (registry, LinkGraph::new(), entities)
    }

    fn link(graph: &mut LinkGraph, registry: &mut DocumentRegistry, a: EntityId, b: EntityId) -> LinkOutcome {
        graph.start_link(a);
        graph.end_link(registry, b).unwrap()
    }

    #[test]
    fn test_self_link_is_noop() {
        let (mut registry, mut graph, e) = setup(1);
        let outcome = link(&mut graph, &mut registry, e[0], e[0]);
        assert_eq!(outcome, LinkOutcome::Unchanged);
        assert_eq!(registry.get(e[0]).unwrap().link_id(), None);
        assert_eq!(graph.pending(), None);
    }

    #[test]
    fn test_link_two_unlinked_creates_group() {
        let (mut registry, mut graph, e) = setup(2);
        let outcome = link(&mut graph, &mut registry, e[0], e[1]);

        let group = outcome.link().unwrap();
        assert_eq!(registry.get(e[0]).unwrap().link_id(), Some(group));
        assert_eq!(registry.get(e[1]).unwrap().link_id(), Some(group));
        assert_ne!(LinkId::to_sentinel(Some(group)), LinkId::NO_LINK_SENTINEL);
        assert!(matches!(outcome, LinkOutcome::Created { .. }));
    }

    #[test]
    fn test_unlinked_target_joins_source_group() {
        let (mut registry, mut graph, e) = setup(3);
        let group = link(&mut graph, &mut registry, e[0], e[1]).link().unwrap();

        let outcome = link(&mut graph, &mut registry, e[1], e[2]);
        assert_eq!(
            outcome,
            LinkOutcome::Joined {
                link: group,
                adopted: e[2],
                source: e[1],
                target: e[2]
            }
        );
        assert_eq!(graph.linked_entities(&registry, group).len(), 3);
    }

    #[test]
    fn test_unlinked_source_joins_target_group() {
        let (mut registry, mut graph, e) = setup(3);
        let group = link(&mut graph, &mut registry, e[0], e[1]).link().unwrap();

        let outcome = link(&mut graph, &mut registry, e[2], e[0]);
        assert!(matches!(outcome, LinkOutcome::Joined { adopted, .. } if adopted == e[2]));
        assert_eq!(registry.get(e[2]).unwrap().link_id(), Some(group));
    }

    #[test]
    fn test_merge_moves_whole_target_group() {
        let (mut registry, mut graph, e) = setup(4);
        let first = link(&mut graph, &mut registry, e[0], e[1]).link().unwrap();
        let second = link(&mut graph, &mut registry, e[2], e[3]).link().unwrap();
        assert_ne!(first, second);

        let outcome = link(&mut graph, &mut registry, e[0], e[2]);
        match outcome {
            LinkOutcome::Merged {
                link,
                absorbed,
                ref moved,
                ..
            } => {
                assert_eq!(link, first);
                assert_eq!(absorbed, second);
                assert_eq!(moved.len(), 2);
            }
            other => panic!("expected merge, got {:?}", other),
        }
        for entity in &e {
            assert_eq!(registry.get(*entity).unwrap().link_id(), Some(first));
        }
        assert!(graph.linked_entities(&registry, second).is_empty());
    }

    #[test]
    fn test_same_group_is_unchanged() {
        let (mut registry, mut graph, e) = setup(2);
        link(&mut graph, &mut registry, e[0], e[1]);
        assert_eq!(link(&mut graph, &mut registry, e[1], e[0]), LinkOutcome::Unchanged);
    }

    #[test]
    fn test_end_without_start_fails() {
        let (mut registry, mut graph, e) = setup(1);
        assert!(matches!(
            graph.end_link(&mut registry, e[0]),
            Err(Error::NoPendingLink)
        ));
    }

    #[test]
    fn test_end_link_unknown_target_keeps_gesture() {
        let (mut registry, mut graph, e) = setup(1);
        graph.start_link(e[0]);
        let err = graph.end_link(&mut registry, EntityId::new()).unwrap_err();
        assert!(matches!(err, Error::EntityNotFound(_)));
        assert_eq!(graph.pending(), Some(e[0]));
    }

    #[test]
    fn test_end_link_removed_source_clears_gesture() {
        let (mut registry, mut graph, e) = setup(2);
        graph.start_link(e[0]);
        registry.remove(e[0]);

        assert!(matches!(
            graph.end_link(&mut registry, e[1]),
            Err(Error::EntityNotFound(gone)) if gone == e[0]
        ));
        assert_eq!(graph.pending(), None);
        assert!(matches!(
            graph.end_link(&mut registry, e[1]),
            Err(Error::NoPendingLink)
        ));
    }

    #[test]
    fn test_start_link_replaces_anchor() {
        let (mut registry, mut graph, e) = setup(3);
        graph.start_link(e[0]);
        graph.start_link(e[1]);
        let outcome = graph.end_link(&mut registry, e[2]).unwrap();
        assert_eq!(outcome.endpoints(), Some((e[1], e[2])));
        assert_eq!(registry.get(e[0]).unwrap().link_id(), None);
    }

    #[test]
    fn test_break_link_removes_only_that_member() {
        let (mut registry, mut graph, e) = setup(3);
        let group = link(&mut graph, &mut registry, e[0], e[1]).link().unwrap();
        link(&mut graph, &mut registry, e[0], e[2]);

        let previous = graph.break_link(&mut registry, e[1]).unwrap();
        assert_eq!(previous, Some(group));
        assert!(!graph.linked_entities(&registry, group).contains(&e[1]));
        assert_eq!(registry.get(e[0]).unwrap().link_id(), Some(group));
        assert_eq!(registry.get(e[2]).unwrap().link_id(), Some(group));

        assert_eq!(graph.break_link(&mut registry, e[1]).unwrap(), None);
    }

    #[test]
    fn test_linked_entities_contains_every_tagged_document() {
        let (mut registry, mut graph, e) = setup(5);
        let group = link(&mut graph, &mut registry, e[0], e[1]).link().unwrap();
        link(&mut graph, &mut registry, e[2], e[1]);

        let members = graph.linked_entities(&registry, group);
        for record in registry.iter() {
            if record.link_id() == Some(group) {
                assert!(members.contains(&record.entity()));
            }
        }
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn test_linked_peers_excludes_self() {
        let (mut registry, mut graph, e) = setup(3);
        link(&mut graph, &mut registry, e[0], e[1]);
        let peers = graph.linked_peers(&registry, e[0]);
        assert_eq!(peers, vec![e[1]]);
        assert!(graph.linked_peers(&registry, e[2]).is_empty());
    }

    #[test]
    fn test_allocation_skips_ids_in_use() {
        let (mut registry, mut graph, e) = setup(4);
        let first = link(&mut graph, &mut registry, e[0], e[1]).link().unwrap();
        let second = link(&mut graph, &mut registry, e[2], e[3]).link().unwrap();
        assert_ne!(first, second);
    }
}
