use camoscene_common::EntityId;
use std::collections::{BTreeMap, BTreeSet};

/// A reachability change produced by a structural edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// The entity became reachable from the root.
    Attached(EntityId),
    /// The entity stopped being reachable from the root.
    Detached(EntityId),
}

impl Reachability {
    pub fn entity(&self) -> EntityId {
        match self {
            Self::Attached(id) | Self::Detached(id) => *id,
        }
    }
}

/// Structural record of every scene graph edit.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    Created { id: EntityId, name: String },
    Parented { id: EntityId, parent: EntityId },
    Unparented { id: EntityId, parent: EntityId },
    Destroyed { id: EntityId },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SceneGraphError {
    #[error("entity {0:?} not found in scene graph")]
    NotFound(EntityId),
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { child: EntityId, parent: EntityId },
    #[error("the scene root cannot be reparented or destroyed")]
    Root,
}

/// Per-node data.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    parent: Option<EntityId>,
    children: BTreeSet<EntityId>,
}

impl SceneNode {
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.children.iter().copied()
    }
}

/// Entity hierarchy with a single live root.
///
/// Nodes can exist without being reachable from the root (created but not
/// yet added, or detached). Structural edits return the entities whose
/// reachability flipped so owners can add or remove their physics bodies
/// exactly once per transition.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    root: EntityId,
    nodes: BTreeMap<EntityId, SceneNode>,
    event_log: Vec<SceneEvent>,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = EntityId::new();
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            SceneNode {
                name: "root".into(),
                parent: None,
                children: BTreeSet::new(),
            },
        );
        Self {
            root,
            nodes,
            event_log: Vec::new(),
        }
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Number of nodes, including the root and detached nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, id: EntityId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn events(&self) -> &[SceneEvent] {
        &self.event_log
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Create a detached node.
    pub fn create(&mut self, name: impl Into<String>) -> EntityId {
        let id = EntityId::new();
        let name = name.into();
        self.nodes.insert(
            id,
            SceneNode {
                name: name.clone(),
                parent: None,
                children: BTreeSet::new(),
            },
        );
        self.event_log.push(SceneEvent::Created { id, name });
        id
    }

    /// Whether `id` can be reached by walking parents up to the root.
    pub fn is_reachable(&self, id: EntityId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    /// `id` and all of its descendants, parents before children.
    pub fn subtree(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Parent `child` under `parent`, detaching it from any previous parent.
    pub fn attach(
        &mut self,
        child: EntityId,
        parent: EntityId,
    ) -> Result<Vec<Reachability>, SceneGraphError> {
        if child == self.root {
            return Err(SceneGraphError::Root);
        }
        if !self.nodes.contains_key(&child) {
            return Err(SceneGraphError::NotFound(child));
        }
        if !self.nodes.contains_key(&parent) {
            return Err(SceneGraphError::NotFound(parent));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneGraphError::Cycle { child, parent });
        }
        if self.nodes[&child].parent == Some(parent) {
            return Ok(Vec::new());
        }

        let was_reachable = self.is_reachable(child);
        self.unlink(child);
        self.link(child, parent);
        Ok(self.reachability_delta(child, was_reachable))
    }

    /// Attach directly under the root.
    pub fn add_to_root(&mut self, child: EntityId) -> Result<Vec<Reachability>, SceneGraphError> {
        self.attach(child, self.root)
    }

    /// Unparent `child`. The node and its subtree survive, detached.
    pub fn detach(&mut self, child: EntityId) -> Result<Vec<Reachability>, SceneGraphError> {
        if child == self.root {
            return Err(SceneGraphError::Root);
        }
        if !self.nodes.contains_key(&child) {
            return Err(SceneGraphError::NotFound(child));
        }
        let was_reachable = self.is_reachable(child);
        self.unlink(child);
        Ok(self.reachability_delta(child, was_reachable))
    }

    /// Detach and delete `id` with its whole subtree.
    pub fn destroy(&mut self, id: EntityId) -> Result<Vec<Reachability>, SceneGraphError> {
        let delta = self.detach(id)?;
        for node in self.subtree(id) {
            self.nodes.remove(&node);
            self.event_log.push(SceneEvent::Destroyed { id: node });
        }
        Ok(delta)
    }

    fn is_ancestor_or_self(&self, ancestor: EntityId, of: EntityId) -> bool {
        let mut cursor = Some(of);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    fn link(&mut self, child: EntityId, parent: EntityId) {
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.insert(child);
        }
        self.event_log.push(SceneEvent::Parented { id: child, parent });
    }

    fn unlink(&mut self, child: EntityId) {
        let Some(parent) = self.nodes.get_mut(&child).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.remove(&child);
        }
        self.event_log.push(SceneEvent::Unparented { id: child, parent });
    }

    fn reachability_delta(&self, child: EntityId, was_reachable: bool) -> Vec<Reachability> {
        let now_reachable = self.is_reachable(child);
        if was_reachable == now_reachable {
            return Vec::new();
        }
        let subtree = self.subtree(child);
        tracing::debug!(
            entity = %child.short(),
            count = subtree.len(),
            reachable = now_reachable,
            "scene reachability changed"
        );
        subtree
            .into_iter()
            .map(|id| {
                if now_reachable {
                    Reachability::Attached(id)
                } else {
                    Reachability::Detached(id)
                }
            })
            .collect()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_starts_with_root_only() {
        let g = SceneGraph::new();
        assert_eq!(g.node_count(), 1);
        assert!(g.is_reachable(g.root()));
    }

    #[test]
    fn created_node_is_detached() {
        let mut g = SceneGraph::new();
        let id = g.create("box");
        assert!(g.contains(id));
        assert!(!g.is_reachable(id));
    }

    #[test]
    fn add_to_root_reports_attach() {
        let mut g = SceneGraph::new();
        let id = g.create("box");
        let delta = g.add_to_root(id).unwrap();
        assert_eq!(delta, vec![Reachability::Attached(id)]);
        assert!(g.is_reachable(id));
    }

    #[test]
    fn reattaching_same_parent_reports_nothing() {
        let mut g = SceneGraph::new();
        let id = g.create("box");
        g.add_to_root(id).unwrap();
        assert!(g.add_to_root(id).unwrap().is_empty());
    }

    #[test]
    fn subtree_follows_parent() {
        let mut g = SceneGraph::new();
        let group = g.create("group");
        let child = g.create("child");
        assert!(g.attach(child, group).unwrap().is_empty());

        let delta = g.add_to_root(group).unwrap();
        assert_eq!(
            delta,
            vec![Reachability::Attached(group), Reachability::Attached(child)]
        );

        let delta = g.detach(group).unwrap();
        assert_eq!(
            delta,
            vec![Reachability::Detached(group), Reachability::Detached(child)]
        );
        assert!(!g.is_reachable(child));
    }

    #[test]
    fn reparent_between_live_parents_reports_nothing() {
        let mut g = SceneGraph::new();
        let a = g.create("a");
        let b = g.create("b");
        let c = g.create("c");
        g.add_to_root(a).unwrap();
        g.add_to_root(b).unwrap();
        g.attach(c, a).unwrap();
        assert!(g.attach(c, b).unwrap().is_empty());
        assert_eq!(g.get(c).unwrap().parent(), Some(b));
        assert_eq!(g.get(a).unwrap().children().count(), 0);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut g = SceneGraph::new();
        let a = g.create("a");
        let b = g.create("b");
        g.attach(b, a).unwrap();
        assert_eq!(
            g.attach(a, b),
            Err(SceneGraphError::Cycle {
                child: a,
                parent: b
            })
        );
        assert_eq!(g.attach(a, a), Err(SceneGraphError::Cycle { child: a, parent: a }));
    }

    #[test]
    fn root_cannot_move() {
        let mut g = SceneGraph::new();
        let a = g.create("a");
        let root = g.root();
        assert_eq!(g.attach(root, a), Err(SceneGraphError::Root));
        assert_eq!(g.detach(root), Err(SceneGraphError::Root));
    }

    #[test]
    fn destroy_removes_subtree() {
        let mut g = SceneGraph::new();
        let a = g.create("a");
        let b = g.create("b");
        g.attach(b, a).unwrap();
        g.add_to_root(a).unwrap();

        let delta = g.destroy(a).unwrap();
        assert_eq!(delta.len(), 2);
        assert!(!g.contains(a));
        assert!(!g.contains(b));
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn events_are_recorded() {
        let mut g = SceneGraph::new();
        let a = g.create("a");
        g.add_to_root(a).unwrap();
        g.detach(a).unwrap();
        // create + parented + unparented
        assert_eq!(g.events().len(), 3);
        assert_eq!(g.drain_events().len(), 3);
        assert!(g.events().is_empty());
    }

    #[test]
    fn missing_entity_is_an_error() {
        let mut g = SceneGraph::new();
        let ghost = EntityId::new();
        assert_eq!(g.add_to_root(ghost), Err(SceneGraphError::NotFound(ghost)));
    }
}
