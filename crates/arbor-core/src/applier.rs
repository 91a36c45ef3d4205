//! Host-tree adapter contract and an in-memory implementation.

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::element::{Event, Listener, PropValue};

pub type HostId = usize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("host node {id} not found")]
    Missing { id: HostId },
    #[error("host node {child} is not a child of {parent}")]
    NotAChild { parent: HostId, child: HostId },
    #[error("host node {id} cannot hold children")]
    NotAContainer { id: HostId },
}

/// What a host node is, as reported back to the reconciler during hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    Container,
    Element(String),
    Text(String),
}

/// Mutable host tree the reconciler writes into.
///
/// Identity is all the core relies on: an id handed out by `create_*` keeps
/// naming the same node until it is disposed.
pub trait Applier {
    fn create_element(&mut self, tag: &str) -> Result<HostId, HostError>;
    fn create_text(&mut self, text: &str) -> Result<HostId, HostError>;
    fn set_text(&mut self, id: HostId, text: &str) -> Result<(), HostError>;
    fn set_property(&mut self, id: HostId, name: &str, value: &PropValue) -> Result<(), HostError>;
    fn remove_property(&mut self, id: HostId, name: &str) -> Result<(), HostError>;
    fn set_listener(&mut self, id: HostId, event: &str, listener: Listener) -> Result<(), HostError>;
    fn remove_listener(&mut self, id: HostId, event: &str) -> Result<(), HostError>;
    /// Inserts `child` before `anchor`, or appends it when `anchor` is `None`.
    /// A child that is already attached somewhere is moved.
    fn insert_before(
        &mut self,
        parent: HostId,
        child: HostId,
        anchor: Option<HostId>,
    ) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError>;
    /// Releases a detached node together with its descendants.
    fn dispose(&mut self, id: HostId) -> Result<(), HostError>;
    fn children(&self, parent: HostId) -> Vec<HostId>;
    fn kind(&self, id: HostId) -> Option<HostKind>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    Create(HostId),
    SetText(HostId),
    SetProperty { id: HostId, name: String },
    RemoveProperty { id: HostId, name: String },
    SetListener { id: HostId, event: String },
    RemoveListener { id: HostId, event: String },
    Insert { parent: HostId, child: HostId, anchor: Option<HostId> },
    Move { parent: HostId, child: HostId, anchor: Option<HostId> },
    Remove { parent: HostId, child: HostId },
    Dispose(HostId),
}

pub struct MemoryNode {
    pub kind: HostKind,
    pub properties: IndexMap<String, PropValue>,
    pub listeners: IndexMap<String, Listener>,
    pub children: Vec<HostId>,
    pub parent: Option<HostId>,
}

impl MemoryNode {
    fn new(kind: HostKind) -> Self {
        Self {
            kind,
            properties: IndexMap::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

/// Host tree kept in a slot vector, with a log of every mutation.
#[derive(Default)]
pub struct MemoryApplier {
    nodes: Vec<Option<MemoryNode>>,
    ops: Vec<HostOp>,
}

impl MemoryApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a container node that roots can render into.
    pub fn create_container(&mut self) -> HostId {
        self.alloc(HostKind::Container)
    }

    fn alloc(&mut self, kind: HostKind) -> HostId {
        let id = self.nodes.len();
        self.nodes.push(Some(MemoryNode::new(kind)));
        id
    }

    pub fn node(&self, id: HostId) -> Option<&MemoryNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: HostId) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(HostError::Missing { id })
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// First node under `root` (depth-first, `root` included) whose `id`
    /// property equals `id`.
    pub fn find_by_id(&self, root: HostId, id: &str) -> Option<HostId> {
        self.find(root, &|node: &MemoryNode| node.properties.get("id").and_then(PropValue::as_str) == Some(id))
    }

    pub fn find_by_tag(&self, root: HostId, tag: &str) -> Option<HostId> {
        self.find(root, &|node: &MemoryNode| matches!(&node.kind, HostKind::Element(t) if t == tag))
    }

    fn find(&self, root: HostId, predicate: &dyn Fn(&MemoryNode) -> bool) -> Option<HostId> {
        let node = self.node(root)?;
        if predicate(node) {
            return Some(root);
        }
        node.children
            .iter()
            .find_map(|child| self.find(*child, predicate))
    }

    /// Delivers `event` to the listener bound on its target, if any.
    pub fn dispatch(&self, event: &Event) -> Result<bool, HostError> {
        let node = self
            .node(event.target)
            .ok_or(HostError::Missing { id: event.target })?;
        match node.listeners.get(&event.name) {
            Some(listener) => {
                let listener = listener.clone();
                listener.call(event);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Renders the subtree as markup. A container contributes only its
    /// children.
    pub fn serialize(&self, id: HostId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: HostId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            HostKind::Container => {
                for child in &node.children {
                    self.write_node(*child, out);
                }
            }
            HostKind::Text(text) => out.push_str(text),
            HostKind::Element(tag) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in &node.properties {
                    if let Some(text) = value.to_attribute() {
                        let _ = write!(out, " {name}=\"{text}\"");
                    }
                }
                out.push('>');
                for child in &node.children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn detach(&mut self, child: HostId) -> Result<Option<HostId>, HostError> {
        let parent = self.node_mut(child)?.parent.take();
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|id| *id != child);
        }
        Ok(parent)
    }
}

impl Applier for MemoryApplier {
    fn create_element(&mut self, tag: &str) -> Result<HostId, HostError> {
        let id = self.alloc(HostKind::Element(tag.to_owned()));
        self.ops.push(HostOp::Create(id));
        Ok(id)
    }

    fn create_text(&mut self, text: &str) -> Result<HostId, HostError> {
        let id = self.alloc(HostKind::Text(text.to_owned()));
        self.ops.push(HostOp::Create(id));
        Ok(id)
    }

    fn set_text(&mut self, id: HostId, text: &str) -> Result<(), HostError> {
        self.node_mut(id)?.kind = HostKind::Text(text.to_owned());
        self.ops.push(HostOp::SetText(id));
        Ok(())
    }

    fn set_property(&mut self, id: HostId, name: &str, value: &PropValue) -> Result<(), HostError> {
        self.node_mut(id)?
            .properties
            .insert(name.to_owned(), value.clone());
        self.ops.push(HostOp::SetProperty {
            id,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn remove_property(&mut self, id: HostId, name: &str) -> Result<(), HostError> {
        self.node_mut(id)?.properties.shift_remove(name);
        self.ops.push(HostOp::RemoveProperty {
            id,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn set_listener(&mut self, id: HostId, event: &str, listener: Listener) -> Result<(), HostError> {
        self.node_mut(id)?
            .listeners
            .insert(event.to_owned(), listener);
        self.ops.push(HostOp::SetListener {
            id,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn remove_listener(&mut self, id: HostId, event: &str) -> Result<(), HostError> {
        self.node_mut(id)?.listeners.shift_remove(event);
        self.ops.push(HostOp::RemoveListener {
            id,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostId,
        child: HostId,
        anchor: Option<HostId>,
    ) -> Result<(), HostError> {
        if matches!(self.node_mut(parent)?.kind, HostKind::Text(_)) {
            return Err(HostError::NotAContainer { id: parent });
        }
        let previous = self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let index = match anchor {
            Some(anchor) => siblings
                .iter()
                .position(|id| *id == anchor)
                .ok_or(HostError::NotAChild {
                    parent,
                    child: anchor,
                })?,
            None => siblings.len(),
        };
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.ops.push(if previous == Some(parent) {
            HostOp::Move {
                parent,
                child,
                anchor,
            }
        } else {
            HostOp::Insert {
                parent,
                child,
                anchor,
            }
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError> {
        if self.node_mut(child)?.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        self.detach(child)?;
        self.ops.push(HostOp::Remove { parent, child });
        Ok(())
    }

    fn dispose(&mut self, id: HostId) -> Result<(), HostError> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
        self.ops.push(HostOp::Dispose(id));
        Ok(())
    }

    fn children(&self, parent: HostId) -> Vec<HostId> {
        self.node(parent)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn kind(&self, id: HostId) -> Option<HostKind> {
        self.node(id).map(|node| node.kind.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_moves_attached_children() {
        let mut applier = MemoryApplier::new();
        let root = applier.create_container();
        let a = applier.create_text("a").unwrap();
        let b = applier.create_text("b").unwrap();
        applier.insert_before(root, a, None).unwrap();
        applier.insert_before(root, b, None).unwrap();
        assert_eq!(applier.serialize(root), "ab");

        applier.insert_before(root, b, Some(a)).unwrap();
        assert_eq!(applier.serialize(root), "ba");
        assert_eq!(
            applier.ops().last(),
            Some(&HostOp::Move {
                parent: root,
                child: b,
                anchor: Some(a)
            })
        );
    }

    #[test]
    fn dispose_releases_descendants() {
        let mut applier = MemoryApplier::new();
        let root = applier.create_container();
        let div = applier.create_element("div").unwrap();
        let text = applier.create_text("x").unwrap();
        applier.insert_before(div, text, None).unwrap();
        applier.insert_before(root, div, None).unwrap();
        applier
            .set_property(div, "id", &PropValue::from("main"))
            .unwrap();
        assert_eq!(applier.serialize(root), "<div id=\"main\">x</div>");
        assert_eq!(applier.find_by_id(root, "main"), Some(div));

        applier.dispose(div).unwrap();
        assert!(applier.node(text).is_none());
        assert_eq!(applier.serialize(root), "");
        assert_eq!(applier.len(), 1);
    }

    #[test]
    fn removing_a_foreign_child_fails() {
        let mut applier = MemoryApplier::new();
        let root = applier.create_container();
        let orphan = applier.create_text("x").unwrap();
        assert_eq!(
            applier.remove_child(root, orphan),
            Err(HostError::NotAChild {
                parent: root,
                child: orphan
            })
        );
    }
}
