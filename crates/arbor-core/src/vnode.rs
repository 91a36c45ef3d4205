//! The record of what currently exists at each tree position.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::applier::HostId;
use crate::element::{Element, ElementKind};
use crate::instance::InstanceRef;

pub(crate) type VNodeRef = Rc<VNode>;

/// One rendered position: the element it was built from, the host node it
/// owns (host and text elements) or the instance it owns (components).
pub(crate) struct VNode {
    pub(crate) element: Element,
    pub(crate) host: Option<HostId>,
    pub(crate) instance: Option<InstanceRef>,
    pub(crate) children: RefCell<Vec<VNodeRef>>,
    parent: RefCell<Weak<VNode>>,
    pub(crate) depth: usize,
    container: bool,
}

impl VNode {
    /// Root record bound to the container a tree renders into.
    pub(crate) fn container(host: HostId) -> VNodeRef {
        Rc::new(VNode {
            element: Element::empty(),
            host: Some(host),
            instance: None,
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            depth: 0,
            container: true,
        })
    }

    pub(crate) fn new(
        element: &Element,
        parent: &VNodeRef,
        host: Option<HostId>,
        instance: Option<InstanceRef>,
    ) -> VNodeRef {
        Rc::new(VNode {
            element: element.clone(),
            host,
            instance,
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Rc::downgrade(parent)),
            depth: parent.depth + 1,
            container: false,
        })
    }

    pub(crate) fn parent(&self) -> Option<VNodeRef> {
        self.parent.borrow().upgrade()
    }

    pub(crate) fn set_parent(&self, parent: &VNodeRef) {
        *self.parent.borrow_mut() = Rc::downgrade(parent);
    }

    pub(crate) fn set_children(self: &Rc<Self>, children: Vec<VNodeRef>) {
        for child in &children {
            child.set_parent(self);
        }
        *self.children.borrow_mut() = children;
    }

    /// Re-points every parent link below this node at its actual owner.
    /// Needed after an aborted pass reparented reused nodes.
    pub(crate) fn relink(self: &Rc<Self>) {
        for child in self.children.borrow().iter() {
            child.set_parent(self);
            child.relink();
        }
    }

    pub(crate) fn replace_child(&self, old: &VNodeRef, new: VNodeRef) {
        let mut children = self.children.borrow_mut();
        if let Some(slot) = children.iter_mut().find(|child| Rc::ptr_eq(child, old)) {
            *slot = new;
        }
    }

    /// Whether host children of this node are attached directly to its host.
    pub(crate) fn is_host_parent(&self) -> bool {
        self.container || matches!(self.element.kind(), ElementKind::Host(_))
    }

    /// Top-most host nodes produced by this subtree, in order.
    pub(crate) fn collect_hosts(&self, out: &mut Vec<HostId>) {
        match (self.container, self.host) {
            (false, Some(host)) => out.push(host),
            _ => {
                for child in self.children.borrow().iter() {
                    child.collect_hosts(out);
                }
            }
        }
    }

    pub(crate) fn top_hosts(&self) -> Vec<HostId> {
        let mut out = Vec::new();
        self.collect_hosts(&mut out);
        out
    }

    /// Host nodes that belong directly under this node's host.
    pub(crate) fn host_children(&self) -> Vec<HostId> {
        let mut out = Vec::new();
        for child in self.children.borrow().iter() {
            child.collect_hosts(&mut out);
        }
        out
    }

    pub(crate) fn nearest_host_parent(&self) -> Option<VNodeRef> {
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            if node.is_host_parent() {
                return Some(node);
            }
            cursor = node.parent();
        }
        None
    }

    /// Names of the components enclosing this node, innermost first.
    pub(crate) fn component_stack(&self) -> Vec<&'static str> {
        let mut stack: Vec<&'static str> = self.element.component_name().into_iter().collect();
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            stack.extend(node.element.component_name());
            cursor = node.parent();
        }
        stack
    }
}
