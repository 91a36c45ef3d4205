//! One reconciliation pass.
//!
//! A [`Pass`] walks the previous records and the new element tree pairwise.
//! Host mutations are recorded as commands and only applied by
//! [`Pass::commit`], so a pass that ends with an uncaught error leaves the
//! host tree exactly as the last commit left it.

use crate::applier::{Applier, HostError, HostId, HostKind};
use crate::collections::map::{HashMap, HashSet};
use crate::effects::EffectPhase;
use crate::element::{ComponentType, Element, ElementKind, KindId, PropValue, Props};
use crate::error::{CapturedError, Error};
use crate::hash::Key;
use crate::instance::{Instance, InstanceRef};
use crate::options::DiagnosticHooks;
use crate::propagate::propagate;
use crate::runtime::{Runtime, RuntimeHandle};
use crate::vnode::{VNode, VNodeRef};

type Command = Box<dyn FnOnce(&mut dyn Applier) -> Result<(), HostError>>;

#[derive(Debug)]
pub(crate) enum PassError {
    Uncaught(CapturedError),
    Host(HostError),
}

impl From<PassError> for Error {
    fn from(error: PassError) -> Self {
        match error {
            PassError::Uncaught(error) => Error::Uncaught(error),
            PassError::Host(error) => Error::Host(error),
        }
    }
}

/// Identity used to pair a new child with an old one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum MatchKey {
    Keyed(KindId, Key),
    /// N-th unkeyed sibling of the same kind.
    Positional(KindId, usize),
}

impl MatchKey {
    fn of(element: &Element, ordinals: &mut HashMap<KindId, usize>) -> Self {
        let kind = element.kind_id();
        match element.key_digest() {
            Some(key) => MatchKey::Keyed(kind, key),
            None => {
                let ordinal = ordinals.entry(kind.clone()).or_insert(0);
                let position = *ordinal;
                *ordinal += 1;
                MatchKey::Positional(kind, position)
            }
        }
    }
}

struct Checkpoint {
    commands: usize,
    created: usize,
    commit_queue: usize,
    adopted: usize,
    unmounts: usize,
    strays: usize,
}

pub(crate) struct Pass<'a> {
    applier: &'a mut dyn Applier,
    runtime: RuntimeHandle,
    hooks: DiagnosticHooks,
    commands: Vec<Command>,
    /// Host nodes created by this pass; disposed if their subtree is rolled back.
    created: Vec<HostId>,
    /// Components rendered by this pass, children before their parents.
    commit_queue: Vec<(InstanceRef, VNodeRef)>,
    /// Instances that failed to render but keep their position.
    adopted: Vec<(InstanceRef, VNodeRef)>,
    unmounts: Vec<VNodeRef>,
    /// Unclaimed existing host children, one frame per host parent.
    hydration: Option<Vec<Vec<HostId>>>,
    strays: Vec<HostId>,
}

impl<'a> Pass<'a> {
    pub(crate) fn new(applier: &'a mut dyn Applier, runtime: &Runtime) -> Self {
        Self {
            applier,
            runtime: runtime.handle(),
            hooks: runtime.hooks().clone(),
            commands: Vec::new(),
            created: Vec::new(),
            commit_queue: Vec::new(),
            adopted: Vec::new(),
            unmounts: Vec::new(),
            hydration: None,
            strays: Vec::new(),
        }
    }

    /// Adopts `existing` host children of the container instead of creating
    /// new nodes wherever kind and tag line up.
    pub(crate) fn hydrating(mut self, existing: Vec<HostId>) -> Self {
        self.hydration = Some(vec![existing]);
        self
    }

    fn push(&mut self, command: impl FnOnce(&mut dyn Applier) -> Result<(), HostError> + 'static) {
        self.commands.push(Box::new(command));
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            commands: self.commands.len(),
            created: self.created.len(),
            commit_queue: self.commit_queue.len(),
            adopted: self.adopted.len(),
            unmounts: self.unmounts.len(),
            strays: self.strays.len(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.commands.truncate(checkpoint.commands);
        self.commit_queue.truncate(checkpoint.commit_queue);
        self.adopted.truncate(checkpoint.adopted);
        self.unmounts.truncate(checkpoint.unmounts);
        self.strays.truncate(checkpoint.strays);
        for host in self.created.split_off(checkpoint.created) {
            self.dispose(host);
        }
    }

    fn dispose(&mut self, host: HostId) {
        if let Err(error) = self.applier.dispose(host) {
            log::warn!("failed to dispose host node {host}: {error}");
        }
    }

    pub(crate) fn diff_children(
        &mut self,
        old: &[VNodeRef],
        elements: &[Element],
        parent: &VNodeRef,
    ) -> Result<Vec<VNodeRef>, PassError> {
        let mut ordinals = HashMap::new();
        let mut lookup: HashMap<MatchKey, usize> = HashMap::with_capacity(old.len());
        for (index, child) in old.iter().enumerate() {
            let key = MatchKey::of(&child.element, &mut ordinals);
            if !lookup.contains_key(&key) {
                lookup.insert(key, index);
            }
        }

        ordinals.clear();
        let mut seen = HashSet::new();
        let mut used = vec![false; old.len()];
        let mut children = Vec::with_capacity(elements.len());
        for element in elements {
            let key = MatchKey::of(element, &mut ordinals);
            if matches!(key, MatchKey::Keyed(..)) && !seen.insert(key.clone()) {
                log::warn!("duplicate key among children of {:?}; later ones mount fresh", parent.element.kind());
            }
            let matched = lookup.remove(&key).map(|index| {
                used[index] = true;
                &old[index]
            });
            children.push(self.diff(matched, element, parent)?);
        }

        for (child, used) in old.iter().zip(used) {
            if !used {
                self.unmounts.push(child.clone());
            }
        }
        Ok(children)
    }

    fn diff(
        &mut self,
        old: Option<&VNodeRef>,
        element: &Element,
        parent: &VNodeRef,
    ) -> Result<VNodeRef, PassError> {
        if let Some(old) = old {
            if old.element.ptr_eq(element) {
                log::trace!("reusing unchanged {:?}", element.kind());
                old.set_parent(parent);
                return Ok(old.clone());
            }
        }
        self.hooks.before_diff(element);
        match element.kind() {
            ElementKind::Text(text) => self.diff_text(old, element, parent, text),
            ElementKind::Host(tag) => self.diff_host(old, element, parent, tag),
            ElementKind::Fragment => self.diff_fragment(old, element, parent),
            ElementKind::Component(component) => self.diff_component(old, element, parent, component),
        }
    }

    fn diff_text(
        &mut self,
        old: Option<&VNodeRef>,
        element: &Element,
        parent: &VNodeRef,
        text: &str,
    ) -> Result<VNodeRef, PassError> {
        let host = match old.and_then(|old| old.host.map(|host| (old, host))) {
            Some((old, host)) => {
                if !matches!(old.element.kind(), ElementKind::Text(previous) if previous == text) {
                    let text = text.to_owned();
                    self.push(move |applier| applier.set_text(host, &text));
                }
                host
            }
            None => self.create_text(text)?,
        };
        Ok(VNode::new(element, parent, Some(host), None))
    }

    fn diff_host(
        &mut self,
        old: Option<&VNodeRef>,
        element: &Element,
        parent: &VNodeRef,
        tag: &str,
    ) -> Result<VNodeRef, PassError> {
        let (host, old_props, old_children, previous) =
            match old.and_then(|old| old.host.map(|host| (old, host))) {
                Some((old, host)) => (
                    host,
                    Some(old.element.props()),
                    old.children.borrow().clone(),
                    old.host_children(),
                ),
                None => {
                    let host = self.create_element(tag)?;
                    let existing = match self.hydration {
                        Some(_) => self.applier.children(host),
                        None => Vec::new(),
                    };
                    (host, None, Vec::new(), existing)
                }
            };
        self.diff_props(host, old_props, element.props());

        let vnode = VNode::new(element, parent, Some(host), None);
        if let Some(frames) = self.hydration.as_mut() {
            frames.push(previous.clone());
        }
        let children = self.diff_children(&old_children, element.props().children(), &vnode);
        if let Some(frames) = self.hydration.as_mut() {
            frames.pop();
        }
        vnode.set_children(children?);
        self.reconcile(host, previous, vnode.host_children());
        Ok(vnode)
    }

    fn diff_fragment(
        &mut self,
        old: Option<&VNodeRef>,
        element: &Element,
        parent: &VNodeRef,
    ) -> Result<VNodeRef, PassError> {
        let old_children = old
            .map(|old| old.children.borrow().clone())
            .unwrap_or_default();
        let vnode = VNode::new(element, parent, None, None);
        let children = self.diff_children(&old_children, element.props().children(), &vnode)?;
        vnode.set_children(children);
        Ok(vnode)
    }

    /// Renders a component and diffs its output. A render failure rolls back
    /// everything the component produced, keeps its previous output and hands
    /// the error to the nearest boundary.
    pub(crate) fn diff_component(
        &mut self,
        old: Option<&VNodeRef>,
        element: &Element,
        parent: &VNodeRef,
        component: &ComponentType,
    ) -> Result<VNodeRef, PassError> {
        let (instance, is_new) = match old.and_then(|old| old.instance.clone()) {
            Some(instance) => (instance, false),
            None => (
                Instance::new(component, element.props(), self.runtime.clone()),
                true,
            ),
        };
        let vnode = VNode::new(element, parent, None, Some(instance.clone()));
        let old_children = old
            .map(|old| old.children.borrow().clone())
            .unwrap_or_default();

        let checkpoint = self.checkpoint();
        let recovering = instance.begin_recovery();
        self.hooks.before_render(instance.name);
        match instance.render(element.props(), is_new) {
            Ok(Some(output)) => {
                let children =
                    self.diff_children(&old_children, std::slice::from_ref(&output), &vnode)?;
                vnode.set_children(children);
            }
            Ok(None) => vnode.set_children(old_children),
            Err(error) => {
                log::debug!("<{}> failed to render: {error}", instance.name);
                self.rollback(checkpoint);
                vnode.set_children(old_children);
                vnode.relink();
                if !is_new {
                    self.adopted.push((instance.clone(), vnode.clone()));
                }
                let outcome = propagate(error, &vnode, &self.hooks);
                if recovering {
                    instance.end_recovery();
                }
                return match outcome {
                    Ok(()) => Ok(vnode),
                    Err(error) => Err(PassError::Uncaught(error)),
                };
            }
        }
        if recovering {
            instance.end_recovery();
        }
        self.commit_queue.push((instance, vnode.clone()));
        Ok(vnode)
    }

    fn diff_props(&mut self, host: HostId, old: Option<&Props>, new: &Props) {
        for (name, value) in new.iter() {
            let previous = old.and_then(|old| old.get(name));
            if previous == Some(value) && !matches!(name, "value" | "checked") {
                continue;
            }
            match (listener_event(name), value) {
                (Some(event), PropValue::Listener(listener)) => {
                    let event = event.to_owned();
                    let listener = listener.clone();
                    self.push(move |applier| applier.set_listener(host, &event, listener));
                }
                _ => {
                    let name = name.to_owned();
                    let value = value.clone();
                    self.push(move |applier| applier.set_property(host, &name, &value));
                }
            }
        }

        let Some(old) = old else {
            return;
        };
        for (name, value) in old.iter() {
            if new.get(name).is_some() {
                continue;
            }
            match (listener_event(name), value) {
                (Some(event), PropValue::Listener(_)) => {
                    let event = event.to_owned();
                    self.push(move |applier| applier.remove_listener(host, &event));
                }
                _ => {
                    let name = name.to_owned();
                    self.push(move |applier| applier.remove_property(host, &name));
                }
            }
        }
    }

    fn create_element(&mut self, tag: &str) -> Result<HostId, PassError> {
        if let Some((id, _)) = self.claim(|kind| matches!(kind, HostKind::Element(existing) if existing == tag)) {
            log::trace!("hydrating <{tag}> from host node {id}");
            return Ok(id);
        }
        let id = self.applier.create_element(tag).map_err(PassError::Host)?;
        self.created.push(id);
        Ok(id)
    }

    fn create_text(&mut self, text: &str) -> Result<HostId, PassError> {
        if let Some((id, kind)) = self.claim(|kind| matches!(kind, HostKind::Text(_))) {
            if !matches!(&kind, HostKind::Text(existing) if existing == text) {
                let text = text.to_owned();
                self.push(move |applier| applier.set_text(id, &text));
            }
            return Ok(id);
        }
        let id = self.applier.create_text(text).map_err(PassError::Host)?;
        self.created.push(id);
        Ok(id)
    }

    /// Takes the first unclaimed existing node under the current hydration
    /// parent that `accepts` its kind.
    fn claim(&mut self, accepts: impl Fn(&HostKind) -> bool) -> Option<(HostId, HostKind)> {
        let candidates = self.hydration.as_mut()?.last_mut()?;
        let applier = &*self.applier;
        let position = candidates
            .iter()
            .position(|id| applier.kind(*id).is_some_and(|kind| accepts(&kind)))?;
        let id = candidates.remove(position);
        applier.kind(id).map(|kind| (id, kind))
    }

    /// Brings the host children of `parent` from `previous` to `target` order
    /// with removals first, then inserts and moves anchored on the node that
    /// currently occupies each target slot.
    pub(crate) fn reconcile(&mut self, parent: HostId, previous: Vec<HostId>, target: Vec<HostId>) {
        if previous == target {
            return;
        }
        let mut current = previous;
        let desired: HashSet<HostId> = target.iter().copied().collect();

        for index in (0..current.len()).rev() {
            let child = current[index];
            if !desired.contains(&child) {
                current.remove(index);
                self.push(move |applier| applier.remove_child(parent, child));
                if self.hydration.is_some() {
                    self.strays.push(child);
                }
            }
        }

        for (target_index, &child) in target.iter().enumerate() {
            match current.iter().position(|&existing| existing == child) {
                Some(index) if index == target_index => {}
                found => {
                    if let Some(index) = found {
                        current.remove(index);
                    }
                    let anchor = current.get(target_index).copied();
                    current.insert(target_index.min(current.len()), child);
                    self.push(move |applier| applier.insert_before(parent, child, anchor));
                }
            }
        }
    }

    /// Discards everything recorded and releases the nodes this pass created.
    pub(crate) fn abort(mut self) {
        log::debug!(
            "aborting pass: dropping {} command(s), {} new host node(s)",
            self.commands.len(),
            self.created.len()
        );
        self.commands.clear();
        for host in std::mem::take(&mut self.created) {
            self.dispose(host);
        }
    }

    /// Applies the pass: unmount teardown, host mutations, disposal of
    /// detached nodes, then layout effects and lifecycles in commit order.
    /// Passive effects are queued on the runtime. Lifecycle errors no boundary
    /// handles are reported after the commit finished.
    pub(crate) fn commit(mut self) -> Result<(), Error> {
        let mut uncaught = None;
        let unmounts = std::mem::take(&mut self.unmounts);
        for vnode in &unmounts {
            self.unmount_tree(vnode, &mut uncaught);
        }

        log::trace!("applying {} host command(s)", self.commands.len());
        for command in std::mem::take(&mut self.commands) {
            command(&mut *self.applier)?;
        }
        for vnode in &unmounts {
            for host in vnode.top_hosts() {
                self.dispose(host);
            }
        }
        for host in std::mem::take(&mut self.strays) {
            self.dispose(host);
        }

        for (instance, vnode) in std::mem::take(&mut self.adopted) {
            instance.commit(&vnode);
        }
        let queue = std::mem::take(&mut self.commit_queue);
        for (instance, vnode) in &queue {
            instance.commit(vnode);
        }
        for (instance, vnode) in &queue {
            if let Err(error) = instance.run_effect_cleanups(EffectPhase::Layout) {
                self.report(error, vnode, &mut uncaught);
            }
        }
        for (instance, vnode) in &queue {
            if instance.is_unmounted() {
                continue;
            }
            if let Err(error) = instance.run_effect_bodies(EffectPhase::Layout) {
                self.report(error, vnode, &mut uncaught);
            }
            if let Err(error) = instance.run_commit_callbacks() {
                self.report(error, vnode, &mut uncaught);
            }
            if instance.has_pending_effects(EffectPhase::Passive) {
                self.runtime.enqueue_effects(instance.downgrade());
            }
            instance.enqueue();
        }
        self.hooks.after_commit(queue.len());

        match uncaught {
            Some(error) => Err(Error::Uncaught(error)),
            None => Ok(()),
        }
    }

    /// Parent first: an instance tears down before the instances it rendered.
    fn unmount_tree(&self, vnode: &VNodeRef, uncaught: &mut Option<CapturedError>) {
        self.hooks.unmounting(&vnode.element);
        if let Some(instance) = &vnode.instance {
            if let Err(error) = instance.unmount() {
                self.report(error, vnode, uncaught);
            }
        }
        for child in vnode.children.borrow().iter() {
            self.unmount_tree(child, uncaught);
        }
    }

    fn report(&self, error: CapturedError, origin: &VNodeRef, uncaught: &mut Option<CapturedError>) {
        if let Err(error) = propagate(error, origin, &self.hooks) {
            log::error!("uncaught error during commit: {error}");
            uncaught.get_or_insert(error);
        }
    }
}

fn listener_event(name: &str) -> Option<&str> {
    name.strip_prefix("on").filter(|event| !event.is_empty())
}

#[cfg(test)]
#[path = "tests/diff_tests.rs"]
mod tests;
