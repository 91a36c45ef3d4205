//! Entry point that owns a host container and drives passes over it.

use crate::applier::{Applier, HostId};
use crate::diff::Pass;
use crate::effects::EffectPhase;
use crate::element::{Element, ElementKind};
use crate::error::{CapturedError, Error};
use crate::instance::InstanceRef;
use crate::options::RootConfig;
use crate::propagate::propagate;
use crate::runtime::Runtime;
use crate::vnode::{VNode, VNodeRef};

/// A rendered tree bound to one container node of an [`Applier`].
///
/// State updates only queue work. The owner decides when to run it, either
/// directly with [`Root::flush`] or when its [`RuntimeScheduler`] is poked.
///
/// [`RuntimeScheduler`]: crate::RuntimeScheduler
pub struct Root<A: Applier> {
    applier: A,
    runtime: Runtime,
    container: HostId,
    tree: VNodeRef,
    config: RootConfig,
}

impl<A: Applier> Root<A> {
    pub fn new(applier: A, container: HostId) -> Self {
        Self::with_config(applier, container, RootConfig::default())
    }

    pub fn with_config(applier: A, container: HostId, config: RootConfig) -> Self {
        let runtime = Runtime::new(config.scheduler.clone(), config.hooks.clone());
        Self {
            applier,
            runtime,
            container,
            tree: VNode::container(container),
            config,
        }
    }

    pub fn applier(&self) -> &A {
        &self.applier
    }

    pub fn applier_mut(&mut self) -> &mut A {
        &mut self.applier
    }

    pub fn container(&self) -> HostId {
        self.container
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn has_pending_work(&self) -> bool {
        self.runtime.has_pending_renders() || self.runtime.has_pending_effects()
    }

    /// Reconciles the container against `element`, then drains every render
    /// the commit queued. On an uncaught error the host tree stays as the
    /// previous commit left it.
    pub fn render(&mut self, element: &Element) -> Result<(), Error> {
        self.mount(element, false)
    }

    /// Like [`Root::render`], but adopts host nodes already present under the
    /// container when kind and tag match. Unclaimed nodes are removed.
    pub fn hydrate(&mut self, element: &Element) -> Result<(), Error> {
        if !self.tree.children.borrow().is_empty() {
            log::warn!("hydrate called on a root that already rendered; diffing instead");
            return self.mount(element, false);
        }
        self.mount(element, true)
    }

    /// Tears the whole tree down.
    pub fn unmount(&mut self) -> Result<(), Error> {
        self.mount(&Element::empty(), false)
    }

    fn mount(&mut self, element: &Element, hydrate: bool) -> Result<(), Error> {
        let old_children = self.tree.children.borrow().clone();
        let previous = if hydrate {
            self.applier.children(self.container)
        } else {
            self.tree.host_children()
        };
        let next = VNode::container(self.container);

        let mut pass = Pass::new(&mut self.applier, &self.runtime);
        if hydrate {
            pass = pass.hydrating(previous.clone());
        }
        let children = match pass.diff_children(&old_children, std::slice::from_ref(element), &next) {
            Ok(children) => children,
            Err(error) => {
                pass.abort();
                self.tree.relink();
                let error = Error::from(error);
                log::error!("render aborted: {error}");
                return Err(error);
            }
        };
        next.set_children(children);
        pass.reconcile(self.container, previous, next.host_children());
        self.tree = next;

        let committed = pass.commit();
        let drained = self.rerender();
        committed.and(drained)
    }

    /// Re-renders queued instances, shallowest first, until the queue is
    /// empty. Each instance gets its own pass; the first error is returned
    /// once the queue has drained.
    pub fn rerender(&mut self) -> Result<(), Error> {
        let mut first_error = None;
        for _ in 0..self.config.max_flush_rounds {
            let queue = self.runtime.take_render_queue();
            if queue.is_empty() {
                return first_error.map_or(Ok(()), Err);
            }
            for instance in &queue {
                instance.set_dequeued();
            }
            for instance in queue {
                if instance.is_unmounted() || !instance.is_dirty() {
                    continue;
                }
                if let Err(error) = self.rerender_instance(&instance) {
                    log::error!("re-render of <{}> failed: {error}", instance.name);
                    first_error.get_or_insert(error);
                }
            }
        }
        match self.runtime.has_pending_renders() {
            true => Err(Error::Unsettled(self.config.max_flush_rounds)),
            false => first_error.map_or(Ok(()), Err),
        }
    }

    fn rerender_instance(&mut self, instance: &InstanceRef) -> Result<(), Error> {
        let Some(old) = instance.committed_vnode() else {
            return Ok(());
        };
        let (Some(parent), Some(host_parent)) = (old.parent(), old.nearest_host_parent()) else {
            return Ok(());
        };
        let (ElementKind::Component(component), Some(host)) = (old.element.kind(), host_parent.host) else {
            return Ok(());
        };
        log::trace!("re-rendering <{}> #{}", instance.name, instance.id);
        let previous = host_parent.host_children();

        let mut pass = Pass::new(&mut self.applier, &self.runtime);
        let next = match pass.diff_component(Some(&old), &old.element, &parent, component) {
            Ok(next) => next,
            Err(error) => {
                pass.abort();
                old.relink();
                return Err(error.into());
            }
        };
        parent.replace_child(&old, next);
        pass.reconcile(host, previous, host_parent.host_children());
        pass.commit()
    }

    /// Runs queued passive effects: every cleanup across the batch first,
    /// then every body, skipping instances unmounted in between. Renders the
    /// effects schedule are left queued.
    pub fn flush_effects(&mut self) -> Result<(), Error> {
        let mut uncaught = None;
        let mut rounds = 0;
        while self.runtime.has_pending_effects() {
            if rounds == self.config.max_flush_rounds {
                return Err(Error::Unsettled(rounds));
            }
            rounds += 1;
            let batch: Vec<InstanceRef> = self
                .runtime
                .take_effect_queue()
                .into_iter()
                .filter(|instance| instance.is_mounted())
                .collect();
            log::trace!("flushing passive effects of {} instance(s)", batch.len());
            for instance in &batch {
                if let Err(error) = instance.run_effect_cleanups(EffectPhase::Passive) {
                    self.report(instance, error, &mut uncaught);
                }
            }
            for instance in &batch {
                if !instance.is_mounted() {
                    continue;
                }
                if let Err(error) = instance.run_effect_bodies(EffectPhase::Passive) {
                    self.report(instance, error, &mut uncaught);
                }
            }
        }
        uncaught.map_or(Ok(()), |error| Err(Error::Uncaught(error)))
    }

    fn report(&self, instance: &InstanceRef, error: CapturedError, uncaught: &mut Option<CapturedError>) {
        let outcome = match instance.committed_vnode() {
            Some(vnode) => propagate(error, &vnode, self.runtime.hooks()),
            None => Err(error),
        };
        if let Err(error) = outcome {
            log::error!("uncaught error in effect of <{}>: {error}", instance.name);
            uncaught.get_or_insert(error);
        }
    }

    /// Alternates effect flushes and render drains until nothing is queued.
    pub fn flush(&mut self) -> Result<(), Error> {
        let mut first_error = None;
        for _ in 0..self.config.max_flush_rounds {
            if !self.has_pending_work() {
                return first_error.map_or(Ok(()), Err);
            }
            if let Err(error) = self.flush_effects() {
                first_error.get_or_insert(error);
            }
            if let Err(error) = self.rerender() {
                first_error.get_or_insert(error);
            }
        }
        match self.has_pending_work() {
            true => Err(Error::Unsettled(self.config.max_flush_rounds)),
            false => first_error.map_or(Ok(()), Err),
        }
    }
}

impl<A: Applier> Drop for Root<A> {
    fn drop(&mut self) {
        if std::thread::panicking() || self.tree.children.borrow().is_empty() {
            return;
        }
        if let Err(error) = self.unmount() {
            log::warn!("error while dropping root: {error}");
        }
    }
}

#[cfg(test)]
#[path = "tests/root_tests.rs"]
mod tests;
