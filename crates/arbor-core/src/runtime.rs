use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::instance::{Instance, InstanceRef};
use crate::options::DiagnosticHooks;
use crate::platform::RuntimeScheduler;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    hooks: DiagnosticHooks,
    render_queue: RefCell<Vec<Weak<Instance>>>,
    effect_queue: RefCell<Vec<Weak<Instance>>>,
}

impl RuntimeInner {
    fn enqueue_render(&self, instance: Weak<Instance>) {
        self.render_queue.borrow_mut().push(instance);
        self.scheduler.schedule_render();
    }

    fn enqueue_effects(&self, instance: Weak<Instance>) {
        let mut queue = self.effect_queue.borrow_mut();
        if !queue.iter().any(|queued| queued.ptr_eq(&instance)) {
            queue.push(instance);
            drop(queue);
            self.scheduler.schedule_effects();
        }
    }

    fn cancel(&self, id: usize) {
        let keep = |entry: &Weak<Instance>| entry.upgrade().is_some_and(|instance| instance.id != id);
        self.render_queue.borrow_mut().retain(keep);
        self.effect_queue.borrow_mut().retain(keep);
    }
}

/// Pending-work queues shared by every instance of one root.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>, hooks: DiagnosticHooks) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                scheduler,
                hooks,
                render_queue: RefCell::new(Vec::new()),
                effect_queue: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn has_pending_renders(&self) -> bool {
        !self.inner.render_queue.borrow().is_empty()
    }

    pub fn has_pending_effects(&self) -> bool {
        !self.inner.effect_queue.borrow().is_empty()
    }

    pub(crate) fn hooks(&self) -> &DiagnosticHooks {
        &self.inner.hooks
    }

    /// Live queued instances, shallowest first. Entries with equal depth keep
    /// the order they were queued in.
    pub(crate) fn take_render_queue(&self) -> Vec<InstanceRef> {
        let queued = std::mem::take(&mut *self.inner.render_queue.borrow_mut());
        let mut live: Vec<InstanceRef> = queued.iter().filter_map(Weak::upgrade).collect();
        live.sort_by_key(|instance| instance.depth());
        live
    }

    pub(crate) fn take_effect_queue(&self) -> Vec<InstanceRef> {
        let queued = std::mem::take(&mut *self.inner.effect_queue.borrow_mut());
        queued.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Weak handle held by instances, so a dropped root releases its queues.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub(crate) fn enqueue_render(&self, instance: Weak<Instance>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_render(instance);
        }
    }

    pub(crate) fn enqueue_effects(&self, instance: Weak<Instance>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_effects(instance);
        }
    }

    /// Drops every queued entry of the instance `id`.
    pub(crate) fn cancel(&self, id: usize) {
        if let Some(inner) = self.0.upgrade() {
            inner.cancel(id);
        }
    }

    pub fn has_pending_renders(&self) -> bool {
        self.0
            .upgrade()
            .is_some_and(|inner| !inner.render_queue.borrow().is_empty())
    }

    pub fn has_pending_effects(&self) -> bool {
        self.0
            .upgrade()
            .is_some_and(|inner| !inner.effect_queue.borrow().is_empty())
    }
}
