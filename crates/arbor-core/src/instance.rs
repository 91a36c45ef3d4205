//! Persistent component instances.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::component::{AnyClass, StateUpdate};
use crate::effects::EffectPhase;
use crate::element::{ComponentType, Element, FunctionRender, Props};
use crate::error::{CapturedError, ErrorInfo};
use crate::hooks::{HookStore, RenderScope};
use crate::runtime::RuntimeHandle;
use crate::vnode::{VNode, VNodeRef};

/// How many times a function component may render itself again in one pass.
const RENDER_LOOP_LIMIT: usize = 25;

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

pub(crate) type InstanceRef = Rc<Instance>;

pub(crate) enum InstanceBody {
    Function {
        render: FunctionRender,
        hooks: RefCell<HookStore>,
    },
    Class(RefCell<Box<dyn AnyClass>>),
}

/// Callbacks a class instance runs after the commit that rendered it.
enum CommitCallback {
    DidMount,
    DidUpdate {
        prev_props: Props,
        prev_state: Box<dyn Any>,
    },
}

pub(crate) struct Instance {
    pub(crate) id: usize,
    pub(crate) name: &'static str,
    this: Weak<Instance>,
    runtime: RuntimeHandle,
    pub(crate) body: InstanceBody,
    vnode: RefCell<Weak<VNode>>,
    depth: Cell<usize>,
    dirty: Cell<bool>,
    force: Cell<bool>,
    enqueued: Cell<bool>,
    mounted: Cell<bool>,
    unmounted: Cell<bool>,
    pending_error: Cell<bool>,
    processing_exception: Cell<bool>,
    /// Bumped on every scheduled render; boundaries compare it around their
    /// recovery callbacks to learn whether they reacted to an error.
    update_epoch: Cell<u64>,
    state_updates: RefCell<Vec<StateUpdate>>,
    commit_callbacks: RefCell<Vec<CommitCallback>>,
}

impl Instance {
    pub(crate) fn new(component: &ComponentType, props: &Props, runtime: RuntimeHandle) -> InstanceRef {
        let body = match component {
            ComponentType::Function { render, .. } => InstanceBody::Function {
                render: *render,
                hooks: RefCell::new(HookStore::default()),
            },
            ComponentType::Class(class) => InstanceBody::Class(RefCell::new((class.create)(props))),
        };
        Rc::new_cyclic(|this| Instance {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            name: component.name(),
            this: this.clone(),
            runtime,
            body,
            vnode: RefCell::new(Weak::new()),
            depth: Cell::new(0),
            dirty: Cell::new(true),
            force: Cell::new(false),
            enqueued: Cell::new(false),
            mounted: Cell::new(false),
            unmounted: Cell::new(false),
            pending_error: Cell::new(false),
            processing_exception: Cell::new(false),
            update_epoch: Cell::new(0),
            state_updates: RefCell::new(Vec::new()),
            commit_callbacks: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn downgrade(&self) -> Weak<Instance> {
        self.this.clone()
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub(crate) fn is_unmounted(&self) -> bool {
        self.unmounted.get()
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth.get()
    }

    pub(crate) fn is_processing_exception(&self) -> bool {
        self.processing_exception.get()
    }

    pub(crate) fn committed_vnode(&self) -> Option<VNodeRef> {
        self.vnode.borrow().upgrade()
    }

    pub(crate) fn set_dequeued(&self) {
        self.enqueued.set(false);
    }

    /// Marks the instance dirty and, once mounted, queues it for the next
    /// drain. Repeated calls before the drain collapse into one entry.
    pub(crate) fn schedule_render(&self) {
        if self.unmounted.get() {
            return;
        }
        self.dirty.set(true);
        self.update_epoch.set(self.update_epoch.get() + 1);
        self.enqueue();
    }

    pub(crate) fn enqueue(&self) {
        if self.mounted.get() && self.dirty.get() && !self.enqueued.replace(true) {
            log::trace!("queue render of <{}> #{}", self.name, self.id);
            self.runtime.enqueue_render(self.downgrade());
        }
    }

    pub(crate) fn enqueue_state_update(&self, update: StateUpdate) {
        if self.unmounted.get() {
            return;
        }
        self.state_updates.borrow_mut().push(update);
        self.schedule_render();
    }

    pub(crate) fn force_update(&self) {
        if self.unmounted.get() {
            return;
        }
        self.force.set(true);
        self.schedule_render();
    }

    pub(crate) fn commit(&self, vnode: &VNodeRef) {
        *self.vnode.borrow_mut() = Rc::downgrade(vnode);
        self.depth.set(vnode.depth);
        self.mounted.set(true);
    }

    /// Starts a render of a boundary that caught an error on the previous
    /// pass. Returns whether the recovery flags must be cleared afterwards.
    pub(crate) fn begin_recovery(&self) -> bool {
        if self.pending_error.get() {
            self.processing_exception.set(true);
            true
        } else {
            false
        }
    }

    pub(crate) fn end_recovery(&self) {
        self.pending_error.set(false);
        self.processing_exception.set(false);
    }

    pub(crate) fn mark_pending_error(&self) {
        self.pending_error.set(true);
    }

    /// Produces the next child description. `Ok(None)` means the instance
    /// declined to update and its previous output stays.
    pub(crate) fn render(self: &Rc<Self>, props: &Props, is_new: bool) -> Result<Option<Element>, CapturedError> {
        self.commit_callbacks.borrow_mut().clear();
        match &self.body {
            InstanceBody::Function { render, hooks } => {
                self.run_passive_effects()?;
                let _scope = RenderScope::enter(self.clone());
                let mut passes = 0;
                loop {
                    self.dirty.set(false);
                    hooks.borrow_mut().begin_render();
                    let output = render(props);
                    passes += 1;
                    if output.is_err() || !self.dirty.get() || passes >= RENDER_LOOP_LIMIT {
                        return output.map(Some).map_err(CapturedError::from);
                    }
                    log::trace!("<{}> updated state while rendering, rendering again", self.name);
                }
            }
            InstanceBody::Class(class) => {
                let updates = self.state_updates.take();
                let force = self.force.replace(false);
                self.dirty.set(false);
                let mut class = class.borrow_mut();
                class.prepare(updates, props);
                if !is_new && !force && !class.should_update(&self.this, props) {
                    class.accept(props);
                    log::trace!("<{}> skipped update", self.name);
                    return Ok(None);
                }
                let (prev_props, prev_state) = class.accept(props);
                let element = class.render(&self.this).map_err(CapturedError::from)?;
                self.commit_callbacks.borrow_mut().push(if is_new {
                    CommitCallback::DidMount
                } else {
                    CommitCallback::DidUpdate {
                        prev_props,
                        prev_state,
                    }
                });
                Ok(Some(element))
            }
        }
    }

    /// Offers `error` to this instance's recovery callbacks. `Ok(true)` means
    /// the instance scheduled a re-render in response and owns the error now.
    pub(crate) fn handle_error(&self, error: &CapturedError, info: &ErrorInfo) -> Result<bool, CapturedError> {
        let epoch = self.update_epoch.get();
        match &self.body {
            InstanceBody::Class(class) => {
                let derived = class.borrow().derive_from_error(error).map_err(CapturedError::from)?;
                if let Some(update) = derived {
                    self.enqueue_state_update(update);
                }
                class
                    .borrow_mut()
                    .did_catch(&self.this, error, info)
                    .map_err(CapturedError::from)?;
            }
            InstanceBody::Function { hooks, .. } => {
                let handler = hooks.borrow().catch_handler.clone();
                if let Some(handler) = handler {
                    handler(error, info);
                }
            }
        }
        Ok(self.update_epoch.get() != epoch)
    }

    pub(crate) fn run_commit_callbacks(&self) -> Result<(), CapturedError> {
        let callbacks = self.commit_callbacks.take();
        let InstanceBody::Class(class) = &self.body else {
            return Ok(());
        };
        for callback in callbacks {
            let mut class = class.borrow_mut();
            let result = match callback {
                CommitCallback::DidMount => class.did_mount(&self.this),
                CommitCallback::DidUpdate {
                    prev_props,
                    prev_state,
                } => class.did_update(&self.this, &prev_props, prev_state.as_ref()),
            };
            result.map_err(CapturedError::from)?;
        }
        Ok(())
    }

    pub(crate) fn has_pending_effects(&self, phase: EffectPhase) -> bool {
        match &self.body {
            InstanceBody::Function { hooks, .. } => hooks.borrow().has_pending_effects(phase),
            InstanceBody::Class(_) => false,
        }
    }

    /// First half of a flush: cleanups of every cell about to run again.
    pub(crate) fn run_effect_cleanups(&self, phase: EffectPhase) -> Result<(), CapturedError> {
        let InstanceBody::Function { hooks, .. } = &self.body else {
            return Ok(());
        };
        let cells = hooks.borrow().pending_effects(phase);
        for cell in cells {
            let cleanup = cell.update(|cell| match cell.pending {
                Some(_) => cell.cleanup.take(),
                None => None,
            });
            if let Some(cleanup) = cleanup {
                if let Err(error) = cleanup() {
                    self.discard_effects(phase);
                    return Err(error.into());
                }
            }
        }
        Ok(())
    }

    /// Second half of a flush: the pending bodies, in registration order. A
    /// failing body discards the ones after it.
    pub(crate) fn run_effect_bodies(&self, phase: EffectPhase) -> Result<(), CapturedError> {
        let InstanceBody::Function { hooks, .. } = &self.body else {
            return Ok(());
        };
        let cells = hooks.borrow_mut().take_pending_effects(phase);
        let mut cells = cells.into_iter();
        while let Some(cell) = cells.next() {
            let Some(body) = cell.update(|cell| cell.pending.take()) else {
                continue;
            };
            match body() {
                Ok(cleanup) => cell.update(|cell| cell.cleanup = cleanup),
                Err(error) => {
                    for rest in cells {
                        rest.update(|cell| cell.pending = None);
                    }
                    return Err(error.into());
                }
            }
        }
        Ok(())
    }

    fn discard_effects(&self, phase: EffectPhase) {
        if let InstanceBody::Function { hooks, .. } = &self.body {
            let cells = hooks.borrow_mut().take_pending_effects(phase);
            for cell in cells {
                cell.update(|cell| cell.pending = None);
            }
        }
    }

    /// Flushes this instance's queued passive effects ahead of a new render.
    fn run_passive_effects(&self) -> Result<(), CapturedError> {
        if !self.has_pending_effects(EffectPhase::Passive) {
            return Ok(());
        }
        log::debug!("<{}> renders again before its effects ran, flushing them first", self.name);
        self.run_effect_cleanups(EffectPhase::Passive)?;
        self.run_effect_bodies(EffectPhase::Passive)
    }

    /// Tears the instance down: it leaves every queue, each effect cleanup runs
    /// once in registration order, then the unmount lifecycle runs. The first
    /// failure is reported after all of them ran.
    pub(crate) fn unmount(&self) -> Result<(), CapturedError> {
        if self.unmounted.replace(true) {
            return Ok(());
        }
        let was_mounted = self.mounted.replace(false);
        self.dirty.set(false);
        self.state_updates.borrow_mut().clear();
        self.commit_callbacks.borrow_mut().clear();
        self.runtime.cancel(self.id);
        log::trace!("unmount <{}> #{}", self.name, self.id);

        let mut first_error = None;
        match &self.body {
            InstanceBody::Function { hooks, .. } => {
                let cells = hooks.borrow_mut().drain_effect_cells();
                for cell in cells {
                    let cleanup = cell.update(|cell| {
                        cell.pending = None;
                        cell.cleanup.take()
                    });
                    if let Some(Err(error)) = cleanup.map(|cleanup| cleanup()) {
                        first_error.get_or_insert(CapturedError::from(error));
                    }
                }
                hooks.borrow_mut().catch_handler = None;
            }
            InstanceBody::Class(class) if was_mounted => {
                if let Err(error) = class.borrow_mut().will_unmount(&self.this) {
                    first_error.get_or_insert(CapturedError::from(error));
                }
            }
            InstanceBody::Class(_) => {}
        }
        first_error.map_or(Ok(()), Err)
    }
}
