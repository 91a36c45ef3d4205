//! Hook state for function components.
//!
//! Every instance owns an ordered slot list. The cursor is reset at the start
//! of each render and each hook call claims the next slot, so the Nth call of
//! every render binds to the slot created by the Nth call of the first render.
//! Calling hooks conditionally is a programmer error and panics as soon as a
//! slot is claimed by a different kind of hook.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::effects::{EffectCell, EffectPhase, IntoCleanup};
use crate::error::{CapturedError, ErrorInfo};
use crate::instance::{Instance, InstanceBody, InstanceRef};
use crate::owned::Owned;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HookKind {
    State,
    Memo,
    Ref,
    Effect,
    LayoutEffect,
}

struct HookSlot {
    kind: HookKind,
    cell: Box<dyn Any>,
}

pub(crate) type CatchHandler = Rc<dyn Fn(&CapturedError, &ErrorInfo)>;

#[derive(Default)]
pub(crate) struct HookStore {
    slots: Vec<HookSlot>,
    cursor: usize,
    /// Pending effect cells keyed by slot index, kept in slot order.
    passive: Vec<(usize, Owned<EffectCell>)>,
    layout: Vec<(usize, Owned<EffectCell>)>,
    pub(crate) catch_handler: Option<CatchHandler>,
}

impl HookStore {
    pub(crate) fn begin_render(&mut self) {
        self.cursor = 0;
    }

    fn queue(&mut self, phase: EffectPhase) -> &mut Vec<(usize, Owned<EffectCell>)> {
        match phase {
            EffectPhase::Layout => &mut self.layout,
            EffectPhase::Passive => &mut self.passive,
        }
    }

    /// Queues the effect claimed by the latest hook call. A cell still queued
    /// from a render that never committed keeps its place.
    fn enqueue_effect(&mut self, phase: EffectPhase, cell: Owned<EffectCell>) {
        let slot = self.cursor.saturating_sub(1);
        let queue = self.queue(phase);
        if let Err(position) = queue.binary_search_by_key(&slot, |(queued, _)| *queued) {
            queue.insert(position, (slot, cell));
        }
    }

    pub(crate) fn has_pending_effects(&self, phase: EffectPhase) -> bool {
        match phase {
            EffectPhase::Layout => !self.layout.is_empty(),
            EffectPhase::Passive => !self.passive.is_empty(),
        }
    }

    pub(crate) fn pending_effects(&self, phase: EffectPhase) -> Vec<Owned<EffectCell>> {
        let queue = match phase {
            EffectPhase::Layout => &self.layout,
            EffectPhase::Passive => &self.passive,
        };
        queue.iter().map(|(_, cell)| cell.clone()).collect()
    }

    pub(crate) fn take_pending_effects(&mut self, phase: EffectPhase) -> Vec<Owned<EffectCell>> {
        std::mem::take(self.queue(phase))
            .into_iter()
            .map(|(_, cell)| cell)
            .collect()
    }

    /// Every effect cell in registration order, clearing both queues.
    pub(crate) fn drain_effect_cells(&mut self) -> Vec<Owned<EffectCell>> {
        self.passive.clear();
        self.layout.clear();
        self.slots
            .iter()
            .filter(|slot| matches!(slot.kind, HookKind::Effect | HookKind::LayoutEffect))
            .filter_map(|slot| slot.cell.downcast_ref::<Owned<EffectCell>>().cloned())
            .collect()
    }
}

thread_local! {
    static RENDERING: RefCell<Vec<InstanceRef>> = const { RefCell::new(Vec::new()) };
}

/// Marks an instance as the one whose render is on the stack.
pub(crate) struct RenderScope;

impl RenderScope {
    pub(crate) fn enter(instance: InstanceRef) -> Self {
        RENDERING.with(|stack| stack.borrow_mut().push(instance));
        RenderScope
    }
}

impl Drop for RenderScope {
    fn drop(&mut self) {
        RENDERING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn with_current_instance<R>(f: impl FnOnce(&InstanceRef) -> R) -> R {
    let instance = RENDERING
        .with(|stack| stack.borrow().last().cloned())
        .unwrap_or_else(|| panic!("hooks can only be called while a function component renders"));
    f(&instance)
}

impl Instance {
    fn claim_hook<T: 'static>(&self, kind: HookKind, init: impl FnOnce() -> T) -> Owned<T> {
        let InstanceBody::Function { hooks, .. } = &self.body else {
            panic!("hooks are not available in class component <{}>", self.name);
        };
        let index = {
            let mut store = hooks.borrow_mut();
            store.cursor += 1;
            store.cursor - 1
        };
        let existing = hooks.borrow().slots.get(index).map(|slot| {
            assert_eq!(
                slot.kind, kind,
                "hook #{index} of <{}> changed kind between renders",
                self.name
            );
            slot.cell.downcast_ref::<Owned<T>>().cloned()
        });
        match existing {
            Some(Some(cell)) => cell,
            Some(None) => panic!(
                "hook #{index} of <{}> changed value type between renders",
                self.name
            ),
            None => {
                let cell = Owned::new(init());
                hooks.borrow_mut().slots.push(HookSlot {
                    kind,
                    cell: Box::new(cell.clone()),
                });
                cell
            }
        }
    }

    fn enqueue_effect(&self, phase: EffectPhase, cell: Owned<EffectCell>) {
        if let InstanceBody::Function { hooks, .. } = &self.body {
            hooks.borrow_mut().enqueue_effect(phase, cell);
        }
    }
}

struct StateCell<T> {
    value: T,
    pending: Option<T>,
}

impl<T> StateCell<T> {
    /// Promotes the value dispatched since the last render.
    fn current(&mut self) -> &T {
        if let Some(next) = self.pending.take() {
            self.value = next;
        }
        &self.value
    }
}

fn dispatch<T: PartialEq>(
    cell: &Owned<StateCell<T>>,
    instance: &Weak<Instance>,
    next: impl FnOnce(&T) -> T,
) {
    let Some(instance) = instance.upgrade() else {
        return;
    };
    if instance.is_unmounted() {
        return;
    }
    let changed = cell.update(|cell| {
        let latest = cell.pending.as_ref().unwrap_or(&cell.value);
        let next = next(latest);
        if next == *latest {
            false
        } else {
            cell.pending = Some(next);
            true
        }
    });
    if changed {
        instance.schedule_render();
    } else {
        log::trace!("<{}> state unchanged, skipping render", instance.name);
    }
}

/// Setter returned by [`use_state`].
///
/// Values equal to the latest dispatched value are ignored. Equality is
/// `PartialEq`, so `f64::NAN` never equals itself and always schedules.
pub struct StateSetter<T> {
    cell: Owned<StateCell<T>>,
    instance: Weak<Instance>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            instance: self.instance.clone(),
        }
    }
}

impl<T> PartialEq for StateSetter<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cell.ptr_eq(&other.cell)
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateSetter")
    }
}

impl<T: PartialEq + 'static> StateSetter<T> {
    pub fn set(&self, value: T) {
        dispatch(&self.cell, &self.instance, move |_| value);
    }

    /// Functional update against the latest dispatched value, so several
    /// updates in one turn compose in call order.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        dispatch(&self.cell, &self.instance, f);
    }
}

pub fn use_state<T>(init: impl FnOnce() -> T) -> (T, StateSetter<T>)
where
    T: Clone + PartialEq + 'static,
{
    with_current_instance(|instance| {
        let cell = instance.claim_hook(HookKind::State, || StateCell {
            value: init(),
            pending: None,
        });
        let value = cell.update(|cell| cell.current().clone());
        (
            value,
            StateSetter {
                cell,
                instance: Rc::downgrade(instance),
            },
        )
    })
}

/// Dispatcher returned by [`use_reducer`].
pub struct Dispatch<S, A> {
    cell: Owned<StateCell<S>>,
    reducer: Rc<dyn Fn(&S, A) -> S>,
    instance: Weak<Instance>,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            reducer: self.reducer.clone(),
            instance: self.instance.clone(),
        }
    }
}

impl<S, A> PartialEq for Dispatch<S, A> {
    fn eq(&self, other: &Self) -> bool {
        self.cell.ptr_eq(&other.cell)
    }
}

impl<S: PartialEq + 'static, A> Dispatch<S, A> {
    pub fn dispatch(&self, action: A) {
        let reducer = self.reducer.clone();
        dispatch(&self.cell, &self.instance, move |state| reducer(state, action));
    }
}

pub fn use_reducer<S, A>(
    reducer: impl Fn(&S, A) -> S + 'static,
    init: impl FnOnce() -> S,
) -> (S, Dispatch<S, A>)
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    with_current_instance(|instance| {
        let cell = instance.claim_hook(HookKind::State, || StateCell {
            value: init(),
            pending: None,
        });
        let value = cell.update(|cell| cell.current().clone());
        (
            value,
            Dispatch {
                cell,
                reducer: Rc::new(reducer),
                instance: Rc::downgrade(instance),
            },
        )
    })
}

struct MemoCell<T, D> {
    deps: Option<D>,
    value: Option<T>,
}

/// Recomputes only when `deps` differ from the previous render's. `None`
/// recomputes every render; `Some(())` computes once.
pub fn use_memo<T, D>(deps: Option<D>, compute: impl FnOnce() -> T) -> T
where
    T: Clone + 'static,
    D: PartialEq + 'static,
{
    with_current_instance(|instance| {
        let cell = instance.claim_hook(HookKind::Memo, || MemoCell::<T, D> {
            deps: None,
            value: None,
        });
        let cached = cell.with(|memo| match (&memo.deps, &deps) {
            (Some(previous), Some(next)) if previous == next => memo.value.clone(),
            _ => None,
        });
        if let Some(value) = cached {
            return value;
        }
        let value = compute();
        cell.update(|memo| {
            memo.deps = deps;
            memo.value = Some(value.clone());
        });
        value
    })
}

/// Keeps the first `callback` until `deps` change.
pub fn use_callback<F, D>(deps: Option<D>, callback: F) -> F
where
    F: Clone + 'static,
    D: PartialEq + 'static,
{
    use_memo(deps, move || callback)
}

/// A mutable cell that lives as long as the instance; writing to it never
/// schedules a render.
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> Owned<T> {
    with_current_instance(|instance| instance.claim_hook(HookKind::Ref, init))
}

fn register_effect<D, F, C>(phase: EffectPhase, deps: Option<D>, effect: F)
where
    D: PartialEq + 'static,
    F: FnOnce() -> C + 'static,
    C: IntoCleanup,
{
    with_current_instance(|instance| {
        let kind = match phase {
            EffectPhase::Layout => HookKind::LayoutEffect,
            EffectPhase::Passive => HookKind::Effect,
        };
        let cell = instance.claim_hook(kind, EffectCell::default);
        if cell.with(|effect| effect.deps_changed(deps.as_ref())) {
            cell.update(|cell| cell.schedule(deps, Box::new(move || effect().into_cleanup())));
            instance.enqueue_effect(phase, cell);
        }
    })
}

/// Runs `effect` after the commit that produced this render, once the effect
/// queue is flushed. The closure `effect` returns becomes its cleanup, run
/// before the next run of this effect and on unmount.
pub fn use_effect<D, F, C>(deps: Option<D>, effect: F)
where
    D: PartialEq + 'static,
    F: FnOnce() -> C + 'static,
    C: IntoCleanup,
{
    register_effect(EffectPhase::Passive, deps, effect)
}

/// Like [`use_effect`], but runs synchronously during commit.
pub fn use_layout_effect<D, F, C>(deps: Option<D>, effect: F)
where
    D: PartialEq + 'static,
    F: FnOnce() -> C + 'static,
    C: IntoCleanup,
{
    register_effect(EffectPhase::Layout, deps, effect)
}

/// Clears the error held by [`use_error_boundary`].
#[derive(Clone, PartialEq)]
pub struct ErrorReset(StateSetter<Option<CapturedError>>);

impl ErrorReset {
    pub fn reset(&self) {
        self.0.set(None);
    }
}

/// Makes the calling component an error boundary. Errors thrown below it are
/// stored and the component re-renders with `Some(error)`.
pub fn use_error_boundary() -> (Option<CapturedError>, ErrorReset) {
    let (error, set_error) = use_state(|| None::<CapturedError>);
    with_current_instance(|instance| {
        if let InstanceBody::Function { hooks, .. } = &instance.body {
            let setter = set_error.clone();
            hooks.borrow_mut().catch_handler = Some(Rc::new(move |error: &CapturedError, _info: &ErrorInfo| {
                setter.set(Some(error.clone()));
            }));
        }
    });
    (error, ErrorReset(set_error))
}
