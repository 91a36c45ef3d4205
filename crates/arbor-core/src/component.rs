//! Class-style components.
//!
//! A [`Component`] keeps its own state value and exposes optional lifecycle and
//! recovery callbacks. Instances are stored type-erased behind [`AnyClass`] so
//! the reconciler can drive any component type through one code path.

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Weak;

use crate::element::{Props, RenderResult};
use crate::error::{CapturedError, ErrorInfo};
use crate::instance::Instance;

pub trait Component: Sized + 'static {
    /// Name reported in component stacks and diagnostics.
    const NAME: &'static str = "Component";

    type State: Clone + 'static;

    fn create(props: &Props) -> Self;

    fn initial_state(&self, props: &Props) -> Self::State;

    fn render(&self, ctx: &Context<'_, Self>) -> RenderResult;

    /// Called before every render with the incoming props and the state about
    /// to be rendered. Returning `Some` replaces that state.
    fn get_derived_state_from_props(_props: &Props, _state: &Self::State) -> Option<Self::State> {
        None
    }

    /// Turns an error thrown below this component into fallback state.
    /// Returning `Some` makes this component the boundary for the error.
    fn get_derived_state_from_error(_error: &CapturedError) -> anyhow::Result<Option<Self::State>> {
        Ok(None)
    }

    /// Notified of an error thrown below this component. Scheduling a state
    /// update from here also makes this component the boundary.
    fn component_did_catch(
        &mut self,
        _ctx: &Context<'_, Self>,
        _error: &CapturedError,
        _info: &ErrorInfo,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn should_component_update(
        &self,
        _ctx: &Context<'_, Self>,
        _next_props: &Props,
        _next_state: &Self::State,
    ) -> bool {
        true
    }

    fn component_did_mount(&mut self, _ctx: &Context<'_, Self>) -> anyhow::Result<()> {
        Ok(())
    }

    fn component_did_update(
        &mut self,
        _ctx: &Context<'_, Self>,
        _prev_props: &Props,
        _prev_state: &Self::State,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn component_will_unmount(&mut self, _ctx: &Context<'_, Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Read access to the current props and state plus an [`Updater`].
pub struct Context<'a, C: Component> {
    props: &'a Props,
    state: &'a C::State,
    updater: Updater<C>,
}

impl<'a, C: Component> Context<'a, C> {
    fn new(props: &'a Props, state: &'a C::State, instance: &Weak<Instance>) -> Self {
        Self {
            props,
            state,
            updater: Updater::new(instance.clone()),
        }
    }

    pub fn props(&self) -> &'a Props {
        self.props
    }

    pub fn state(&self) -> &'a C::State {
        self.state
    }

    /// A handle that outlives this render, for event handlers and timers.
    pub fn updater(&self) -> Updater<C> {
        self.updater.clone()
    }

    pub fn set_state(&self, update: impl FnOnce(&mut C::State) + 'static) {
        self.updater.set_state(update)
    }
}

/// Schedules state changes on a class component instance.
///
/// Updates queue up and are applied in call order right before the next
/// render. Updates sent after the instance unmounted are dropped.
pub struct Updater<C: Component> {
    instance: Weak<Instance>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Component> Clone for Updater<C> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            _marker: PhantomData,
        }
    }
}

impl<C: Component> Updater<C> {
    pub(crate) fn new(instance: Weak<Instance>) -> Self {
        Self {
            instance,
            _marker: PhantomData,
        }
    }

    pub fn set_state(&self, update: impl FnOnce(&mut C::State) + 'static) {
        if let Some(instance) = self.instance.upgrade() {
            instance.enqueue_state_update(typed_update::<C>(update));
        }
    }

    pub fn replace_state(&self, state: C::State) {
        self.set_state(move |current| *current = state);
    }

    /// Re-renders even if `should_component_update` would refuse.
    pub fn force_update(&self) {
        if let Some(instance) = self.instance.upgrade() {
            instance.force_update();
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.instance
            .upgrade()
            .is_some_and(|instance| instance.is_mounted())
    }
}

pub(crate) type StateUpdate = Box<dyn FnOnce(&mut dyn Any)>;

fn typed_update<C: Component>(update: impl FnOnce(&mut C::State) + 'static) -> StateUpdate {
    Box::new(move |state: &mut dyn Any| {
        if let Some(state) = state.downcast_mut::<C::State>() {
            update(state);
        }
    })
}

/// Object-safe view of a class component instance.
pub(crate) trait AnyClass {
    /// Applies queued updates and derived-from-props state to the next state.
    fn prepare(&mut self, updates: Vec<StateUpdate>, next_props: &Props);
    fn should_update(&self, instance: &Weak<Instance>, next_props: &Props) -> bool;
    /// Makes the next props and state current, returning the previous ones.
    fn accept(&mut self, props: &Props) -> (Props, Box<dyn Any>);
    fn render(&self, instance: &Weak<Instance>) -> RenderResult;
    fn derive_from_error(&self, error: &CapturedError) -> anyhow::Result<Option<StateUpdate>>;
    fn did_catch(
        &mut self,
        instance: &Weak<Instance>,
        error: &CapturedError,
        info: &ErrorInfo,
    ) -> anyhow::Result<()>;
    fn did_mount(&mut self, instance: &Weak<Instance>) -> anyhow::Result<()>;
    fn did_update(
        &mut self,
        instance: &Weak<Instance>,
        prev_props: &Props,
        prev_state: &dyn Any,
    ) -> anyhow::Result<()>;
    fn will_unmount(&mut self, instance: &Weak<Instance>) -> anyhow::Result<()>;
}

struct ClassSlot<C: Component> {
    component: C,
    props: Props,
    state: C::State,
    next_state: Option<C::State>,
}

pub(crate) fn create_class<C: Component>(props: &Props) -> Box<dyn AnyClass> {
    let component = C::create(props);
    let state = component.initial_state(props);
    Box::new(ClassSlot {
        component,
        props: props.clone(),
        state,
        next_state: None,
    })
}

impl<C: Component> AnyClass for ClassSlot<C> {
    fn prepare(&mut self, updates: Vec<StateUpdate>, next_props: &Props) {
        if !updates.is_empty() {
            let mut next = self
                .next_state
                .take()
                .unwrap_or_else(|| self.state.clone());
            for update in updates {
                update(&mut next);
            }
            self.next_state = Some(next);
        }
        let base = self.next_state.as_ref().unwrap_or(&self.state);
        if let Some(derived) = C::get_derived_state_from_props(next_props, base) {
            self.next_state = Some(derived);
        }
    }

    fn should_update(&self, instance: &Weak<Instance>, next_props: &Props) -> bool {
        let next_state = self.next_state.as_ref().unwrap_or(&self.state);
        let ctx = Context::new(&self.props, &self.state, instance);
        self.component
            .should_component_update(&ctx, next_props, next_state)
    }

    fn accept(&mut self, props: &Props) -> (Props, Box<dyn Any>) {
        let prev_props = std::mem::replace(&mut self.props, props.clone());
        let prev_state = match self.next_state.take() {
            Some(next) => std::mem::replace(&mut self.state, next),
            None => self.state.clone(),
        };
        (prev_props, Box::new(prev_state))
    }

    fn render(&self, instance: &Weak<Instance>) -> RenderResult {
        let ctx = Context::new(&self.props, &self.state, instance);
        self.component.render(&ctx)
    }

    fn derive_from_error(&self, error: &CapturedError) -> anyhow::Result<Option<StateUpdate>> {
        Ok(C::get_derived_state_from_error(error)?
            .map(|state| typed_update::<C>(move |current| *current = state)))
    }

    fn did_catch(
        &mut self,
        instance: &Weak<Instance>,
        error: &CapturedError,
        info: &ErrorInfo,
    ) -> anyhow::Result<()> {
        let ctx = Context::new(&self.props, &self.state, instance);
        self.component.component_did_catch(&ctx, error, info)
    }

    fn did_mount(&mut self, instance: &Weak<Instance>) -> anyhow::Result<()> {
        let ctx = Context::new(&self.props, &self.state, instance);
        self.component.component_did_mount(&ctx)
    }

    fn did_update(
        &mut self,
        instance: &Weak<Instance>,
        prev_props: &Props,
        prev_state: &dyn Any,
    ) -> anyhow::Result<()> {
        let Some(prev_state) = prev_state.downcast_ref::<C::State>() else {
            return Ok(());
        };
        let ctx = Context::new(&self.props, &self.state, instance);
        self.component
            .component_did_update(&ctx, prev_props, prev_state)
    }

    fn will_unmount(&mut self, instance: &Weak<Instance>) -> anyhow::Result<()> {
        let ctx = Context::new(&self.props, &self.state, instance);
        self.component.component_will_unmount(&ctx)
    }
}
