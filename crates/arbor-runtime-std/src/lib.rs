//! Standard scheduling services backed by Rust's `std` library.
//!
//! [`StdScheduler`] records render and effect requests in atomics and can wake
//! an event loop on another thread. [`StdHost`] pairs it with a [`Root`] so the
//! loop only has to call [`StdHost::poll`] after a wake-up.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use arbor_core::{Applier, Element, Error, HostId, Root, RootConfig, RuntimeScheduler};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that remembers requests until they are taken.
pub struct StdScheduler {
    render_requested: AtomicBool,
    effects_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            render_requested: AtomicBool::new(false),
            effects_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a render has been requested since the last call.
    pub fn take_render_request(&self) -> bool {
        self.render_requested.swap(false, Ordering::SeqCst)
    }

    /// Returns whether an effect flush has been requested since the last call.
    pub fn take_effects_request(&self) -> bool {
        self.effects_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever new work is requested.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("render_requested", &self.render_requested.load(Ordering::SeqCst))
            .field("effects_requested", &self.effects_requested.load(Ordering::SeqCst))
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_render(&self) {
        self.render_requested.store(true, Ordering::SeqCst);
        self.wake();
    }

    fn schedule_effects(&self) {
        self.effects_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// A [`Root`] driven by a [`StdScheduler`].
pub struct StdHost<A: Applier> {
    scheduler: Arc<StdScheduler>,
    root: Root<A>,
}

impl<A: Applier> StdHost<A> {
    /// Host configured from the environment (see [`RootConfig::from_env`]).
    pub fn new(applier: A, container: HostId) -> Self {
        Self::with_config(applier, container, RootConfig::from_env())
    }

    /// Uses `config` with its scheduler replaced by a fresh [`StdScheduler`].
    pub fn with_config(applier: A, container: HostId, config: RootConfig) -> Self {
        let scheduler = Arc::new(StdScheduler::new());
        let root = Root::with_config(applier, container, config.with_scheduler(scheduler.clone()));
        Self { scheduler, root }
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn root(&self) -> &Root<A> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Root<A> {
        &mut self.root
    }

    pub fn render(&mut self, element: &Element) -> Result<(), Error> {
        self.root.render(element)
    }

    /// Runs requested work until the root is idle. Returns whether anything
    /// had been requested.
    pub fn poll(&mut self) -> Result<bool, Error> {
        let renders = self.scheduler.take_render_request();
        let effects = self.scheduler.take_effects_request();
        if !renders && !effects && !self.root.has_pending_work() {
            return Ok(false);
        }
        log::trace!("polling root (renders: {renders}, effects: {effects})");
        let result = self.root.flush();
        // Everything requested while flushing has been handled by it.
        self.scheduler.take_render_request();
        self.scheduler.take_effects_request();
        result.map(|()| true)
    }
}

impl<A: Applier> fmt::Debug for StdHost<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdHost")
            .field("scheduler", &self.scheduler)
            .field("pending_work", &self.root.has_pending_work())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use arbor_core::{
        use_effect, use_state, Element, MemoryApplier, Props, RenderResult, StateSetter, ONCE,
    };

    use super::{StdHost, StdScheduler};
    use arbor_core::RuntimeScheduler;

    thread_local! {
        static SETTER: RefCell<Option<StateSetter<i32>>> = const { RefCell::new(None) };
        static EFFECT_RUNS: RefCell<usize> = const { RefCell::new(0) };
    }

    fn counter(_props: &Props) -> RenderResult {
        let (count, set_count) = use_state(|| 0);
        SETTER.with(|slot| *slot.borrow_mut() = Some(set_count));
        use_effect(ONCE, || EFFECT_RUNS.with(|runs| *runs.borrow_mut() += 1));
        Ok(Element::text(count.to_string()))
    }

    fn host() -> StdHost<MemoryApplier> {
        let mut applier = MemoryApplier::new();
        let container = applier.create_container();
        StdHost::new(applier, container)
    }

    #[test]
    fn scheduler_requests_are_taken_once() {
        let scheduler = StdScheduler::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = wakes.clone();
        scheduler.set_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.schedule_render();
        scheduler.schedule_effects();
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
        assert!(scheduler.take_render_request());
        assert!(!scheduler.take_render_request());
        assert!(scheduler.take_effects_request());

        scheduler.clear_waker();
        scheduler.schedule_render();
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn mount_requests_an_effect_flush() {
        let mut host = host();
        host.render(&Element::function("Counter", counter))
            .expect("initial render");

        assert_eq!(EFFECT_RUNS.with(|runs| *runs.borrow()), 0);
        assert!(host.poll().expect("poll"));
        assert_eq!(EFFECT_RUNS.with(|runs| *runs.borrow()), 1);
        assert!(!host.poll().expect("idle poll"));
    }

    #[test]
    fn state_change_requests_a_render() {
        let mut host = host();
        host.render(&Element::function("Counter", counter))
            .expect("initial render");
        host.poll().expect("flush mount effects");

        let setter = SETTER.with(|slot| slot.borrow().clone()).expect("setter");
        setter.set(4);
        assert!(
            host.scheduler().take_render_request(),
            "set should request a render"
        );

        assert!(host.poll().expect("poll"), "pending work is still found");
        let root = host.root();
        assert_eq!(root.applier().serialize(root.container()), "4");
    }
}
