//! Headless harness for exercising arbor trees in tests.
//!
//! [`TestRule`] owns a [`Root`] over a [`MemoryApplier`] and offers helpers to
//! deliver events, drive queued work until idle and inspect the host tree as
//! markup, without any real host behind it.

use arbor_core::{
    Element, Error, Event, HostError, HostId, MemoryApplier, Root, RootConfig,
};

/// In-memory root with helpers for driving and inspecting it.
pub struct TestRule {
    root: Root<MemoryApplier>,
    content: Option<Element>,
}

impl TestRule {
    /// Create a rule with default configuration.
    pub fn new() -> Self {
        Self::with_config(RootConfig::default())
    }

    pub fn with_config(config: RootConfig) -> Self {
        init_logging();
        let mut applier = MemoryApplier::new();
        let container = applier.create_container();
        Self {
            root: Root::with_config(applier, container, config),
            content: None,
        }
    }

    /// Install `content` and render it. Work the commit queued stays pending
    /// until [`TestRule::pump_until_idle`].
    pub fn set_content(&mut self, content: Element) -> Result<(), Error> {
        self.content = Some(content.clone());
        self.root.render(&content)
    }

    /// Render the installed content again from the top, as a parent
    /// re-rendering with new elements would.
    pub fn rerender_content(&mut self) -> Result<(), Error> {
        let Some(content) = self.content.clone() else {
            return Ok(());
        };
        let props = content.props().clone();
        self.root.render(&content.props_with(props))
    }

    /// Flush effects and queued renders until nothing is pending.
    pub fn pump_until_idle(&mut self) -> Result<(), Error> {
        self.root.flush()
    }

    /// Run `f` against the rule, then drain the work it caused.
    pub fn act<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, Error> {
        let result = f(self);
        self.pump_until_idle()?;
        Ok(result)
    }

    /// Markup of everything under the container.
    pub fn html(&self) -> String {
        self.root.applier().serialize(self.root.container())
    }

    pub fn find_by_id(&self, id: &str) -> Option<HostId> {
        self.root.applier().find_by_id(self.root.container(), id)
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<HostId> {
        self.root.applier().find_by_tag(self.root.container(), tag)
    }

    /// Deliver `event` to its target's listener. Returns whether a listener
    /// was bound.
    pub fn dispatch(&self, event: &Event) -> Result<bool, HostError> {
        self.root.applier().dispatch(event)
    }

    /// Deliver a click to the element whose `id` property is `id`.
    pub fn click(&self, id: &str) -> Result<bool, HostError> {
        match self.find_by_id(id) {
            Some(target) => self.dispatch(&Event::new("click", target)),
            None => {
                log::warn!("no element with id {id:?} to click");
                Ok(false)
            }
        }
    }

    pub fn root(&mut self) -> &mut Root<MemoryApplier> {
        &mut self.root
    }

    pub fn applier(&self) -> &MemoryApplier {
        self.root.applier()
    }

    pub fn applier_mut(&mut self) -> &mut MemoryApplier {
        self.root.applier_mut()
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }
}

impl Default for TestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// [`TestRule`].
pub fn run_test_root<R>(f: impl FnOnce(&mut TestRule) -> R) -> R {
    let mut rule = TestRule::new();
    f(&mut rule)
}

/// Route `log` output through the test harness. Honors `RUST_LOG`; safe to
/// call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
