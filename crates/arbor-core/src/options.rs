//! Root configuration and diagnostic hook points.

use std::rc::Rc;
use std::sync::Arc;

use crate::element::Element;
use crate::error::{CapturedError, ErrorInfo};
use crate::platform::{DefaultScheduler, RuntimeScheduler};

/// Optional observers for external tooling. Absent hooks cost nothing and
/// none of them can alter the outcome of a pass.
#[derive(Clone, Default)]
pub struct DiagnosticHooks {
    /// Before an element is diffed against its previous record.
    pub diff: Option<Rc<dyn Fn(&Element)>>,
    /// Before a component renders, with its name.
    pub render: Option<Rc<dyn Fn(&'static str)>>,
    /// After a commit, with the number of components it committed.
    pub commit: Option<Rc<dyn Fn(usize)>>,
    /// When a thrown error starts propagating.
    pub error_caught: Option<Rc<dyn Fn(&CapturedError, &ErrorInfo)>>,
    /// When a rendered element is torn down.
    pub unmount: Option<Rc<dyn Fn(&Element)>>,
}

impl DiagnosticHooks {
    /// Hooks that report every notification through `log`.
    pub fn logging() -> Self {
        Self {
            diff: Some(Rc::new(|element: &Element| log::debug!("diff {:?}", element.kind()))),
            render: Some(Rc::new(|name: &'static str| log::debug!("render <{name}>"))),
            commit: Some(Rc::new(|count: usize| log::debug!("commit of {count} component(s)"))),
            error_caught: Some(Rc::new(|error: &CapturedError, info: &ErrorInfo| {
                log::debug!("caught {error}\n{info}")
            })),
            unmount: Some(Rc::new(|element: &Element| {
                log::debug!("unmount {:?}", element.kind())
            })),
        }
    }

    pub(crate) fn before_diff(&self, element: &Element) {
        if let Some(hook) = &self.diff {
            hook(element);
        }
    }

    pub(crate) fn before_render(&self, name: &'static str) {
        if let Some(hook) = &self.render {
            hook(name);
        }
    }

    pub(crate) fn after_commit(&self, committed: usize) {
        if let Some(hook) = &self.commit {
            hook(committed);
        }
    }

    pub(crate) fn caught(&self, error: &CapturedError, info: &ErrorInfo) {
        if let Some(hook) = &self.error_caught {
            hook(error, info);
        }
    }

    pub(crate) fn unmounting(&self, element: &Element) {
        if let Some(hook) = &self.unmount {
            hook(element);
        }
    }
}

const DEFAULT_MAX_FLUSH_ROUNDS: usize = 1024;

#[derive(Clone)]
pub struct RootConfig {
    pub scheduler: Arc<dyn RuntimeScheduler>,
    pub hooks: DiagnosticHooks,
    /// Upper bound on drain rounds before a root reports
    /// [`Error::Unsettled`](crate::Error::Unsettled).
    pub max_flush_rounds: usize,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            scheduler: Arc::new(DefaultScheduler),
            hooks: DiagnosticHooks::default(),
            max_flush_rounds: DEFAULT_MAX_FLUSH_ROUNDS,
        }
    }
}

impl RootConfig {
    /// Defaults adjusted by `ARBOR_DEBUG` (installs logging hooks) and
    /// `ARBOR_MAX_FLUSH_ROUNDS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if std::env::var_os("ARBOR_DEBUG").is_some() {
            config.hooks = DiagnosticHooks::logging();
        }
        if let Ok(raw) = std::env::var("ARBOR_MAX_FLUSH_ROUNDS") {
            match raw.parse::<usize>() {
                Ok(rounds) if rounds > 0 => config.max_flush_rounds = rounds,
                _ => log::warn!("ignoring invalid ARBOR_MAX_FLUSH_ROUNDS={raw:?}"),
            }
        }
        config
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_hooks(mut self, hooks: DiagnosticHooks) -> Self {
        self.hooks = hooks;
        self
    }
}
