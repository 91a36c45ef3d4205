#![doc = r"Virtual-tree reconciliation core: element diffing, component instances, hooks, effects and error boundaries."]

extern crate self as arbor_core;

pub mod applier;
pub mod collections;
pub mod hash;
pub mod owned;
pub mod platform;

mod component;
mod diff;
mod effects;
mod element;
mod error;
mod hooks;
mod instance;
mod options;
mod propagate;
mod root;
mod runtime;
mod vnode;

pub use applier::{Applier, HostError, HostId, HostKind, HostOp, MemoryApplier, MemoryNode};
pub use component::{Component, Context, Updater};
pub use effects::{Cleanup, CleanupOutput, IntoCleanup, EVERY_RENDER, ONCE};
pub use element::{
    h, normalize_children, Child, ClassType, ComponentType, Element, ElementKind, Event,
    FunctionRender, Listener, PropValue, Props, RenderResult,
};
pub use error::{CapturedError, Error, ErrorInfo};
pub use hash::{key_of, Key};
pub use hooks::{
    use_callback, use_effect, use_error_boundary, use_layout_effect, use_memo, use_reducer,
    use_ref, use_state, Dispatch, ErrorReset, StateSetter,
};
pub use options::{DiagnosticHooks, RootConfig};
pub use owned::Owned;
pub use platform::{DefaultScheduler, RuntimeScheduler};
pub use root::Root;
pub use runtime::{Runtime, RuntimeHandle};

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod hooks_tests;

#[cfg(test)]
#[path = "tests/class_tests.rs"]
mod class_tests;

#[cfg(test)]
#[path = "tests/boundary_tests.rs"]
mod boundary_tests;

/// Routes `log` output of unit tests through the test harness.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
