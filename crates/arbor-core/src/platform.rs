//! Scheduling collaborator contract.
//!
//! The core never runs deferred work by itself. When a render or an effect
//! flush becomes due it notifies the scheduler, and the host calls back into
//! [`Root::rerender`](crate::Root::rerender) or
//! [`Root::flush_effects`](crate::Root::flush_effects) when convenient.

/// Receives requests for deferred work. Implementations may be shared with
/// other threads that wake the thread driving the root.
pub trait RuntimeScheduler: Send + Sync {
    /// A component was queued for re-render.
    fn schedule_render(&self);

    /// Passive effects were queued.
    fn schedule_effects(&self);
}

/// Scheduler that ignores requests; the owner polls the root instead.
#[derive(Debug, Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_render(&self) {}

    fn schedule_effects(&self) {}
}
