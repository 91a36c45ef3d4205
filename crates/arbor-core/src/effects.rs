//! Effect cells and cleanup conversion.
//!
//! Effects registered during a render are parked on their cell as a pending
//! body. After commit, cleanups of every cell with a pending body run across
//! the whole batch first, then the bodies run.

use std::any::Any;

pub type Cleanup = Box<dyn FnOnce() -> anyhow::Result<()>>;

pub(crate) type EffectBody = Box<dyn FnOnce() -> anyhow::Result<Option<Cleanup>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EffectPhase {
    /// Runs synchronously during commit, before the passive flush.
    Layout,
    /// Runs when the effect queue is flushed.
    Passive,
}

/// Dependencies that change on every render.
pub const EVERY_RENDER: Option<()> = None;

/// Dependencies that never change: the effect runs once after mount.
pub const ONCE: Option<()> = Some(());

#[derive(Default)]
pub(crate) struct EffectCell {
    deps: Option<Box<dyn Any>>,
    pub(crate) pending: Option<EffectBody>,
    pub(crate) cleanup: Option<Cleanup>,
}

impl EffectCell {
    pub(crate) fn deps_changed<D: PartialEq + 'static>(&self, next: Option<&D>) -> bool {
        let previous = self.deps.as_ref().and_then(|deps| deps.downcast_ref::<D>());
        match (previous, next) {
            (Some(previous), Some(next)) => previous != next,
            _ => true,
        }
    }

    pub(crate) fn schedule<D: 'static>(&mut self, deps: Option<D>, body: EffectBody) {
        self.deps = deps.map(|deps| Box::new(deps) as Box<dyn Any>);
        self.pending = Some(body);
    }
}

/// Value an effect body returns. `()` means no cleanup; a closure is the
/// cleanup; `Err` reports a failed effect.
pub trait IntoCleanup {
    fn into_cleanup(self) -> anyhow::Result<Option<Cleanup>>;
}

/// Value a cleanup closure returns.
pub trait CleanupOutput {
    fn into_result(self) -> anyhow::Result<()>;
}

impl CleanupOutput for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl CleanupOutput for anyhow::Result<()> {
    fn into_result(self) -> anyhow::Result<()> {
        self
    }
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> anyhow::Result<Option<Cleanup>> {
        Ok(None)
    }
}

impl<F, R> IntoCleanup for F
where
    F: FnOnce() -> R + 'static,
    R: CleanupOutput,
{
    fn into_cleanup(self) -> anyhow::Result<Option<Cleanup>> {
        Ok(Some(Box::new(move || self().into_result())))
    }
}

impl<T: IntoCleanup> IntoCleanup for anyhow::Result<T> {
    fn into_cleanup(self) -> anyhow::Result<Option<Cleanup>> {
        self?.into_cleanup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn absent_dependencies_always_change() {
        let mut cell = EffectCell::default();
        assert!(cell.deps_changed::<()>(None));
        cell.schedule(Some((1, "a")), Box::new(|| Ok(None)));
        assert!(!cell.deps_changed(Some(&(1, "a"))));
        assert!(cell.deps_changed(Some(&(2, "a"))));
        assert!(cell.deps_changed::<(i32, &str)>(None));
    }

    #[test]
    fn nan_dependencies_never_match() {
        let mut cell = EffectCell::default();
        cell.schedule(Some(f64::NAN), Box::new(|| Ok(None)));
        assert!(cell.deps_changed(Some(&f64::NAN)));
    }

    #[test]
    fn closures_become_cleanups() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let cleanup = (move || flag.set(true)).into_cleanup().unwrap();
        cleanup.expect("closure is a cleanup")().unwrap();
        assert!(ran.get());

        assert!(().into_cleanup().unwrap().is_none());
        let failed: anyhow::Result<()> = Err(anyhow::anyhow!("boom"));
        assert!(failed.into_cleanup().is_err());
    }
}
