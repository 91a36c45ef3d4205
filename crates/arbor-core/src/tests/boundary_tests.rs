use crate::*;
use std::cell::{Cell, RefCell};

thread_local! {
    static THROWING: Cell<bool> = const { Cell::new(true) };
    static CAUGHT: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static RESET: RefCell<Option<ErrorReset>> = const { RefCell::new(None) };
}

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct Boom;

fn memory_root() -> Root<MemoryApplier> {
    crate::init_test_logging();
    let mut applier = MemoryApplier::new();
    let container = applier.create_container();
    Root::new(applier, container)
}

fn markup(root: &Root<MemoryApplier>) -> String {
    root.applier().serialize(root.container())
}

fn thrower(_props: &Props) -> RenderResult {
    if THROWING.with(Cell::get) {
        return Err(Boom.into());
    }
    Ok(Element::text("fine"))
}

fn children_of(props: &Props) -> Element {
    Element::fragment(props.children().iter().cloned())
}

struct Boundary;

impl Component for Boundary {
    const NAME: &'static str = "Boundary";
    type State = Option<String>;

    fn create(_props: &Props) -> Self {
        Boundary
    }

    fn initial_state(&self, _props: &Props) -> Option<String> {
        None
    }

    fn render(&self, ctx: &Context<'_, Self>) -> RenderResult {
        match ctx.state() {
            Some(message) => Ok(Element::text(format!("caught: {message}"))),
            None => Ok(children_of(ctx.props())),
        }
    }

    fn get_derived_state_from_error(error: &CapturedError) -> anyhow::Result<Option<Self::State>> {
        Ok(Some(Some(error.to_string())))
    }

    fn component_did_catch(
        &mut self,
        _ctx: &Context<'_, Self>,
        error: &CapturedError,
        info: &ErrorInfo,
    ) -> anyhow::Result<()> {
        CAUGHT.with(|caught| {
            caught
                .borrow_mut()
                .push(format!("{error} in {}", info.component_stack.join(" < ")))
        });
        Ok(())
    }
}

/// Notices errors but cannot recover from them.
struct Fragile;

impl Component for Fragile {
    const NAME: &'static str = "Fragile";
    type State = ();

    fn create(_props: &Props) -> Self {
        Fragile
    }

    fn initial_state(&self, _props: &Props) {}

    fn render(&self, ctx: &Context<'_, Self>) -> RenderResult {
        Ok(children_of(ctx.props()))
    }

    fn component_did_catch(
        &mut self,
        _ctx: &Context<'_, Self>,
        _error: &CapturedError,
        _info: &ErrorInfo,
    ) -> anyhow::Result<()> {
        anyhow::bail!("fragile boundary failed")
    }
}

#[test]
fn nearest_boundary_renders_fallback() {
    THROWING.with(|throwing| throwing.set(true));
    let mut root = memory_root();
    let tree = Element::class::<Boundary>()
        .child(Element::host("div").child(Element::function("Thrower", thrower)));

    root.render(&tree).expect("error is handled");

    assert_eq!(markup(&root), "caught: boom");
    let caught = CAUGHT.with(|caught| caught.borrow().clone());
    assert_eq!(caught, vec!["boom in Thrower < Boundary"]);
}

#[test]
fn boundary_without_errors_is_transparent() {
    THROWING.with(|throwing| throwing.set(false));
    let mut root = memory_root();
    root.render(&Element::class::<Boundary>().child(Element::function("Thrower", thrower)))
        .expect("render");
    assert_eq!(markup(&root), "fine");
}

#[test]
fn failing_recovery_passes_the_new_error_outward() {
    THROWING.with(|throwing| throwing.set(true));
    let mut root = memory_root();
    let tree = Element::class::<Boundary>().child(
        Element::class::<Fragile>().child(Element::function("Thrower", thrower)),
    );

    root.render(&tree).expect("outer boundary handles it");

    assert_eq!(markup(&root), "caught: fragile boundary failed");
}

#[test]
fn uncaught_error_reaches_the_caller_unchanged() {
    THROWING.with(|throwing| throwing.set(false));
    let mut root = memory_root();
    let tree = || Element::host("main").child(Element::function("Thrower", thrower));
    root.render(&tree()).expect("first render");

    THROWING.with(|throwing| throwing.set(true));
    let error = root.render(&tree()).expect_err("nothing catches");

    let captured = error.captured().expect("component error");
    assert!(captured.downcast_ref::<Boom>().is_some());
    assert_eq!(markup(&root), "<main>fine</main>");
}

fn guarded(props: &Props) -> RenderResult {
    let (error, reset) = use_error_boundary();
    RESET.with(|slot| *slot.borrow_mut() = Some(reset));
    match error {
        Some(error) => Ok(Element::text(format!("fallback: {error}"))),
        None => Ok(children_of(props)),
    }
}

#[test]
fn function_boundary_recovers_after_reset() {
    THROWING.with(|throwing| throwing.set(true));
    let mut root = memory_root();
    root.render(&Element::function("Guarded", guarded).child(Element::function("Thrower", thrower)))
        .expect("error is handled");
    assert_eq!(markup(&root), "fallback: boom");

    THROWING.with(|throwing| throwing.set(false));
    RESET.with(|slot| slot.borrow().clone()).expect("reset handle").reset();
    root.flush().expect("flush");
    assert_eq!(markup(&root), "fine");
}

#[test]
fn fallback_that_throws_escalates() {
    fn broken_fallback(props: &Props) -> RenderResult {
        let (error, _reset) = use_error_boundary();
        if error.is_some() {
            anyhow::bail!("fallback failed");
        }
        Ok(children_of(props))
    }

    THROWING.with(|throwing| throwing.set(true));
    let mut root = memory_root();
    let tree = Element::class::<Boundary>().child(
        Element::function("BrokenFallback", broken_fallback)
            .child(Element::function("Thrower", thrower)),
    );

    root.render(&tree).expect("outer boundary handles it");
    assert_eq!(markup(&root), "caught: fallback failed");
}

fn failing_effect(_props: &Props) -> RenderResult {
    use_effect(ONCE, || -> anyhow::Result<()> { anyhow::bail!("effect failed") });
    Ok(Element::text("effectful"))
}

#[test]
fn effect_errors_reach_the_boundary() {
    let mut root = memory_root();
    root.render(&Element::class::<Boundary>().child(Element::function("Effectful", failing_effect)))
        .expect("render");
    assert_eq!(markup(&root), "effectful");

    root.flush().expect("boundary handles the effect error");
    assert_eq!(markup(&root), "caught: effect failed");
}

#[test]
fn uncaught_effect_error_is_reported_after_the_batch() {
    let mut root = memory_root();
    root.render(&Element::fragment([
        Element::function("Effectful", failing_effect),
        Element::function("Effectful", failing_effect),
    ]))
    .expect("render");

    let error = root.flush_effects().expect_err("no boundary");
    assert_eq!(error.to_string(), "uncaught error: effect failed");
    assert!(!root.runtime().has_pending_effects());
}

/// Logs both recovery callbacks into `CAUGHT`.
struct Ordered;

impl Component for Ordered {
    const NAME: &'static str = "Ordered";
    type State = bool;

    fn create(_props: &Props) -> Self {
        Ordered
    }

    fn initial_state(&self, _props: &Props) -> bool {
        false
    }

    fn render(&self, ctx: &Context<'_, Self>) -> RenderResult {
        if *ctx.state() {
            Ok(Element::text("recovered"))
        } else {
            Ok(children_of(ctx.props()))
        }
    }

    fn get_derived_state_from_error(error: &CapturedError) -> anyhow::Result<Option<bool>> {
        CAUGHT.with(|caught| caught.borrow_mut().push(format!("derive {error}")));
        Ok(Some(true))
    }

    fn component_did_catch(
        &mut self,
        _ctx: &Context<'_, Self>,
        error: &CapturedError,
        _info: &ErrorInfo,
    ) -> anyhow::Result<()> {
        CAUGHT.with(|caught| caught.borrow_mut().push(format!("did_catch {error}")));
        Ok(())
    }
}

#[test]
fn derived_state_runs_before_did_catch() {
    THROWING.with(|throwing| throwing.set(true));
    CAUGHT.with(|caught| caught.borrow_mut().clear());
    let mut root = memory_root();
    root.render(&Element::class::<Ordered>().child(Element::function("Thrower", thrower)))
        .expect("error is handled");

    let caught = CAUGHT.with(|caught| caught.borrow().clone());
    assert_eq!(caught, vec!["derive boom", "did_catch boom"]);
    assert_eq!(markup(&root), "recovered");
}
