use super::*;
use crate::applier::{HostOp, MemoryApplier};
use crate::element::{Props, RenderResult};
use std::cell::Cell;

thread_local! {
    static FAIL: Cell<bool> = const { Cell::new(false) };
}

fn memory_root() -> Root<MemoryApplier> {
    crate::init_test_logging();
    let mut applier = MemoryApplier::new();
    let container = applier.create_container();
    Root::new(applier, container)
}

fn markup(root: &Root<MemoryApplier>) -> String {
    root.applier().serialize(root.container())
}

fn list(keys: &[i32]) -> Element {
    Element::host("ul").children(
        keys.iter()
            .map(|key| Element::host("li").key(key).child(key.to_string())),
    )
}

fn fragile(props: &Props) -> RenderResult {
    if FAIL.with(Cell::get) {
        anyhow::bail!("fragile render failed");
    }
    Ok(Element::text(props.str("label").unwrap_or_default().to_owned()))
}

#[test]
fn renders_nested_host_tree() {
    let mut root = memory_root();
    root.render(
        &Element::host("div")
            .prop("id", "app")
            .child(Element::host("span").child("hi"))
            .child(3),
    )
    .expect("render");

    assert_eq!(markup(&root), r#"<div id="app"><span>hi</span>3</div>"#);
}

#[test]
fn prop_changes_are_minimal() {
    let mut root = memory_root();
    root.render(&Element::host("div").prop("class", "a").prop("title", "t"))
        .expect("first render");
    root.applier_mut().take_ops();

    root.render(&Element::host("div").prop("class", "b"))
        .expect("second render");

    assert_eq!(markup(&root), r#"<div class="b"></div>"#);
    let ops = root.applier_mut().take_ops();
    assert_eq!(ops.len(), 2);
    assert!(ops.iter().any(|op| matches!(op, HostOp::SetProperty { name, .. } if name == "class")));
    assert!(ops.iter().any(|op| matches!(op, HostOp::RemoveProperty { name, .. } if name == "title")));
}

#[test]
fn listeners_are_bound_and_released() {
    let mut root = memory_root();
    let clicks = std::rc::Rc::new(Cell::new(0));
    let counter = clicks.clone();
    root.render(&Element::host("button").on("click", move |_| counter.set(counter.get() + 1)))
        .expect("render");
    let button = root
        .applier()
        .find_by_tag(root.container(), "button")
        .expect("button");

    let event = crate::element::Event::new("click", button);
    assert!(root.applier().dispatch(&event).expect("dispatch"));
    assert_eq!(clicks.get(), 1);

    root.render(&Element::host("button")).expect("render without listener");
    assert!(!root.applier().dispatch(&event).expect("dispatch"));
    assert_eq!(clicks.get(), 1);
}

#[test]
fn keyed_reorder_moves_without_recreating() {
    let mut root = memory_root();
    root.render(&list(&[1, 2, 3])).expect("first render");
    root.applier_mut().take_ops();

    root.render(&list(&[3, 1, 2])).expect("reorder");

    assert_eq!(markup(&root), "<ul><li>3</li><li>1</li><li>2</li></ul>");
    let ops = root.applier_mut().take_ops();
    assert!(!ops.iter().any(|op| matches!(op, HostOp::Create(_) | HostOp::Dispose(_))));
    assert!(ops.iter().any(|op| matches!(op, HostOp::Move { .. })));
}

#[test]
fn removed_keys_are_disposed() {
    let mut root = memory_root();
    root.render(&list(&[1, 2, 3])).expect("first render");
    let before = root.applier().len();

    root.render(&list(&[1, 3])).expect("second render");

    assert_eq!(markup(&root), "<ul><li>1</li><li>3</li></ul>");
    assert_eq!(root.applier().len(), before - 2, "li and its text are gone");
}

#[test]
fn changing_element_kind_replaces_host_node() {
    let mut root = memory_root();
    root.render(&Element::host("p").child("a")).expect("first render");
    root.render(&Element::host("section").child("a"))
        .expect("second render");

    assert_eq!(markup(&root), "<section>a</section>");
    assert_eq!(root.applier().len(), 3);
}

#[test]
fn unmount_empties_the_container() {
    let mut root = memory_root();
    root.render(&list(&[1, 2])).expect("render");
    root.unmount().expect("unmount");

    assert_eq!(markup(&root), "");
    assert_eq!(root.applier().len(), 1, "only the container is left");
}

#[test]
fn hydrate_adopts_existing_nodes() {
    let mut applier = MemoryApplier::new();
    let container = applier.create_container();
    let div = applier.create_element("div").expect("div");
    let text = applier.create_text("stale").expect("text");
    let stray = applier.create_element("aside").expect("aside");
    applier.insert_before(div, text, None).expect("attach text");
    applier.insert_before(container, div, None).expect("attach div");
    applier.insert_before(container, stray, None).expect("attach aside");
    applier.take_ops();

    let mut root = Root::new(applier, container);
    root.hydrate(&Element::host("div").prop("id", "main").child("fresh"))
        .expect("hydrate");

    assert_eq!(markup(&root), r#"<div id="main">fresh</div>"#);
    assert_eq!(root.applier().children(container), vec![div]);
    assert!(root.applier().node(stray).is_none());
    let ops = root.applier_mut().take_ops();
    assert!(!ops.iter().any(|op| matches!(op, HostOp::Create(_))));
}

#[test]
fn uncaught_render_error_keeps_last_commit() {
    FAIL.with(|fail| fail.set(false));
    let mut root = memory_root();
    let view = |label: &str| {
        Element::host("div").child(Element::function("Fragile", fragile).prop("label", label.to_owned()))
    };
    root.render(&view("ok")).expect("first render");
    root.applier_mut().take_ops();

    FAIL.with(|fail| fail.set(true));
    let error = root.render(&view("next")).expect_err("render fails");
    FAIL.with(|fail| fail.set(false));

    assert_eq!(
        error.captured().map(ToString::to_string).as_deref(),
        Some("fragile render failed")
    );
    assert_eq!(markup(&root), "<div>ok</div>");
    assert!(root.applier().ops().is_empty());

    root.render(&view("recovered")).expect("render after failure");
    assert_eq!(markup(&root), "<div>recovered</div>");
}

#[test]
fn diagnostic_hooks_observe_passes() {
    let rendered = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let committed = std::rc::Rc::new(Cell::new(0));
    let (render_log, commit_count) = (rendered.clone(), committed.clone());
    let hooks = crate::options::DiagnosticHooks {
        render: Some(std::rc::Rc::new(move |name: &'static str| render_log.borrow_mut().push(name))),
        commit: Some(std::rc::Rc::new(move |count: usize| commit_count.set(commit_count.get() + count))),
        ..Default::default()
    };
    let mut applier = MemoryApplier::new();
    let container = applier.create_container();
    let mut root = Root::with_config(applier, container, RootConfig::default().with_hooks(hooks));

    root.render(&Element::function("Fragile", fragile).prop("label", "x"))
        .expect("render");

    assert_eq!(*rendered.borrow(), vec!["Fragile"]);
    assert_eq!(committed.get(), 1);
}
