mod common;

use std::cell::{Cell, RefCell};

use arbor_core::{use_effect, use_state, Element, Props, RenderResult, StateSetter};
use arbor_testing::run_test_root;
use common::{record, take_records};

thread_local! {
    static RENDERS: Cell<usize> = const { Cell::new(0) };
    static SETTER: RefCell<Option<StateSetter<f64>>> = const { RefCell::new(None) };
}

fn renders() -> usize {
    RENDERS.with(Cell::get)
}

fn counter(_props: &Props) -> RenderResult {
    RENDERS.with(|renders| renders.set(renders.get() + 1));
    let (count, set_count) = use_state(|| 0);
    use_effect(Some(count), move || {
        record(format!("effect {count}"));
        move || record(format!("cleanup {count}"))
    });
    Ok(Element::host("button")
        .prop("id", "increment")
        .on("click", move |_| {
            set_count.update(|count| count + 1);
            set_count.update(|count| count + 1);
        })
        .child(count))
}

#[test]
fn batched_updates_run_one_cleanup_and_one_effect() {
    run_test_root(|rule| {
        take_records();
        rule.set_content(Element::function("Counter", counter))
            .expect("mount");
        rule.pump_until_idle().expect("flush");
        assert_eq!(take_records(), vec!["effect 0"]);
        let before = renders();

        let clicked = rule.act(|rule| rule.click("increment")).expect("act");
        assert_eq!(clicked, Ok(true));

        assert_eq!(renders(), before + 1, "both updates land in one render");
        assert_eq!(take_records(), vec!["cleanup 0", "effect 2"]);
        assert_eq!(rule.html(), r#"<button id="increment">2</button>"#);
    });
}

fn measurement(_props: &Props) -> RenderResult {
    RENDERS.with(|renders| renders.set(renders.get() + 1));
    let (value, set_value) = use_state(|| 1.5);
    SETTER.with(|slot| *slot.borrow_mut() = Some(set_value));
    Ok(Element::text(value.to_string()))
}

fn setter() -> StateSetter<f64> {
    SETTER
        .with(|slot| slot.borrow().clone())
        .expect("setter captured during render")
}

#[test]
fn identical_values_do_not_render() {
    run_test_root(|rule| {
        rule.set_content(Element::function("Measurement", measurement))
            .expect("mount");
        let before = renders();

        rule.act(|_| setter().set(1.5)).expect("act");
        assert_eq!(renders(), before);
        assert!(!rule.root().has_pending_work());
    });
}

#[test]
fn nan_never_equals_itself() {
    run_test_root(|rule| {
        rule.set_content(Element::function("Measurement", measurement))
            .expect("mount");
        let before = renders();

        rule.act(|_| setter().set(f64::NAN)).expect("first NaN");
        assert_eq!(renders(), before + 1);
        assert_eq!(rule.html(), "NaN");

        rule.act(|_| setter().set(f64::NAN)).expect("second NaN");
        assert_eq!(renders(), before + 2, "a second NaN still renders");

        rule.act(|_| setter().set(2.0)).expect("number again");
        assert_eq!(rule.html(), "2");
    });
}
