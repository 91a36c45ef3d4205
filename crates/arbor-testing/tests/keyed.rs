mod common;

use arbor_core::{use_effect, Element, HostId, HostOp, Props, RenderResult};
use arbor_testing::{run_test_root, TestRule};
use common::{record, take_records};

fn item(props: &Props) -> RenderResult {
    let label = props.str("label").unwrap_or_default().to_owned();
    let tracked = label.clone();
    use_effect(Some(label.clone()), move || {
        record(format!("mount {tracked}"));
        move || record(format!("unmount {tracked}"))
    });
    Ok(Element::host("li")
        .prop("id", format!("item-{label}"))
        .child(label))
}

fn list(labels: &[&str]) -> Element {
    Element::host("ul").children(labels.iter().map(|label| {
        Element::function("Item", item)
            .key(*label)
            .prop("label", *label)
    }))
}

fn ids(rule: &TestRule, labels: &[&str]) -> Vec<HostId> {
    labels
        .iter()
        .map(|label| rule.find_by_id(&format!("item-{label}")).expect("item rendered"))
        .collect()
}

#[test]
fn reordering_keyed_children_moves_host_nodes() {
    run_test_root(|rule| {
        take_records();
        rule.set_content(list(&["a", "b", "c", "d"])).expect("mount");
        rule.pump_until_idle().expect("flush");
        assert_eq!(take_records(), vec!["mount a", "mount b", "mount c", "mount d"]);
        let before = ids(rule, &["a", "b", "c", "d"]);
        rule.applier_mut().take_ops();

        rule.set_content(list(&["d", "b", "a", "c"])).expect("reorder");
        rule.pump_until_idle().expect("flush");

        assert!(take_records().is_empty(), "persisting keys never remount");
        assert_eq!(ids(rule, &["a", "b", "c", "d"]), before);
        assert_eq!(
            rule.html(),
            concat!(
                r#"<ul><li id="item-d">d</li><li id="item-b">b</li>"#,
                r#"<li id="item-a">a</li><li id="item-c">c</li></ul>"#
            )
        );
        let ops = rule.applier_mut().take_ops();
        assert!(ops.iter().all(|op| matches!(op, HostOp::Move { .. })), "{ops:?}");
        assert!(!ops.is_empty());
    });
}

#[test]
fn removed_and_added_keys_unmount_and_mount() {
    run_test_root(|rule| {
        rule.set_content(list(&["a", "b", "c"])).expect("mount");
        rule.pump_until_idle().expect("flush");
        take_records();

        rule.set_content(list(&["c", "e", "a"])).expect("update");
        rule.pump_until_idle().expect("flush");

        assert_eq!(take_records(), vec!["unmount b", "mount e"]);
        assert_eq!(
            rule.html(),
            concat!(
                r#"<ul><li id="item-c">c</li><li id="item-e">e</li>"#,
                r#"<li id="item-a">a</li></ul>"#
            )
        );
    });
}

#[test]
fn duplicate_keys_keep_the_first_match() {
    run_test_root(|rule| {
        rule.set_content(list(&["a", "b"])).expect("mount");
        rule.pump_until_idle().expect("flush");
        let first_a = rule.find_by_id("item-a").expect("a");
        take_records();

        rule.set_content(list(&["a", "a", "b"])).expect("duplicate");
        rule.pump_until_idle().expect("flush");

        assert_eq!(rule.find_by_id("item-a"), Some(first_a));
        assert_eq!(take_records(), vec!["mount a"], "the second 'a' mounts fresh");
    });
}
