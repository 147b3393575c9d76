//! Activation scopes across top-level and detached windows.

use trellis_harness::two_windows;
use trellis_runtime::PartService;

fn service() -> (PartService, trellis_harness::Names) {
    let (model, names) = two_windows();
    (PartService::new(model), names)
}

#[test]
fn each_window_keeps_its_own_active_part() {
    let (mut service, names) = service();
    service.activate(names["m1"]).expect("m1");
    service.activate(names["s1"]).expect("s1");

    assert_eq!(service.model().active_window(), Some(names["second"]));
    assert_eq!(service.active_part(), Some(names["s1"]));
    assert_eq!(service.active_part_in(names["main"]), Some(names["m1"]));
    assert_eq!(service.active_part_in(names["second"]), Some(names["s1"]));

    // Re-activating m1 only switches the selected window.
    service.activate(names["m1"]).expect("m1 again");
    assert_eq!(service.model().active_window(), Some(names["main"]));
    assert_eq!(service.active_part(), Some(names["m1"]));
    assert_eq!(service.active_part_in(names["second"]), Some(names["s1"]));
}

#[test]
fn bring_to_top_in_another_window_leaves_activation_alone() {
    let (mut service, names) = service();
    service.activate(names["m1"]).expect("m1");

    service.bring_to_top(names["s2"]).expect("s2");

    assert!(service.is_part_visible(names["s2"]));
    assert!(!service.is_part_visible(names["s1"]));
    assert_eq!(service.model().active_window(), Some(names["main"]));
    assert_eq!(service.active_part(), Some(names["m1"]));
    assert_eq!(service.active_part_in(names["second"]), None);
}

#[test]
fn parts_include_detached_windows_of_the_selected_window_only() {
    let (mut service, names) = service();
    service.activate(names["m1"]).expect("m1");
    let expected: Vec<_> = ["m1", "m2", "f1", "f2"].iter().map(|name| names[*name]).collect();
    assert_eq!(service.parts(), expected);

    service.activate(names["s2"]).expect("s2");
    assert_eq!(service.parts(), vec![names["s1"], names["s2"]]);
}

#[test]
fn detached_window_parts_belong_to_their_owner_scope() {
    let (mut service, names) = service();
    service.activate(names["s1"]).expect("s1");
    service.activate(names["f1"]).expect("f1");

    assert_eq!(service.model().active_window(), Some(names["main"]));
    assert_eq!(service.active_part_in(names["main"]), Some(names["f1"]));
    assert_eq!(service.active_part_in(names["second"]), Some(names["s1"]));
}

#[test]
fn hiding_in_a_detached_window_prefers_recent_parts() {
    let (mut service, names) = service();
    service.activate(names["m1"]).expect("m1");
    service.activate(names["f1"]).expect("f1");

    service.hide_part(names["f1"], false).expect("hide f1");

    assert_eq!(service.active_part(), Some(names["m1"]));
    assert_eq!(service.model().selected(names["float_stack"]), Some(names["f2"]));
    assert!(service.is_part_visible(names["f2"]));
}

#[test]
fn hiding_in_a_detached_window_falls_back_to_siblings() {
    let (mut service, names) = service();
    service.activate(names["f1"]).expect("f1");

    service.hide_part(names["f1"], false).expect("hide f1");

    assert_eq!(service.active_part_in(names["main"]), Some(names["f2"]));
    assert_eq!(service.active_part_in(names["second"]), None);
}
