//! Activation, bring-to-top and hide behavior on a two-stack window.

use trellis_harness::{
    PresentationCall, RecordingEventBus, RecordingListener, RecordingPresentation, two_stacks,
};
use trellis_model::ElementId;
use trellis_runtime::{ActivateOptions, PartEvent, PartEventKind, PartService, WorkbenchError};

fn service_with_a_active() -> (PartService, trellis_harness::Names) {
    let (model, names) = two_stacks();
    let mut service = PartService::new(model);
    service.activate(names["a"]).expect("activate a");
    (service, names)
}

#[test]
fn bring_to_top_in_an_unrelated_stack_keeps_the_active_part() {
    let (mut service, names) = service_with_a_active();

    service.bring_to_top(names["d"]).expect("bring d to top");
    assert_eq!(service.active_part(), Some(names["a"]));
    assert!(service.is_part_visible(names["d"]));
    assert!(!service.is_part_visible(names["c"]));

    service.bring_to_top(names["b"]).expect("bring b to top");
    assert_eq!(service.active_part(), Some(names["b"]));
    assert!(!service.is_part_visible(names["a"]));
}

#[test]
fn hiding_the_active_part_activates_its_visible_sibling() {
    let (mut service, names) = service_with_a_active();
    service.hide_part(names["a"], false).expect("hide a");
    assert_eq!(service.active_part(), Some(names["b"]));
    assert!(service.is_part_visible(names["b"]));
}

#[test]
fn hiding_the_last_part_leaves_no_active_part() {
    let (model, names) = two_stacks();
    let mut service = PartService::new(model);
    for part in ["a", "b", "c", "d"] {
        service.activate(names[part]).expect("activate");
    }
    for part in ["d", "c", "b", "a"] {
        service.hide_part(names[part], false).expect("hide");
    }
    assert_eq!(service.active_part(), None);
    assert!(
        ["a", "b", "c", "d"]
            .iter()
            .all(|part| !service.is_part_visible(names[*part]))
    );
}

#[test]
fn hide_successor_prefers_recent_parts_over_siblings() {
    let (model, names) = two_stacks();
    let mut service = PartService::new(model);
    for part in ["b", "c", "a"] {
        service.activate(names[part]).expect("activate");
    }
    // History is [a, c, b]: c is more recent than a's sibling b.
    service.hide_part(names["a"], false).expect("hide a");
    assert_eq!(service.active_part(), Some(names["c"]));
    assert!(service.is_part_visible(names["b"]));
}

#[test]
fn hide_successor_falls_back_to_former_siblings() {
    let (model, names) = two_stacks();
    let mut service = PartService::new(model);
    service.activate(names["c"]).expect("c");
    // Only c is in the history; once it is hidden, d takes over its stack.
    service.hide_part(names["c"], false).expect("hide c");
    assert_eq!(service.active_part(), Some(names["d"]));
}

#[test]
fn hide_successor_ignores_visible_parts_outside_history_and_stack() {
    let (model, names) = two_stacks();
    let mut service = PartService::new(model);
    service.activate(names["a"]).expect("a");
    service.hide_part(names["b"], true).expect("remove b");
    // c is on screen in the other stack but was never active.
    assert!(service.is_part_visible(names["c"]));
    service.hide_part(names["a"], false).expect("hide a");
    assert_eq!(service.active_part(), None);
}

#[test]
fn activation_notifies_in_order() {
    let (model, names) = two_stacks();
    let (listener, log) = RecordingListener::new();
    let (bus, bus_log) = RecordingEventBus::new();
    let mut service = PartService::new(model).with_event_bus(bus);
    let _ = service.add_part_listener(Box::new(listener));
    service.activate(names["a"]).expect("a");
    let _ = log.take();
    bus_log.clear();

    service.activate(names["d"]).expect("d");

    let (a, c, d) = (names["a"], names["c"], names["d"]);
    assert_eq!(
        log.events(),
        vec![
            PartEvent::new(PartEventKind::Deactivated, a),
            PartEvent::new(PartEventKind::Hidden, c),
            PartEvent::new(PartEventKind::Activated, d),
            PartEvent::new(PartEventKind::Visible, d),
            PartEvent::new(PartEventKind::BroughtToTop, d),
        ]
    );
    assert_eq!(
        bus_log.active_changes(),
        vec![(names["window"], Some(a), Some(d))]
    );
    assert!(bus_log.model_deltas() > 0);
}

#[test]
fn repeated_activation_emits_nothing() {
    let (model, names) = two_stacks();
    let (listener, log) = RecordingListener::new();
    let mut service = PartService::new(model);
    let _ = service.add_part_listener(Box::new(listener));
    service.activate(names["a"]).expect("a");
    let _ = log.take();
    service.activate(names["a"]).expect("a again");
    assert!(log.events().is_empty());
}

#[test]
fn activation_focuses_presentation_then_contribution() {
    let (model, names) = two_stacks();
    let (presentation, trace) = RecordingPresentation::new();
    let mut service = PartService::new(model).with_presentation(presentation);
    service.activate(names["b"]).expect("b");

    let b = names["b"];
    let calls = trace.calls();
    let focus = calls
        .iter()
        .position(|call| *call == PresentationCall::Focus(b))
        .expect("presentation focus");
    let contribution_focus = calls
        .iter()
        .position(|call| *call == PresentationCall::ContributionFocus(b))
        .expect("contribution focus");
    assert!(trace.count(PresentationCall::Instantiate(b)) == 1);
    assert!(focus < contribution_focus);
}

#[test]
fn activation_without_focus_skips_callbacks() {
    let (model, names) = two_stacks();
    let (presentation, trace) = RecordingPresentation::new();
    let mut service = PartService::new(model).with_presentation(presentation);
    service
        .activate_with(
            names["c"],
            ActivateOptions {
                requires_focus: false,
            },
        )
        .expect("c");
    assert_eq!(service.active_part(), Some(names["c"]));
    assert!(trace.focused().is_empty());
}

#[test]
fn bring_to_top_does_not_focus_unless_it_activates() {
    let (model, names) = two_stacks();
    let (presentation, trace) = RecordingPresentation::new();
    let mut service = PartService::new(model).with_presentation(presentation);
    service.activate(names["a"]).expect("a");
    trace.clear();
    service.bring_to_top(names["d"]).expect("d");
    assert!(trace.focused().is_empty());
    service.bring_to_top(names["b"]).expect("b");
    assert_eq!(trace.focused(), vec![names["b"]]);
}

#[test]
fn forced_hide_unrenders_then_destroys() {
    let (model, names) = two_stacks();
    let (presentation, trace) = RecordingPresentation::new();
    let mut service = PartService::new(model).with_presentation(presentation);
    service.activate(names["a"]).expect("a");
    service.hide_part(names["a"], true).expect("hide");

    let a = names["a"];
    assert_eq!(trace.count(PresentationCall::Unrender(a)), 1);
    assert!(service.model().get(a).is_none());
    assert!(service.contribution(a).is_none());
    assert!(!service.model().invariant_report().has_errors());
}

#[test]
fn unknown_parts_are_invalid_arguments() {
    let (mut service, _) = service_with_a_active();
    let missing = ElementId::new(9_999).expect("id");
    assert!(matches!(
        service.activate(missing),
        Err(WorkbenchError::Model(_))
    ));
    assert!(matches!(
        service.hide_part(missing, false),
        Err(WorkbenchError::Model(_))
    ));
}

#[test]
fn deactivate_notifies_and_clears_the_window_scope() {
    let (model, names) = two_stacks();
    let (listener, log) = RecordingListener::new();
    let (bus, bus_log) = RecordingEventBus::new();
    let mut service = PartService::new(model).with_event_bus(bus);
    let _ = service.add_part_listener(Box::new(listener));
    service.activate(names["a"]).expect("a");
    let _ = log.take();
    bus_log.clear();

    service.deactivate(names["a"]).expect("deactivate a");

    let a = names["a"];
    assert_eq!(
        log.events(),
        vec![
            PartEvent::new(PartEventKind::Deactivated, a),
            PartEvent::new(PartEventKind::Hidden, a),
        ]
    );
    assert_eq!(bus_log.active_changes(), vec![(names["window"], Some(a), None)]);
    assert_eq!(service.active_part_in(names["window"]), None);
}
