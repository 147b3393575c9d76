//! Misbehaving listeners neither block delivery nor corrupt activation.

use trellis_harness::{
    FailingListener, PanickingListener, RecordingListener, two_stacks, with_captured_tracing,
};
use trellis_runtime::{PartEventKind, PartService, logging::targets};

#[test]
fn failing_and_panicking_listeners_are_logged_and_skipped() {
    let (model, names) = two_stacks();
    let (recorder, log) = RecordingListener::new();
    let mut service = PartService::new(model);
    let _ = service.add_part_listener(Box::new(FailingListener));
    let _ = service.add_part_listener(Box::new(PanickingListener));
    let _ = service.add_part_listener(Box::new(recorder));
    service.activate(names["a"]).expect("a");
    let failures_before = service.listener_failures();
    let _ = log.take();

    let (result, capture) = with_captured_tracing(|| service.activate(names["d"]));

    result.expect("activation survives listener failures");
    assert_eq!(service.active_part(), Some(names["d"]));
    assert_eq!(
        log.events().iter().map(|event| event.kind).collect::<Vec<_>>(),
        vec![
            PartEventKind::Deactivated,
            PartEventKind::Hidden,
            PartEventKind::Activated,
            PartEventKind::Visible,
            PartEventKind::BroughtToTop,
        ]
    );

    // Five refusals from the failing listener, two panics (activated, hidden).
    assert_eq!(service.listener_failures() - failures_before, 7);
    let warnings = capture.events_for(targets::LISTENER);
    assert_eq!(warnings.len(), 7);
    assert!(warnings.iter().all(|event| event.level == tracing::Level::WARN));
    assert!(
        warnings
            .iter()
            .any(|event| event.field("error").is_some_and(|error| error.contains("panic")))
    );
    assert!(
        warnings
            .iter()
            .any(|event| event.field("error").is_some_and(|error| error.contains("refused")))
    );
}

#[test]
fn operations_open_spans() {
    let (model, names) = two_stacks();
    let mut service = PartService::new(model);
    let ((), capture) = with_captured_tracing(|| {
        service.activate(names["a"]).expect("a");
        service.bring_to_top(names["d"]).expect("d");
        service.hide_part(names["b"], false).expect("hide b");
    });
    let spans = capture.span_names();
    for expected in [
        "part_service.activate",
        "part_service.bring_to_top",
        "part_service.hide",
    ] {
        assert!(spans.iter().any(|name| name == expected), "missing span {expected}");
    }
    let activation_logs = capture.events_for(targets::ACTIVATION);
    assert!(
        activation_logs
            .iter()
            .any(|event| event.message() == "part activated")
    );
}

#[test]
fn removed_listeners_are_not_called() {
    let (model, names) = two_stacks();
    let (recorder, log) = RecordingListener::new();
    let mut service = PartService::new(model);
    let id = service.add_part_listener(Box::new(recorder));
    assert!(service.remove_part_listener(id));
    service.activate(names["a"]).expect("a");
    assert!(log.events().is_empty());
}
