//! Save negotiation for dirty parts.

use trellis_harness::{
    BusLog, Names, PresentationTrace, RecordingEventBus, RecordingPresentation,
    ScriptedSaveHandler, two_stacks,
};
use trellis_runtime::{PartService, Save, WorkbenchEvent};

struct Bench {
    service: PartService,
    names: Names,
    trace: PresentationTrace,
    bus: BusLog,
}

impl Bench {
    fn is_dirty(&self, part: &str) -> bool {
        self.service
            .model()
            .element(self.names[part])
            .expect("part")
            .is_dirty()
    }
}

/// `a` and `c` rendered (so they have contributions) and dirty.
fn bench() -> Bench {
    let (model, names) = two_stacks();
    let (presentation, trace) = RecordingPresentation::new();
    let (bus, bus_log) = RecordingEventBus::new();
    let mut service = PartService::new(model)
        .with_presentation(presentation)
        .with_event_bus(bus);
    service.activate(names["c"]).expect("c");
    service.activate(names["a"]).expect("a");
    service.set_dirty(names["a"], true).expect("dirty a");
    service.set_dirty(names["c"], true).expect("dirty c");
    trace.clear();
    bus_log.clear();
    Bench {
        service,
        names,
        trace,
        bus: bus_log,
    }
}

#[test]
fn any_cancel_aborts_save_all() {
    let mut bench = bench();
    let (handler, prompts) = ScriptedSaveHandler::new();
    bench
        .service
        .set_save_handler(Some(Box::new(handler.answering_all([Save::Yes, Save::Cancel]))));

    assert_eq!(bench.service.save_all(true), Ok(false));
    assert!(bench.trace.persisted().is_empty());
    assert!(bench.is_dirty("a"));
    assert!(bench.is_dirty("c"));
    assert_eq!(prompts.prompts(), vec![vec![bench.names["a"], bench.names["c"]]]);
}

#[test]
fn failed_save_keeps_the_part_dirty_and_skips_declined_parts() {
    let mut bench = bench();
    let a = bench.names["a"];
    bench.trace.fail_persist(a);
    let (handler, _) = ScriptedSaveHandler::new();
    bench
        .service
        .set_save_handler(Some(Box::new(handler.answering_all([Save::Yes, Save::No]))));

    assert_eq!(bench.service.save_all(true), Ok(false));
    assert_eq!(bench.trace.persisted(), vec![a]);
    assert!(bench.is_dirty("a"));
    assert!(bench.is_dirty("c"));
    assert_eq!(bench.bus.save_failures(), vec![a]);
}

#[test]
fn one_failure_does_not_stop_the_batch() {
    let mut bench = bench();
    let (a, c) = (bench.names["a"], bench.names["c"]);
    bench.trace.fail_persist(a);

    assert_eq!(bench.service.save_all(false), Ok(false));
    assert_eq!(bench.trace.persisted(), vec![a, c]);
    assert!(bench.is_dirty("a"));
    assert!(!bench.is_dirty("c"));
    assert_eq!(bench.bus.saved(), vec![c]);
}

#[test]
fn panicking_save_is_a_failure() {
    let mut bench = bench();
    let a = bench.names["a"];
    bench.trace.panic_on_persist(a);

    assert_eq!(bench.service.save_part(a, false), Ok(false));
    assert!(bench.is_dirty("a"));
    let reason = bench.bus.events().into_iter().find_map(|event| match event {
        WorkbenchEvent::SaveFailed { part, reason } if part == a => Some(reason),
        _ => None,
    });
    assert!(reason.is_some_and(|reason| reason.contains("persist exploded")));
}

#[test]
fn single_prompts_follow_the_handler() {
    let mut bench = bench();
    let a = bench.names["a"];
    let (handler, prompts) = ScriptedSaveHandler::new();
    bench.service.set_save_handler(Some(Box::new(
        handler.answering([Save::Cancel, Save::No, Save::Yes]),
    )));

    assert_eq!(bench.service.save_part(a, true), Ok(false));
    assert_eq!(bench.service.save_part(a, true), Ok(true));
    assert!(bench.is_dirty("a"));
    assert_eq!(bench.service.save_part(a, true), Ok(true));
    assert!(!bench.is_dirty("a"));
    assert_eq!(prompts.len(), 3);
    assert_eq!(bench.trace.persisted(), vec![a]);
}

#[test]
fn clean_save_all_succeeds_without_prompting() {
    let (model, _) = two_stacks();
    let (handler, prompts) = ScriptedSaveHandler::new();
    let mut service = PartService::new(model).with_save_handler(handler);
    assert_eq!(service.save_all(true), Ok(true));
    assert!(prompts.is_empty());
}

#[test]
fn close_keeps_the_part_when_cancelled() {
    let mut bench = bench();
    let a = bench.names["a"];
    let (handler, _) = ScriptedSaveHandler::new();
    bench
        .service
        .set_save_handler(Some(Box::new(handler.answering([Save::Cancel, Save::Yes]))));

    assert_eq!(bench.service.close_part(a), Ok(false));
    assert_eq!(bench.service.active_part(), Some(a));

    assert_eq!(bench.service.close_part(a), Ok(true));
    assert!(bench.service.model().get(a).is_none());
    // c was activated just before a.
    assert_eq!(bench.service.active_part(), Some(bench.names["c"]));
}
