#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use trellis_harness::shared_perspectives;
use trellis_runtime::{PartService, PartState};

const NAMES: &[&str] = &["editor1", "editor2", "shared", "p1_shared", "p2_shared", "p1_stack"];
const PERSPECTIVES: &[&str] = &["p1", "p2", "p1_stack"];

#[derive(Debug, Arbitrary)]
enum Op {
    Activate(u8),
    Deactivate(u8),
    BringToTop(u8),
    Hide(u8, bool),
    Switch(u8),
    Show(u8, u8),
    Dirty(u8, bool),
    SaveAll,
}

fuzz_target!(|ops: Vec<Op>| {
    let (model, names) = shared_perspectives();
    let mut service = PartService::new(model);
    let window = names["window"];

    for op in ops.into_iter().take(64) {
        let pick = |raw: u8| names.get(NAMES[raw as usize % NAMES.len()]);
        // Errors are expected for invalid targets; only invariants matter here.
        let _ = match op {
            Op::Activate(raw) => pick(raw).map(|id| service.activate(id)),
            Op::Deactivate(raw) => pick(raw).map(|id| service.deactivate(id)),
            Op::BringToTop(raw) => pick(raw).map(|id| service.bring_to_top(id)),
            Op::Hide(raw, force) => pick(raw).map(|id| service.hide_part(id, force)),
            Op::Switch(raw) => names
                .get(PERSPECTIVES[raw as usize % PERSPECTIVES.len()])
                .map(|id| service.switch_perspective(id)),
            Op::Show(raw, state) => {
                let state = match state % 3 {
                    0 => PartState::Create,
                    1 => PartState::Visible,
                    _ => PartState::Activate,
                };
                pick(raw).map(|id| service.show(id, state).map(|_| ()))
            }
            Op::Dirty(raw, dirty) => pick(raw).map(|id| service.set_dirty(id, dirty)),
            Op::SaveAll => Some(service.save_all(false).map(|_| ())),
        };

        if let Some(active) = service.active_part_in(window) {
            assert!(service.is_part_visible(active), "active part {active} hidden");
        }
        let report = service.model().invariant_report();
        assert!(!report.has_errors(), "invariant errors: {report:?}");
    }
});
