//! Property tests over random operation streams.
//!
//! After every operation, accepted or rejected:
//! - the active part of each window is absent or effectively visible,
//! - visibility agrees with the selection chain,
//! - every shared part has at most one current placeholder,
//! - the model invariant report has no errors.

use proptest::prelude::*;
use trellis_harness::{Names, WorkbenchBuilder, two_windows};
use trellis_model::{
    ContainerRole, ElementId, StepLink, WorkbenchModel, render_path,
};
use trellis_runtime::{PartDescriptor, PartService, PartState, StaticDescriptorRegistry};

const PARTS: &[&str] = &["a", "b", "c", "d", "shared", "tool"];
const PERSPECTIVES: &[&str] = &["p1", "p2"];
/// Part names per stack of the two-window fixture; no two stacks nest.
const STACKS: [[&str; 2]; 3] = [["m1", "m2"], ["f1", "f2"], ["s1", "s2"]];

#[derive(Debug, Clone)]
enum Op {
    Activate(usize),
    BringToTop(usize),
    Hide(usize, bool),
    Switch(usize),
    Show(usize, u8),
    ShowTool(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PARTS.len()).prop_map(Op::Activate),
        (0..PARTS.len()).prop_map(Op::BringToTop),
        (0..PARTS.len(), any::<bool>()).prop_map(|(i, force)| Op::Hide(i, force)),
        (0..PERSPECTIVES.len()).prop_map(Op::Switch),
        (0..PARTS.len(), 0..3_u8).prop_map(|(i, state)| Op::Show(i, state)),
        (0..3_u8).prop_map(Op::ShowTool),
    ]
}

fn state(raw: u8) -> PartState {
    match raw {
        0 => PartState::Create,
        1 => PartState::Visible,
        _ => PartState::Activate,
    }
}

/// Two perspectives sharing one pooled part, each with its own stacks.
fn workbench() -> (PartService, Names) {
    let mut builder = WorkbenchBuilder::new();
    let window = builder.window("window");
    let shared = builder.shared_part(window, "shared");
    let perspectives = builder.perspective_stack(window, "perspectives");
    let p1 = builder.perspective(perspectives, "p1");
    let p2 = builder.perspective(perspectives, "p2");
    let sash = builder.sash(p1, "sash");
    let left = builder.stack(sash, "left");
    let right = builder.stack(sash, "right");
    let _ = builder.part(left, "a");
    let _ = builder.placeholder(left, shared, "p1_shared");
    let _ = builder.part(right, "b");
    let p2_stack = builder.stack(p2, "p2_stack");
    let _ = builder.part(p2_stack, "c");
    let _ = builder.placeholder(p2_stack, shared, "p2_shared");
    let _ = builder.part(p2_stack, "d");
    builder.model_mut().add_tag(right, "tools").expect("tag");
    builder.model_mut().add_tag(p2_stack, "tools").expect("tag");
    let (model, names) = builder.build();

    let registry = StaticDescriptorRegistry::new()
        .with(PartDescriptor::new("tool").with_category("tools").shared(true));
    (PartService::new(model).with_descriptors(registry), names)
}

fn part_id(service: &PartService, names: &Names, name: &str) -> Option<ElementId> {
    names
        .get(name)
        .or_else(|| service.parts().into_iter().find(|part| {
            service
                .model()
                .get(*part)
                .and_then(|element| element.element_id.as_deref())
                == Some(name)
        }))
}

fn visible_by_selection_chain(model: &WorkbenchModel, part: ElementId) -> bool {
    let Some(path) = render_path(model, part) else {
        return false;
    };
    let flags = path
        .nodes()
        .all(|id| model.get(id).is_some_and(|node| node.to_be_rendered && node.visible));
    let selected = path.steps.iter().all(|step| {
        step.link != StepLink::Child
            || model.get(step.container).is_none_or(|node| {
                !matches!(
                    node.role(),
                    Some(ContainerRole::Stack | ContainerRole::PerspectiveStack)
                ) || model.selected(step.container) == Some(step.child)
            })
    });
    flags && selected
}

fn check(service: &PartService, names: &Names) -> Result<(), TestCaseError> {
    let model = service.model();
    let window = names["window"];
    if let Some(active) = service.active_part_in(window) {
        prop_assert!(
            service.is_part_visible(active),
            "active part {active} is not visible"
        );
    }
    for element in model.elements().filter(|element| element.is_part()) {
        prop_assert_eq!(
            service.is_part_visible(element.id),
            visible_by_selection_chain(model, element.id),
            "visibility of {} disagrees with its selection chain",
            element.id
        );
        if element.is_shared() {
            let current = model
                .placeholders_for(element.id)
                .into_iter()
                .filter(|placeholder| model.is_current(*placeholder))
                .count();
            prop_assert!(current <= 1);
        }
    }
    let report = model.invariant_report();
    prop_assert!(!report.has_errors(), "invariant errors: {:?}", report);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn random_operations_keep_activation_consistent(ops in prop::collection::vec(op(), 1..40)) {
        let (mut service, names) = workbench();
        for op in ops {
            let _ = match op {
                Op::Activate(i) => part_id(&service, &names, PARTS[i])
                    .map(|part| service.activate(part)),
                Op::BringToTop(i) => part_id(&service, &names, PARTS[i])
                    .map(|part| service.bring_to_top(part)),
                Op::Hide(i, force) => part_id(&service, &names, PARTS[i])
                    .map(|part| service.hide_part(part, force)),
                Op::Switch(i) => Some(service.switch_perspective(names[PERSPECTIVES[i]])),
                Op::Show(i, raw) => part_id(&service, &names, PARTS[i])
                    .map(|part| service.show(part, state(raw)).map(|_| ())),
                Op::ShowTool(raw) => Some(service.show("tool", state(raw)).map(|_| ())),
            };
            check(&service, &names)?;
        }
    }

    #[test]
    fn bring_to_top_elsewhere_never_moves_activation(
        pairs in prop::collection::vec((0..3_usize, 0..2_usize, 1..3_usize, 0..2_usize), 1..24)
    ) {
        let (model, names) = two_windows();
        let mut service = PartService::new(model);
        for (stack, index, offset, other_index) in pairs {
            let active = names[STACKS[stack][index]];
            let other = names[STACKS[(stack + offset) % STACKS.len()][other_index]];
            service.activate(active).expect("activate");
            service.bring_to_top(other).expect("bring to top");
            prop_assert_eq!(service.active_part(), Some(active));
            prop_assert!(service.is_part_visible(active));
            prop_assert!(service.is_part_visible(other));
        }
    }
}
