//! Workbench fixtures addressed by name.
//!
//! Builder methods panic on model errors: a fixture that cannot be built is
//! a broken test, not a condition to handle.

use std::collections::BTreeMap;
use std::ops::Index;

use trellis_model::{ContainerRole, ElementId, ModelError, PartSpec, WorkbenchModel};

/// Element ids by fixture name.
#[derive(Debug, Clone, Default)]
pub struct Names(BTreeMap<String, ElementId>);

impl Names {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ElementId> {
        self.0.get(name).copied()
    }

    /// Fixture name of `id`, for readable assertion messages.
    #[must_use]
    pub fn name_of(&self, id: ElementId) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, candidate)| **candidate == id)
            .map(|(name, _)| name.as_str())
    }
}

impl Index<&str> for Names {
    type Output = ElementId;

    #[track_caller]
    fn index(&self, name: &str) -> &ElementId {
        match self.0.get(name) {
            Some(id) => id,
            None => panic!("fixture has no element named {name:?}"),
        }
    }
}

/// Builds a [`WorkbenchModel`] while naming every element it creates.
#[derive(Debug, Default)]
pub struct WorkbenchBuilder {
    model: WorkbenchModel,
    names: Names,
}

impl WorkbenchBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[track_caller]
    pub fn window(&mut self, name: &str) -> ElementId {
        let id = built(self.model.create_window(name), name);
        self.name(name, id)
    }

    /// A detached window owned by a window or perspective.
    #[track_caller]
    pub fn detached_window(&mut self, owner: ElementId, name: &str) -> ElementId {
        let id = built(self.model.create_detached_window(owner, name), name);
        self.name(name, id)
    }

    #[track_caller]
    pub fn container(&mut self, parent: ElementId, role: ContainerRole, name: &str) -> ElementId {
        let id = built(self.model.create_child_container(parent, role, name), name);
        self.name(name, id)
    }

    #[track_caller]
    pub fn sash(&mut self, parent: ElementId, name: &str) -> ElementId {
        self.container(parent, ContainerRole::Sash, name)
    }

    #[track_caller]
    pub fn stack(&mut self, parent: ElementId, name: &str) -> ElementId {
        self.container(parent, ContainerRole::Stack, name)
    }

    #[track_caller]
    pub fn perspective_stack(&mut self, window: ElementId, name: &str) -> ElementId {
        self.container(window, ContainerRole::PerspectiveStack, name)
    }

    #[track_caller]
    pub fn perspective(&mut self, stack: ElementId, name: &str) -> ElementId {
        self.container(stack, ContainerRole::Perspective, name)
    }

    /// A part whose element id and label are both `name`.
    #[track_caller]
    pub fn part(&mut self, parent: ElementId, name: &str) -> ElementId {
        let id = built(self.model.create_part(PartSpec::new(name)), name);
        built(self.model.add_child(parent, id), name);
        self.name(name, id)
    }

    /// A part in `window`'s shared pool.
    #[track_caller]
    pub fn shared_part(&mut self, window: ElementId, name: &str) -> ElementId {
        let id = built(self.model.create_part(PartSpec::new(name)), name);
        built(self.model.add_shared_element(window, id), name);
        self.name(name, id)
    }

    /// A placeholder for `shared` appended to `parent`. The first placeholder
    /// of an element becomes its current one.
    #[track_caller]
    pub fn placeholder(&mut self, parent: ElementId, shared: ElementId, name: &str) -> ElementId {
        let id = built(self.model.create_placeholder(shared), name);
        built(self.model.add_child(parent, id), name);
        if self.model.get(shared).is_some_and(|element| element.cur_shared_ref.is_none()) {
            built(self.model.set_current_placeholder(shared, Some(id)), name);
        }
        self.name(name, id)
    }

    /// Direct model access for adjustments the builder does not cover.
    pub fn model_mut(&mut self) -> &mut WorkbenchModel {
        &mut self.model
    }

    /// Finish building. The creation journal is discarded.
    #[must_use]
    pub fn build(mut self) -> (WorkbenchModel, Names) {
        let _ = self.model.drain_deltas();
        (self.model, self.names)
    }

    #[track_caller]
    fn name(&mut self, name: &str, id: ElementId) -> ElementId {
        if self.names.0.insert(name.to_string(), id).is_some() {
            panic!("fixture name {name:?} used twice");
        }
        id
    }
}

#[track_caller]
fn built<T>(result: Result<T, ModelError>, name: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("building fixture element {name:?} failed: {err}"),
    }
}

/// One window split into two tab stacks: `stack1 = {a, b}`, `stack2 = {c, d}`.
///
/// Nothing is active yet; `a` and `c` are selected in their stacks.
#[must_use]
pub fn two_stacks() -> (WorkbenchModel, Names) {
    let mut builder = WorkbenchBuilder::new();
    let window = builder.window("window");
    let sash = builder.sash(window, "sash");
    let stack1 = builder.stack(sash, "stack1");
    let stack2 = builder.stack(sash, "stack2");
    let _ = builder.part(stack1, "a");
    let _ = builder.part(stack1, "b");
    let _ = builder.part(stack2, "c");
    let _ = builder.part(stack2, "d");
    builder.build()
}

/// One window with perspectives `p1` and `p2` (selected: `p1`), each holding
/// a stack with a local part and a placeholder for the shared part `shared`:
///
/// ```text
/// window ── perspectives ─┬─ p1 ── p1_stack ─┬─ editor1
///                         │                  └─ p1_shared ─▶ shared
///                         └─ p2 ── p2_stack ─┬─ p2_shared ─▶ shared
///                                            └─ editor2
/// ```
///
/// `p1_shared` is current. In `p2`, the placeholder is selected; in `p1`,
/// `editor1` is.
#[must_use]
pub fn shared_perspectives() -> (WorkbenchModel, Names) {
    let mut builder = WorkbenchBuilder::new();
    let window = builder.window("window");
    let shared = builder.shared_part(window, "shared");
    let perspectives = builder.perspective_stack(window, "perspectives");
    let p1 = builder.perspective(perspectives, "p1");
    let p2 = builder.perspective(perspectives, "p2");
    let p1_stack = builder.stack(p1, "p1_stack");
    let p2_stack = builder.stack(p2, "p2_stack");
    let _ = builder.part(p1_stack, "editor1");
    let _ = builder.placeholder(p1_stack, shared, "p1_shared");
    let _ = builder.placeholder(p2_stack, shared, "p2_shared");
    let _ = builder.part(p2_stack, "editor2");
    builder.build()
}

/// Two top-level windows, the first (selected) also owning a detached one:
///
/// ```text
/// main ──────── main_stack ─┬─ m1
///   │                       └─ m2
///   └┄ floating ─ float_stack ─┬─ f1
///                              └─ f2
/// second ────── second_stack ─┬─ s1
///                             └─ s2
/// ```
///
/// Nothing is active yet; the first part of every stack is selected.
#[must_use]
pub fn two_windows() -> (WorkbenchModel, Names) {
    let mut builder = WorkbenchBuilder::new();
    let main = builder.window("main");
    let main_stack = builder.stack(main, "main_stack");
    let _ = builder.part(main_stack, "m1");
    let _ = builder.part(main_stack, "m2");
    let floating = builder.detached_window(main, "floating");
    let float_stack = builder.stack(floating, "float_stack");
    let _ = builder.part(float_stack, "f1");
    let _ = builder.part(float_stack, "f2");
    let second = builder.window("second");
    let second_stack = builder.stack(second, "second_stack");
    let _ = builder.part(second_stack, "s1");
    let _ = builder.part(second_stack, "s2");
    builder.build()
}
