//! Effective-visibility resolution over the model tree.
//!
//! A node is effectively visible when the chain from the node to its
//! top-level window is intact, every node on it is to be rendered, and every
//! single-child container on it selects the climbed child.
//!
//! # Invariants
//!
//! 1. Shared pool members are climbed through their current placeholder only;
//!    a pool member without one is [`PartLocation::NotInTree`].
//! 2. Detached windows climb into their owning window or perspective, so a
//!    detached window of an unselected perspective is obscured.
//! 3. A node whose own `visible` flag is false obscures everything below it.
//! 4. [`locate`] reports the most severe failure: `NotInTree` beats
//!    `NotRendered`, which beats `Obscured`.
//!
//! # Failure Modes
//!
//! None. Broken chains and parent cycles classify as `NotInTree`.

use crate::model::{ContainerRole, ElementId, WorkbenchModel};

/// How one render-path step links a node to the node above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepLink {
    /// `child` is in the container's `children`.
    Child,
    /// `child` is a detached window in the container's `windows`.
    DetachedWindow,
    /// `child` is a shared element realized by the placeholder `container`.
    Placeholder,
}

/// One hop on a render path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderStep {
    pub container: ElementId,
    pub child: ElementId,
    pub link: StepLink,
}

/// Chain from an element up to its top-level window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPath {
    pub element: ElementId,
    /// Steps ordered from the element upward.
    pub steps: Vec<RenderStep>,
    pub window: ElementId,
}

impl RenderPath {
    /// Every node on the path, element first, window last.
    pub fn nodes(&self) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::once(self.element).chain(self.steps.iter().map(|step| step.container))
    }

    /// Innermost perspective on the path, if any.
    #[must_use]
    pub fn perspective(&self, model: &WorkbenchModel) -> Option<ElementId> {
        self.nodes().find(|id| {
            model
                .get(*id)
                .and_then(|element| element.role())
                == Some(ContainerRole::Perspective)
        })
    }
}

/// Where a part currently stands relative to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartLocation {
    NotInTree,
    NotRendered,
    Obscured,
    Visible,
}

/// Build the render path for `element`, or `None` when the chain is broken.
#[must_use]
pub fn render_path(model: &WorkbenchModel, element: ElementId) -> Option<RenderPath> {
    let mut steps = Vec::new();
    let mut current = element;
    let mut budget = model.len();
    loop {
        let node = model.get(current)?;
        if node.role() == Some(ContainerRole::Window) {
            // Top-level windows hang directly off the application root.
            return (node.parent == Some(model.root())).then_some(RenderPath {
                element,
                steps,
                window: current,
            });
        }
        if budget == 0 {
            return None;
        }
        budget -= 1;

        let step = if node.pool_owner.is_some() {
            let placeholder = node.cur_shared_ref?;
            RenderStep {
                container: placeholder,
                child: current,
                link: StepLink::Placeholder,
            }
        } else {
            let parent = node.parent?;
            let owner = model.get(parent)?.as_container()?;
            let link = if owner.children.contains(&current) {
                StepLink::Child
            } else if owner.windows.contains(&current) {
                StepLink::DetachedWindow
            } else {
                // Menus and toolbars are never rendered as part of the layout.
                return None;
            };
            RenderStep {
                container: parent,
                child: current,
                link,
            }
        };
        steps.push(step);
        current = step.container;
    }
}

/// Classify `element` against its render path.
#[must_use]
pub fn locate(model: &WorkbenchModel, element: ElementId) -> PartLocation {
    let Some(path) = render_path(model, element) else {
        return PartLocation::NotInTree;
    };
    let rendered = path
        .nodes()
        .all(|id| model.get(id).is_some_and(|node| node.to_be_rendered));
    if !rendered {
        return PartLocation::NotRendered;
    }
    if path_obscured(model, &path) {
        return PartLocation::Obscured;
    }
    PartLocation::Visible
}

fn path_obscured(model: &WorkbenchModel, path: &RenderPath) -> bool {
    if path
        .nodes()
        .any(|id| model.get(id).is_some_and(|node| !node.visible))
    {
        return true;
    }
    path.steps.iter().any(|step| {
        step.link == StepLink::Child
            && model.get(step.container).is_some_and(|node| {
                node.as_container().is_some_and(|container| {
                    container.role.shows_single_child() && container.selected != Some(step.child)
                })
            })
    })
}

/// Whether `element` is rendered and not obscured.
#[must_use]
pub fn effectively_visible(model: &WorkbenchModel, element: ElementId) -> bool {
    locate(model, element) == PartLocation::Visible
}

/// The top-level window `element` structurally belongs to.
///
/// Unlike [`render_path`], pool members resolve through their pool owner, so
/// shared elements without a current placeholder still report a window.
#[must_use]
pub fn top_window(model: &WorkbenchModel, element: ElementId) -> Option<ElementId> {
    let mut current = element;
    let mut budget = model.len();
    loop {
        let node = model.get(current)?;
        if node.role() == Some(ContainerRole::Window) && node.parent == Some(model.root()) {
            return Some(current);
        }
        if budget == 0 {
            return None;
        }
        budget -= 1;
        current = match (node.parent, node.pool_owner) {
            (Some(parent), _) => parent,
            (None, Some(window)) => window,
            (None, None) => return None,
        };
    }
}

/// Whether `element`'s nearest structural single-child ancestors all select
/// the climbed child, ignoring render flags. Used to test "would be on top".
#[must_use]
pub fn selected_chain(model: &WorkbenchModel, element: ElementId) -> bool {
    render_path(model, element).is_some_and(|path| {
        path.steps.iter().all(|step| {
            step.link != StepLink::Child
                || model.get(step.container).is_some_and(|node| {
                    node.as_container().is_some_and(|container| {
                        !container.role.shows_single_child() || container.selected == Some(step.child)
                    })
                })
        })
    })
}

/// Whether `element` belongs to the layout currently on screen.
///
/// The render path must be intact with every node to be rendered, and every
/// perspective stack on it must select the climbed perspective. Tabs may
/// still cover the element.
#[must_use]
pub fn in_active_layout(model: &WorkbenchModel, element: ElementId) -> bool {
    let Some(path) = render_path(model, element) else {
        return false;
    };
    path.nodes()
        .all(|id| model.get(id).is_some_and(|node| node.to_be_rendered))
        && path.steps.iter().all(|step| {
            step.link != StepLink::Child
                || model.get(step.container).is_none_or(|node| {
                    node.role() != Some(ContainerRole::PerspectiveStack)
                        || model.selected(step.container) == Some(step.child)
                })
        })
}
