//! `show` and part creation from descriptors.
//!
//! Placement follows the descriptor's category: a part lands in the first
//! rendered stack of the presentation root carrying the category tag,
//! otherwise in the deepest last rendered container of the root, which is
//! created (and tagged) when the root has none.
//!
//! # Failure Modes
//!
//! Showing an existing part whose enclosing containers are not rendered fails
//! with [`WorkbenchError::InvalidArgument`] before the model is touched.
//!
//! ```text
//! show("console", Activate)
//!   │
//!   ├─ find existing "console" in the active perspective ──▶ reuse
//!   ├─ else descriptor "console" ──▶ new part (or shared part + placeholder)
//!   │                                  └─ placed in stack tagged "bottom"
//!   └─ else ──▶ Ok(None)
//! ```

use trellis_model::{
    ContainerRole, ElementFilter, ElementId, ElementType, PartSpec, SearchScope, contains, find,
    find_first, render_path,
};

use crate::descriptor::PartDescriptor;
use crate::error::{Result, WorkbenchError};
use crate::logging::targets;
use crate::part_service::{PartService, Target};

/// What `show` does once the part is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartState {
    /// Ensure the part exists and is rendered. Selection is untouched.
    Create,
    /// Select the part in its stack, as `bring_to_top` does.
    Visible,
    /// Full activation.
    Activate,
}

/// Argument of [`PartService::show`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowTarget {
    /// Find by element id, or create from the descriptor with that id.
    Id(String),
    /// An existing part, attached or not.
    Part(ElementId),
}

impl From<&str> for ShowTarget {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for ShowTarget {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<ElementId> for ShowTarget {
    fn from(part: ElementId) -> Self {
        Self::Part(part)
    }
}

impl PartService {
    /// Resolve, place, and present a part in the active window.
    ///
    /// Returns `Ok(None)` when an id matches neither an existing part nor a
    /// descriptor.
    pub fn show(
        &mut self,
        target: impl Into<ShowTarget>,
        state: PartState,
    ) -> Result<Option<ElementId>> {
        let target = target.into();
        let _span = tracing::debug_span!("part_service.show", target = ?target, state = ?state)
            .entered();

        let window = self.model.active_window().ok_or(WorkbenchError::NoActiveWindow)?;
        let root = self.presentation_root(window);
        if state != PartState::Create && !self.renders_into(root) {
            return Err(WorkbenchError::invalid(root, "an enclosing container is not rendered"));
        }
        let mut tx = self.begin();
        let provided = match &target {
            ShowTarget::Part(part) => {
                if !self.model.element(*part)?.is_part() {
                    return Err(WorkbenchError::invalid(*part, "not a part"));
                }
                self.check_showable(window, *part, state)?;
                *part
            }
            ShowTarget::Id(id) => match self.find_local(window, id) {
                Some((part, _)) => {
                    self.check_showable(window, part, state)?;
                    let _ = self.lookup_part(window, id)?;
                    part
                }
                None => match self.instantiate_for_show(window, id)? {
                    Some(part) => part,
                    None => {
                        tracing::debug!(target: targets::PLACEMENT, id = %id, "no part or descriptor");
                        return Ok(None);
                    }
                },
            },
        };

        let part = self.add_part(window, provided)?;
        let placed = self.target(part)?;
        match state {
            PartState::Create => self.create_in_place(&placed)?,
            PartState::Visible => {
                self.ensure_renderable(&placed)?;
                self.raise(&mut tx, &placed)?;
            }
            PartState::Activate => {
                self.ensure_renderable(&placed)?;
                self.promote(&mut tx, &placed)?;
            }
        }
        tracing::debug!(
            target: targets::PLACEMENT,
            part = %part,
            node = %placed.local,
            window = %placed.window,
            "part shown"
        );
        self.finish(tx)?;
        Ok(Some(part))
    }

    /// Find a part by element id in the active perspective, or the active
    /// window when it has none.
    ///
    /// A shared part found through a placeholder is re-pointed at that
    /// placeholder.
    pub fn find_part(&mut self, id: &str) -> Result<Option<ElementId>> {
        let window = self.model.active_window().ok_or(WorkbenchError::NoActiveWindow)?;
        let found = self.lookup_part(window, id)?;
        self.publish_deltas();
        Ok(found)
    }

    /// Create an unattached part from the descriptor registered under `id`.
    pub fn create_part(&mut self, id: &str) -> Result<Option<ElementId>> {
        let Some(descriptor) = self.descriptors.lookup(id).cloned() else {
            return Ok(None);
        };
        let part = self.build_part(&descriptor)?;
        self.publish_deltas();
        Ok(Some(part))
    }

    /// Return a new placeholder for the shared part `id` of the active
    /// window.
    ///
    /// An existing pooled part with that id is reused unless `force` is set
    /// or reuse is disabled in the configuration. The placeholder is
    /// unattached; the caller places it.
    pub fn create_shared_part(&mut self, id: &str, force: bool) -> Result<Option<ElementId>> {
        let window = self.model.active_window().ok_or(WorkbenchError::NoActiveWindow)?;
        let placeholder = self.share_part(window, id, force)?;
        self.publish_deltas();
        Ok(placeholder)
    }

    // ---------------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------------

    fn lookup_part(&mut self, window: ElementId, id: &str) -> Result<Option<ElementId>> {
        let Some((part, repoint)) = self.find_local(window, id) else {
            return Ok(None);
        };
        if let Some(placeholder) = repoint {
            self.model.set_current_placeholder(part, Some(placeholder))?;
        }
        Ok(Some(part))
    }

    /// The part with element id `id` in the presentation root, and the local
    /// placeholder it must be re-pointed at when it is shared and its current
    /// placeholder lies elsewhere.
    fn find_local(&self, window: ElementId, id: &str) -> Option<(ElementId, Option<ElementId>)> {
        let root = self.presentation_root(window);
        let filter = ElementFilter::new()
            .with_id(id)
            .with_type(ElementType::Part);
        let part = find_first(&self.model, root, &filter, SearchScope::ANYWHERE)?;
        let element = self.model.get(part)?;
        let repoint = if element.is_shared()
            && !element
                .cur_shared_ref
                .is_some_and(|current| contains(&self.model, root, current))
        {
            self.model
                .placeholders_for(part)
                .into_iter()
                .find(|placeholder| contains(&self.model, root, *placeholder))
        } else {
            None
        };
        Some((part, repoint))
    }

    /// Refuse to select or activate an existing part that would stay under
    /// an unrendered container. Parts that still need placing always land in
    /// a rendered one.
    fn check_showable(&self, window: ElementId, part: ElementId, state: PartState) -> Result<()> {
        if state == PartState::Create {
            return Ok(());
        }
        let root = self.presentation_root(window);
        let shown = match self.model.element(part)?.element_id.as_deref() {
            Some(id) => match (self.find_local(window, id), self.descriptors.lookup(id)) {
                (Some((local, _)), Some(descriptor)) if !descriptor.allow_multiple => local,
                _ => part,
            },
            None => part,
        };
        let Some(node) = self.node_in_root(root, shown) else {
            return Ok(());
        };
        match self.model.parent(node) {
            Some(parent) if self.renders_into(parent) => Ok(()),
            Some(_) => Err(WorkbenchError::invalid(
                shown,
                "an enclosing container is not rendered",
            )),
            None => Ok(()),
        }
    }

    /// The layout node already standing for `part` inside `root`.
    fn node_in_root(&self, root: ElementId, part: ElementId) -> Option<ElementId> {
        let element = self.model.get(part)?;
        if !element.is_shared() {
            return Some(part).filter(|part| contains(&self.model, root, *part));
        }
        element
            .cur_shared_ref
            .filter(|current| contains(&self.model, root, *current))
            .or_else(|| {
                self.model
                    .placeholders_for(part)
                    .into_iter()
                    .find(|placeholder| contains(&self.model, root, *placeholder))
            })
    }

    /// Whether `container` and everything above it is to be rendered.
    fn renders_into(&self, container: ElementId) -> bool {
        render_path(&self.model, container).is_some_and(|path| {
            path.nodes()
                .all(|id| self.model.get(id).is_some_and(|node| node.to_be_rendered))
        })
    }

    fn instantiate_for_show(&mut self, window: ElementId, id: &str) -> Result<Option<ElementId>> {
        let Some(descriptor) = self.descriptors.lookup(id).cloned() else {
            return Ok(None);
        };
        if !descriptor.shared {
            return self.build_part(&descriptor).map(Some);
        }
        let Some(placeholder) = self.share_part(window, id, false)? else {
            return Ok(None);
        };
        let part = self.model.resolve(placeholder);
        self.model.set_current_placeholder(part, Some(placeholder))?;
        Ok(Some(part))
    }

    fn share_part(&mut self, window: ElementId, id: &str, force: bool) -> Result<Option<ElementId>> {
        let reusable = if force || !self.config.reuse_shared_parts {
            None
        } else {
            self.model
                .container(window)?
                .shared_elements
                .iter()
                .copied()
                .find(|shared| {
                    self.model
                        .get(*shared)
                        .is_some_and(|element| element.is_part() && element.element_id.as_deref() == Some(id))
                })
        };
        let part = match reusable {
            Some(part) => part,
            None => {
                let Some(descriptor) = self.descriptors.lookup(id).cloned() else {
                    return Ok(None);
                };
                let part = self.build_part(&descriptor)?;
                self.model.add_shared_element(window, part)?;
                part
            }
        };
        let placeholder = self.model.create_placeholder(part)?;
        tracing::debug!(
            target: targets::PLACEMENT,
            part = %part,
            placeholder = %placeholder,
            reused = reusable.is_some(),
            "shared part placeholder created"
        );
        Ok(Some(placeholder))
    }

    fn build_part(&mut self, descriptor: &PartDescriptor) -> Result<ElementId> {
        let mut spec = PartSpec::new(descriptor.id.as_str()).with_label(descriptor.label.as_str());
        spec.closeable = descriptor.closeable;
        spec.tags = descriptor.tags.clone();
        spec.contribution_uri = descriptor.contribution_uri.clone();
        spec.properties = descriptor.properties.clone();
        let part = self.model.create_part(spec)?;

        for template in &descriptor.menus {
            let menu = self
                .model
                .create_part_menu(part, ContainerRole::Menu, template.label.as_str())?;
            for item in &template.items {
                let _ = self
                    .model
                    .create_item(menu, item.label.as_str(), item.command.clone())?;
            }
        }
        if let Some(template) = &descriptor.toolbar {
            let toolbar = self
                .model
                .create_part_menu(part, ContainerRole::ToolBar, template.label.as_str())?;
            for item in &template.items {
                let _ = self
                    .model
                    .create_item(toolbar, item.label.as_str(), item.command.clone())?;
            }
        }
        Ok(part)
    }

    // ---------------------------------------------------------------------
    // Placement
    // ---------------------------------------------------------------------

    /// Place `provided` in the presentation root unless it (or the local
    /// instance with the same id) is already there. Returns the part to show.
    fn add_part(&mut self, window: ElementId, provided: ElementId) -> Result<ElementId> {
        let root = self.presentation_root(window);
        let element_id = self.model.element(provided)?.element_id.clone();
        let local = match element_id.as_deref() {
            Some(id) => self.lookup_part(window, id)?.unwrap_or(provided),
            None => provided,
        };
        let descriptor = element_id
            .as_deref()
            .and_then(|id| self.descriptors.lookup(id))
            .cloned();

        let Some(descriptor) = descriptor else {
            if !self.in_root(root, provided) {
                self.adjust_placeholder(root, provided)?;
                self.add_to_last_container(root, None, provided)?;
            }
            return Ok(provided);
        };
        if provided != local && !descriptor.allow_multiple {
            return Ok(local);
        }
        if self.in_root(root, provided) {
            return Ok(provided);
        }
        self.adjust_placeholder(root, provided)?;
        let category = descriptor.category.as_deref();
        let tagged = category.and_then(|category| {
            let filter = ElementFilter::new().with_tag(category);
            find(&self.model, root, &filter, SearchScope::PRESENTATION)
                .into_iter()
                .find(|container| {
                    self.model
                        .get(*container)
                        .and_then(|element| element.role())
                        .is_some_and(accepts_parts)
                        && self.renders_into(*container)
                })
        });
        match tagged {
            Some(container) => {
                let node = self.layout_node(provided);
                self.attach_layout(container, node)?;
                tracing::debug!(
                    target: targets::PLACEMENT,
                    part = %provided,
                    container = %container,
                    category = ?category,
                    "part placed in category container"
                );
            }
            None => self.add_to_last_container(root, category, provided)?,
        }
        Ok(provided)
    }

    fn in_root(&self, root: ElementId, part: ElementId) -> bool {
        let node = self.layout_node(part);
        contains(&self.model, root, node)
    }

    /// The node that stands for `part` in the layout.
    fn layout_node(&self, part: ElementId) -> ElementId {
        self.model
            .get(part)
            .filter(|element| element.is_shared())
            .and_then(|element| element.cur_shared_ref)
            .unwrap_or(part)
    }

    /// Give a shared part a fresh current placeholder when it has none, or
    /// when its current one is attached somewhere outside `root`.
    fn adjust_placeholder(&mut self, root: ElementId, part: ElementId) -> Result<()> {
        let element = self.model.element(part)?;
        if !element.is_shared() {
            return Ok(());
        }
        let stale = match element.cur_shared_ref {
            None => true,
            Some(current) => {
                self.model.parent(current).is_some() && !contains(&self.model, root, current)
            }
        };
        if stale {
            let placeholder = self.model.create_placeholder(part)?;
            self.model.set_current_placeholder(part, Some(placeholder))?;
        }
        Ok(())
    }

    fn add_to_last_container(
        &mut self,
        root: ElementId,
        category: Option<&str>,
        part: ElementId,
    ) -> Result<()> {
        let container = match self.last_container(root) {
            Some(container) => container,
            None => {
                let stack = self
                    .model
                    .create_child_container(root, ContainerRole::Stack, "")?;
                self.model.add_tag(stack, self.config.new_stack_tag.clone())?;
                stack
            }
        };
        let node = self.layout_node(part);
        self.attach_layout(container, node)?;
        if let Some(category) = category {
            self.model.add_tag(container, category)?;
        }
        tracing::debug!(
            target: targets::PLACEMENT,
            part = %part,
            container = %container,
            category = ?category,
            "part placed in last container"
        );
        Ok(())
    }

    /// Deepest container reached by following last rendered children from
    /// `container`.
    fn last_container(&self, container: ElementId) -> Option<ElementId> {
        let last = self
            .model
            .children(container)
            .iter()
            .rev()
            .copied()
            .find(|child| self.model.get(*child).is_some_and(|node| node.to_be_rendered))?;
        let nested = self
            .model
            .get(last)
            .and_then(|element| element.role())
            .is_some_and(accepts_parts);
        if nested {
            Some(self.last_container(last).unwrap_or(last))
        } else {
            Some(container).filter(|container| {
                self.model
                    .get(*container)
                    .and_then(|element| element.role())
                    .is_some_and(accepts_parts)
            })
        }
    }

    fn attach_layout(&mut self, container: ElementId, node: ElementId) -> Result<()> {
        if let Some(parent) = self.model.parent(node) {
            if parent == container {
                return Ok(());
            }
            let _ = self.model.remove_child(parent, node)?;
        }
        self.model.set_to_be_rendered(node, true)?;
        self.model.add_child(container, node)?;
        Ok(())
    }

    /// `Create`: render the part where it is, selecting it only when it is
    /// the sole child of its container.
    fn create_in_place(&mut self, target: &Target) -> Result<()> {
        self.model.set_to_be_rendered(target.local, true)?;
        self.model.set_to_be_rendered(target.part, true)?;
        if let Some(parent) = self.model.parent(target.local)
            && self.model.children(parent) == [target.local]
        {
            self.model.set_selected(parent, Some(target.local))?;
        }
        Ok(())
    }
}

fn accepts_parts(role: ContainerRole) -> bool {
    matches!(
        role,
        ContainerRole::Sash
            | ContainerRole::Stack
            | ContainerRole::Area
            | ContainerRole::Window
            | ContainerRole::DetachedWindow
            | ContainerRole::Perspective
    )
}
