//! Arena-backed workbench model tree.
//!
//! The model is a single arena of [`ModelElement`] records addressed by
//! [`ElementId`]. Back-references (`parent`, `cur_shared_ref`) are plain id
//! fields, so cycles such as
//! `Window -> Perspective -> Placeholder -> shared part -> cur_shared_ref`
//! never involve ownership.
//!
//! # Ownership rules
//!
//! - The [`ContainerRole::Application`] root owns the top-level windows.
//! - A container owns its `children`; a window or perspective also owns its
//!   detached `windows`, whose `parent` points back at the owner.
//! - A window owns its `shared_elements` pool. Pool members have no parent and
//!   are only reachable through [`Placeholder`]s; `pool_owner` names the window.
//! - Part menus, toolbars and the window main menu hang off their owner with a
//!   `parent` link but are not children.
//!
//! Every mutation validates its arguments and records a [`ModelDelta`] in a
//! journal that the runtime drains after each operation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Current model snapshot schema version.
pub const MODEL_SCHEMA_VERSION: u16 = 1;

/// Stable identifier for model elements.
///
/// `0` is reserved/invalid so IDs are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(u64);

impl ElementId {
    /// Lowest valid element ID.
    pub const MIN: Self = Self(1);

    /// Create a new element ID, rejecting 0.
    pub fn new(raw: u64) -> Result<Self, ModelError> {
        if raw == 0 {
            return Err(ModelError::ZeroElementId);
        }
        Ok(Self(raw))
    }

    /// Get the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Return the next ID, or an error on overflow.
    pub fn checked_next(self) -> Result<Self, ModelError> {
        let Some(next) = self.0.checked_add(1) else {
            return Err(ModelError::ElementIdOverflow { current: self });
        };
        Self::new(next)
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque widget handle owned by the presentation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetHandle(pub u64);

/// Opaque handle to a part's live contribution object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributionHandle(pub u64);

/// Structural role of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerRole {
    Application,
    Window,
    DetachedWindow,
    PerspectiveStack,
    Perspective,
    /// Split container; every child is shown.
    Sash,
    /// Tabbed stack; only the selected child is shown.
    Stack,
    /// Shareable editor-area style container.
    Area,
    Menu,
    ToolBar,
}

impl ContainerRole {
    /// Whether only the selected child of this container is shown.
    #[must_use]
    pub const fn shows_single_child(self) -> bool {
        matches!(self, Self::PerspectiveStack | Self::Stack)
    }

    /// Window roles (top-level or detached).
    #[must_use]
    pub const fn is_window(self) -> bool {
        matches!(self, Self::Window | Self::DetachedWindow)
    }

    /// Menu-like roles that only hold items and submenus.
    #[must_use]
    pub const fn is_menu(self) -> bool {
        matches!(self, Self::Menu | Self::ToolBar)
    }

    /// Roles that may own detached windows.
    #[must_use]
    pub const fn owns_windows(self) -> bool {
        matches!(self, Self::Window | Self::DetachedWindow | Self::Perspective)
    }
}

/// Container payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Container {
    pub role: ContainerRole,
    pub children: Vec<ElementId>,
    pub selected: Option<ElementId>,
    /// Shared pool (windows only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared_elements: Vec<ElementId>,
    /// Detached windows (windows and perspectives only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub windows: Vec<ElementId>,
    /// Main menu (windows only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_menu: Option<ElementId>,
}

impl Container {
    fn new(role: ContainerRole) -> Self {
        Self {
            role,
            children: Vec::new(),
            selected: None,
            shared_elements: Vec::new(),
            windows: Vec::new(),
            main_menu: None,
        }
    }
}

/// Part payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Part {
    pub dirty: bool,
    pub closeable: bool,
    /// Present only while the part is rendered.
    #[serde(default, skip_serializing)]
    pub contribution: Option<ContributionHandle>,
    /// Logical activation clock value of the most recent activation.
    #[serde(default)]
    pub last_activation: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_uri: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menus: Vec<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolbar: Option<ElementId>,
}

/// Placeholder payload: a positional stand-in for a shared element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placeholder {
    pub reference: ElementId,
}

/// Menu or tool item payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Element payload variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementKind {
    Container(Container),
    Part(Part),
    Placeholder(Placeholder),
    Item(Item),
}

/// One element record in the model arena.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelElement {
    pub id: ElementId,
    /// Application-level identifier (descriptor id for parts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default)]
    pub label: String,
    pub parent: Option<ElementId>,
    /// Window whose shared pool holds this element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_owner: Option<ElementId>,
    pub to_be_rendered: bool,
    pub visible: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing)]
    pub widget: Option<WidgetHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cur_shared_ref: Option<ElementId>,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl ModelElement {
    fn new(id: ElementId, label: String, kind: ElementKind) -> Self {
        Self {
            id,
            element_id: None,
            label,
            parent: None,
            pool_owner: None,
            to_be_rendered: true,
            visible: true,
            tags: BTreeSet::new(),
            widget: None,
            cur_shared_ref: None,
            kind,
        }
    }

    #[must_use]
    pub fn as_container(&self) -> Option<&Container> {
        match &self.kind {
            ElementKind::Container(container) => Some(container),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_part(&self) -> Option<&Part> {
        match &self.kind {
            ElementKind::Part(part) => Some(part),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_placeholder(&self) -> Option<&Placeholder> {
        match &self.kind {
            ElementKind::Placeholder(placeholder) => Some(placeholder),
            _ => None,
        }
    }

    #[must_use]
    pub fn role(&self) -> Option<ContainerRole> {
        self.as_container().map(|container| container.role)
    }

    #[must_use]
    pub fn is_part(&self) -> bool {
        matches!(self.kind, ElementKind::Part(_))
    }

    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self.kind, ElementKind::Container(_))
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, ElementKind::Placeholder(_))
    }

    /// Whether this element lives in a window's shared pool.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.pool_owner.is_some()
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.as_part().is_some_and(|part| part.dirty)
    }
}

/// Construction parameters for a new part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartSpec {
    pub element_id: Option<String>,
    pub label: String,
    pub tags: Vec<String>,
    pub closeable: bool,
    pub contribution_uri: Option<String>,
    pub input_uri: Option<String>,
    pub properties: BTreeMap<String, String>,
}

impl PartSpec {
    /// Part spec with the given element id, also used as the label.
    #[must_use]
    pub fn new(element_id: impl Into<String>) -> Self {
        let element_id = element_id.into();
        Self {
            label: element_id.clone(),
            element_id: Some(element_id),
            closeable: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_input_uri(mut self, uri: impl Into<String>) -> Self {
        self.input_uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.properties.insert(key.into(), value.into());
        self
    }
}

/// Structural change record emitted by every model mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "delta", rename_all = "snake_case")]
pub enum ModelDelta {
    ElementCreated {
        element: ElementId,
    },
    ChildAdded {
        container: ElementId,
        child: ElementId,
        index: usize,
    },
    ChildRemoved {
        container: ElementId,
        child: ElementId,
    },
    SelectionChanged {
        container: ElementId,
        old: Option<ElementId>,
        new: Option<ElementId>,
    },
    ToBeRenderedChanged {
        element: ElementId,
        value: bool,
    },
    VisibleChanged {
        element: ElementId,
        value: bool,
    },
    CurrentPlaceholderChanged {
        element: ElementId,
        old: Option<ElementId>,
        new: Option<ElementId>,
    },
    DirtyChanged {
        part: ElementId,
        dirty: bool,
    },
    TagAdded {
        element: ElementId,
        tag: String,
    },
    SharedElementAdded {
        window: ElementId,
        element: ElementId,
    },
    ElementDestroyed {
        element: ElementId,
    },
}

/// Arena-backed workbench model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbenchModel {
    pub(crate) root: ElementId,
    pub(crate) next_id: ElementId,
    pub(crate) nodes: BTreeMap<ElementId, ModelElement>,
    pub(crate) journal: Vec<ModelDelta>,
}

impl Default for WorkbenchModel {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbenchModel {
    /// Build a model holding only the application root.
    #[must_use]
    pub fn new() -> Self {
        let root = ElementId::MIN;
        let mut nodes = BTreeMap::new();
        let _ = nodes.insert(
            root,
            ModelElement::new(
                root,
                "application".to_string(),
                ElementKind::Container(Container::new(ContainerRole::Application)),
            ),
        );
        Self {
            root,
            next_id: ElementId(2),
            nodes,
            journal: Vec::new(),
        }
    }

    /// Application root ID.
    #[must_use]
    pub const fn root(&self) -> ElementId {
        self.root
    }

    /// Next ID the arena will hand out.
    #[must_use]
    pub const fn next_id(&self) -> ElementId {
        self.next_id
    }

    /// Number of live elements, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: ElementId) -> Option<&ModelElement> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ElementId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Lookup that reports a missing element as an error.
    pub fn element(&self, id: ElementId) -> Result<&ModelElement, ModelError> {
        self.nodes
            .get(&id)
            .ok_or(ModelError::MissingElement { element: id })
    }

    pub fn container(&self, id: ElementId) -> Result<&Container, ModelError> {
        self.element(id)?
            .as_container()
            .ok_or(ModelError::NotAContainer { element: id })
    }

    pub fn part(&self, id: ElementId) -> Result<&Part, ModelError> {
        self.element(id)?
            .as_part()
            .ok_or(ModelError::NotAPart { element: id })
    }

    /// Iterate elements in canonical ID order.
    pub fn elements(&self) -> impl Iterator<Item = &ModelElement> {
        self.nodes.values()
    }

    /// Children of a container; empty for leaves and unknown IDs.
    #[must_use]
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.get(id)
            .and_then(ModelElement::as_container)
            .map(|container| container.children.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn selected(&self, id: ElementId) -> Option<ElementId> {
        self.get(id)
            .and_then(ModelElement::as_container)
            .and_then(|container| container.selected)
    }

    #[must_use]
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.get(id).and_then(|element| element.parent)
    }

    /// Top-level windows in order.
    #[must_use]
    pub fn windows(&self) -> &[ElementId] {
        self.children(self.root)
    }

    /// The selected top-level window, falling back to the first one.
    #[must_use]
    pub fn active_window(&self) -> Option<ElementId> {
        self.selected(self.root)
            .or_else(|| self.windows().first().copied())
    }

    /// Resolve a placeholder to the element it stands for.
    #[must_use]
    pub fn resolve(&self, id: ElementId) -> ElementId {
        self.get(id)
            .and_then(ModelElement::as_placeholder)
            .map_or(id, |placeholder| placeholder.reference)
    }

    /// Whether `placeholder` is the one currently realizing its reference.
    #[must_use]
    pub fn is_current(&self, placeholder: ElementId) -> bool {
        let Some(reference) = self
            .get(placeholder)
            .and_then(ModelElement::as_placeholder)
            .map(|p| p.reference)
        else {
            return false;
        };
        self.get(reference)
            .is_some_and(|element| element.cur_shared_ref == Some(placeholder))
    }

    /// All placeholders referencing `shared`, in ID order.
    #[must_use]
    pub fn placeholders_for(&self, shared: ElementId) -> Vec<ElementId> {
        self.nodes
            .values()
            .filter(|element| {
                element
                    .as_placeholder()
                    .is_some_and(|placeholder| placeholder.reference == shared)
            })
            .map(|element| element.id)
            .collect()
    }

    /// Journal entries recorded since the last drain.
    #[must_use]
    pub fn deltas(&self) -> &[ModelDelta] {
        &self.journal
    }

    /// Take all journal entries.
    pub fn drain_deltas(&mut self) -> Vec<ModelDelta> {
        std::mem::take(&mut self.journal)
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    /// Create a top-level window under the application root.
    ///
    /// The first window becomes the selected window.
    pub fn create_window(&mut self, label: impl Into<String>) -> Result<ElementId, ModelError> {
        let id = self.allocate(
            label.into(),
            ElementKind::Container(Container::new(ContainerRole::Window)),
        )?;
        let root = self.root;
        self.attach(root, id, None)?;
        Ok(id)
    }

    /// Create a detached window owned by a window or perspective.
    pub fn create_detached_window(
        &mut self,
        owner: ElementId,
        label: impl Into<String>,
    ) -> Result<ElementId, ModelError> {
        let owner_role = self.container(owner)?.role;
        if !owner_role.owns_windows() {
            return Err(ModelError::InvalidPlacement {
                container: owner,
                child: None,
                reason: "only windows and perspectives own detached windows",
            });
        }
        let id = self.allocate(
            label.into(),
            ElementKind::Container(Container::new(ContainerRole::DetachedWindow)),
        )?;
        let windows = &mut self.container_mut(owner)?.windows;
        windows.push(id);
        let index = windows.len() - 1;
        self.element_mut(id)?.parent = Some(owner);
        self.journal.push(ModelDelta::ChildAdded {
            container: owner,
            child: id,
            index,
        });
        Ok(id)
    }

    /// Create an unattached container.
    pub fn create_container(
        &mut self,
        role: ContainerRole,
        label: impl Into<String>,
    ) -> Result<ElementId, ModelError> {
        if matches!(role, ContainerRole::Application) || role.is_window() {
            return Err(ModelError::InvalidRole { role });
        }
        self.allocate(label.into(), ElementKind::Container(Container::new(role)))
    }

    /// Create a container and append it to `parent`.
    pub fn create_child_container(
        &mut self,
        parent: ElementId,
        role: ContainerRole,
        label: impl Into<String>,
    ) -> Result<ElementId, ModelError> {
        let id = self.create_container(role, label)?;
        if let Err(err) = self.add_child(parent, id) {
            let _ = self.nodes.remove(&id);
            return Err(err);
        }
        Ok(id)
    }

    /// Create an unattached part.
    pub fn create_part(&mut self, spec: PartSpec) -> Result<ElementId, ModelError> {
        let PartSpec {
            element_id,
            label,
            tags,
            closeable,
            contribution_uri,
            input_uri,
            properties,
        } = spec;
        let id = self.allocate(
            label,
            ElementKind::Part(Part {
                dirty: false,
                closeable,
                contribution: None,
                last_activation: 0,
                contribution_uri,
                input_uri,
                properties,
                menus: Vec::new(),
                toolbar: None,
            }),
        )?;
        let element = self.element_mut(id)?;
        element.element_id = element_id;
        element.tags = tags.into_iter().collect();
        Ok(id)
    }

    /// Create an unattached placeholder for a pooled shared element.
    ///
    /// The placeholder copies the reference's element id and label.
    pub fn create_placeholder(&mut self, reference: ElementId) -> Result<ElementId, ModelError> {
        let target = self.element(reference)?;
        if !target.is_shared() {
            return Err(ModelError::InvalidPlacement {
                container: reference,
                child: None,
                reason: "placeholders may only reference shared elements",
            });
        }
        let element_id = target.element_id.clone();
        let label = target.label.clone();
        let id = self.allocate(label, ElementKind::Placeholder(Placeholder { reference }))?;
        self.element_mut(id)?.element_id = element_id;
        Ok(id)
    }

    /// Create a main menu for a window.
    pub fn create_main_menu(
        &mut self,
        window: ElementId,
        label: impl Into<String>,
    ) -> Result<ElementId, ModelError> {
        if !self.container(window)?.role.is_window() {
            return Err(ModelError::InvalidPlacement {
                container: window,
                child: None,
                reason: "main menus belong to windows",
            });
        }
        let id = self.allocate(label.into(), ElementKind::Container(Container::new(ContainerRole::Menu)))?;
        self.container_mut(window)?.main_menu = Some(id);
        self.element_mut(id)?.parent = Some(window);
        Ok(id)
    }

    /// Create a menu or toolbar for a part.
    pub fn create_part_menu(
        &mut self,
        part: ElementId,
        role: ContainerRole,
        label: impl Into<String>,
    ) -> Result<ElementId, ModelError> {
        if !role.is_menu() {
            return Err(ModelError::InvalidRole { role });
        }
        let _ = self.part(part)?;
        let id = self.allocate(label.into(), ElementKind::Container(Container::new(role)))?;
        let ElementKind::Part(payload) = &mut self.element_mut(part)?.kind else {
            return Err(ModelError::NotAPart { element: part });
        };
        if role == ContainerRole::ToolBar {
            payload.toolbar = Some(id);
        } else {
            payload.menus.push(id);
        }
        self.element_mut(id)?.parent = Some(part);
        Ok(id)
    }

    /// Create an item and append it to a menu or toolbar.
    pub fn create_item(
        &mut self,
        menu: ElementId,
        label: impl Into<String>,
        command: Option<String>,
    ) -> Result<ElementId, ModelError> {
        let id = self.allocate(label.into(), ElementKind::Item(Item { command }))?;
        if let Err(err) = self.add_child(menu, id) {
            let _ = self.nodes.remove(&id);
            return Err(err);
        }
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------------

    /// Append `child` to `container`.
    ///
    /// Single-child containers with no selection select the new child when
    /// it is to be rendered.
    pub fn add_child(&mut self, container: ElementId, child: ElementId) -> Result<(), ModelError> {
        self.attach(container, child, None)
    }

    /// Insert `child` into `container` at `index` (clamped).
    pub fn insert_child(
        &mut self,
        container: ElementId,
        index: usize,
        child: ElementId,
    ) -> Result<(), ModelError> {
        self.attach(container, child, Some(index))
    }

    /// Detach `child` from `container`, returning its former index.
    ///
    /// Clears the selection when it pointed at `child`.
    pub fn remove_child(&mut self, container: ElementId, child: ElementId) -> Result<usize, ModelError> {
        let payload = self.container(container)?;
        let Some(index) = payload.children.iter().position(|c| *c == child) else {
            return Err(ModelError::NotAChild { container, child });
        };
        if payload.selected == Some(child) {
            self.set_selected(container, None)?;
        }
        let _ = self.container_mut(container)?.children.remove(index);
        self.element_mut(child)?.parent = None;
        self.journal.push(ModelDelta::ChildRemoved { container, child });
        Ok(index)
    }

    /// Set (or clear) a container's selected child.
    pub fn set_selected(
        &mut self,
        container: ElementId,
        child: Option<ElementId>,
    ) -> Result<(), ModelError> {
        let payload = self.container(container)?;
        if let Some(child) = child.filter(|child| !payload.children.contains(child)) {
            return Err(ModelError::NotAChild { container, child });
        }
        let old = payload.selected;
        if old == child {
            return Ok(());
        }
        self.container_mut(container)?.selected = child;
        self.journal.push(ModelDelta::SelectionChanged {
            container,
            old,
            new: child,
        });
        Ok(())
    }

    /// Put an unattached element into a window's shared pool.
    pub fn add_shared_element(&mut self, window: ElementId, element: ElementId) -> Result<(), ModelError> {
        if !self.container(window)?.role.is_window() {
            return Err(ModelError::InvalidPlacement {
                container: window,
                child: Some(element),
                reason: "shared elements belong to windows",
            });
        }
        let target = self.element(element)?;
        if target.parent.is_some() || target.pool_owner.is_some() {
            return Err(ModelError::AlreadyAttached { element });
        }
        if !(target.is_part() || target.is_container()) || target.role().is_some_and(ContainerRole::is_window) {
            return Err(ModelError::InvalidPlacement {
                container: window,
                child: Some(element),
                reason: "only parts and layout containers can be shared",
            });
        }
        self.container_mut(window)?.shared_elements.push(element);
        self.element_mut(element)?.pool_owner = Some(window);
        self.journal.push(ModelDelta::SharedElementAdded { window, element });
        Ok(())
    }

    /// Re-point the placeholder currently realizing a shared element.
    pub fn set_current_placeholder(
        &mut self,
        shared: ElementId,
        placeholder: Option<ElementId>,
    ) -> Result<(), ModelError> {
        let _ = self.element(shared)?;
        if let Some(placeholder) = placeholder {
            let reference = self
                .element(placeholder)?
                .as_placeholder()
                .ok_or(ModelError::NotAPlaceholder { element: placeholder })?
                .reference;
            if reference != shared {
                return Err(ModelError::PlaceholderMismatch {
                    placeholder,
                    element: shared,
                });
            }
        }
        let element = self.element_mut(shared)?;
        let old = element.cur_shared_ref;
        if old == placeholder {
            return Ok(());
        }
        element.cur_shared_ref = placeholder;
        self.journal.push(ModelDelta::CurrentPlaceholderChanged {
            element: shared,
            old,
            new: placeholder,
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Flags
    // ---------------------------------------------------------------------

    pub fn set_to_be_rendered(&mut self, id: ElementId, value: bool) -> Result<(), ModelError> {
        let element = self.element_mut(id)?;
        if element.to_be_rendered == value {
            return Ok(());
        }
        element.to_be_rendered = value;
        self.journal
            .push(ModelDelta::ToBeRenderedChanged { element: id, value });
        Ok(())
    }

    pub fn set_visible(&mut self, id: ElementId, value: bool) -> Result<(), ModelError> {
        let element = self.element_mut(id)?;
        if element.visible == value {
            return Ok(());
        }
        element.visible = value;
        self.journal.push(ModelDelta::VisibleChanged { element: id, value });
        Ok(())
    }

    pub fn set_dirty(&mut self, part: ElementId, dirty: bool) -> Result<(), ModelError> {
        let payload = self.part_mut(part)?;
        if payload.dirty == dirty {
            return Ok(());
        }
        payload.dirty = dirty;
        self.journal.push(ModelDelta::DirtyChanged { part, dirty });
        Ok(())
    }

    pub fn add_tag(&mut self, id: ElementId, tag: impl Into<String>) -> Result<(), ModelError> {
        let tag = tag.into();
        if self.element_mut(id)?.tags.insert(tag.clone()) {
            self.journal.push(ModelDelta::TagAdded { element: id, tag });
        }
        Ok(())
    }

    pub fn set_label(&mut self, id: ElementId, label: impl Into<String>) -> Result<(), ModelError> {
        self.element_mut(id)?.label = label.into();
        Ok(())
    }

    pub fn set_element_id(&mut self, id: ElementId, element_id: Option<String>) -> Result<(), ModelError> {
        self.element_mut(id)?.element_id = element_id;
        Ok(())
    }

    // Renderer bookkeeping; not journaled.

    pub fn set_widget(&mut self, id: ElementId, widget: Option<WidgetHandle>) -> Result<(), ModelError> {
        self.element_mut(id)?.widget = widget;
        Ok(())
    }

    pub fn set_contribution(
        &mut self,
        part: ElementId,
        contribution: Option<ContributionHandle>,
    ) -> Result<(), ModelError> {
        self.part_mut(part)?.contribution = contribution;
        Ok(())
    }

    pub fn set_last_activation(&mut self, part: ElementId, tick: u64) -> Result<(), ModelError> {
        self.part_mut(part)?.last_activation = tick;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Destruction
    // ---------------------------------------------------------------------

    /// Remove an element and its whole subtree from the arena.
    ///
    /// Refused while a placeholder outside the removed subtree still
    /// references an element inside it.
    pub fn destroy(&mut self, id: ElementId) -> Result<(), ModelError> {
        if id == self.root {
            return Err(ModelError::CannotDestroyRoot);
        }
        let _ = self.element(id)?;

        let mut doomed = Vec::new();
        self.collect_subtree(id, &mut doomed);
        let doomed_set: BTreeSet<ElementId> = doomed.iter().copied().collect();

        for element in &doomed {
            let live_refs = self
                .placeholders_for(*element)
                .into_iter()
                .filter(|placeholder| !doomed_set.contains(placeholder))
                .count();
            if live_refs > 0 {
                return Err(ModelError::StillReferenced {
                    element: *element,
                    placeholders: live_refs,
                });
            }
        }

        self.detach_from_owner(id)?;

        for element in doomed {
            if let Some(placeholder) = self.get(element).and_then(ModelElement::as_placeholder) {
                let reference = placeholder.reference;
                if self
                    .get(reference)
                    .is_some_and(|target| target.cur_shared_ref == Some(element))
                {
                    self.set_current_placeholder(reference, None)?;
                }
            }
            let _ = self.nodes.remove(&element);
            self.journal.push(ModelDelta::ElementDestroyed { element });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn allocate(&mut self, label: String, kind: ElementKind) -> Result<ElementId, ModelError> {
        let id = self.next_id;
        self.next_id = id.checked_next()?;
        let _ = self.nodes.insert(id, ModelElement::new(id, label, kind));
        self.journal.push(ModelDelta::ElementCreated { element: id });
        Ok(id)
    }

    fn element_mut(&mut self, id: ElementId) -> Result<&mut ModelElement, ModelError> {
        self.nodes
            .get_mut(&id)
            .ok_or(ModelError::MissingElement { element: id })
    }

    fn container_mut(&mut self, id: ElementId) -> Result<&mut Container, ModelError> {
        match &mut self.element_mut(id)?.kind {
            ElementKind::Container(container) => Ok(container),
            _ => Err(ModelError::NotAContainer { element: id }),
        }
    }

    fn part_mut(&mut self, id: ElementId) -> Result<&mut Part, ModelError> {
        match &mut self.element_mut(id)?.kind {
            ElementKind::Part(part) => Ok(part),
            _ => Err(ModelError::NotAPart { element: id }),
        }
    }

    fn attach(
        &mut self,
        container: ElementId,
        child: ElementId,
        index: Option<usize>,
    ) -> Result<(), ModelError> {
        let role = self.container(container)?.role;
        let target = self.element(child)?;
        if target.parent.is_some() || target.pool_owner.is_some() {
            return Err(ModelError::AlreadyAttached { element: child });
        }
        check_placement(container, role, target)?;
        if container == child || self.is_ancestor(child, container) {
            return Err(ModelError::WouldCreateCycle {
                ancestor: child,
                descendant: container,
            });
        }
        let to_be_rendered = target.to_be_rendered;

        let payload = self.container_mut(container)?;
        let index = index.map_or(payload.children.len(), |i| i.min(payload.children.len()));
        payload.children.insert(index, child);
        let auto_select = role.shows_single_child() && payload.selected.is_none() && to_be_rendered;
        self.element_mut(child)?.parent = Some(container);
        self.journal.push(ModelDelta::ChildAdded {
            container,
            child,
            index,
        });
        if auto_select || (role == ContainerRole::Application && self.selected(container).is_none()) {
            self.set_selected(container, Some(child))?;
        }
        Ok(())
    }

    /// Whether `ancestor` sits on the structural parent chain of `element`.
    fn is_ancestor(&self, ancestor: ElementId, element: ElementId) -> bool {
        let mut current = self.parent(element);
        let mut budget = self.nodes.len();
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if budget == 0 {
                return false;
            }
            budget -= 1;
            current = self.parent(id);
        }
        false
    }

    fn collect_subtree(&self, id: ElementId, out: &mut Vec<ElementId>) {
        let Some(element) = self.get(id) else {
            return;
        };
        if out.contains(&id) {
            return;
        }
        out.push(id);
        match &element.kind {
            ElementKind::Container(container) => {
                let nested = container
                    .children
                    .iter()
                    .chain(&container.windows)
                    .chain(&container.shared_elements)
                    .chain(container.main_menu.iter())
                    .copied()
                    .collect::<Vec<_>>();
                for child in nested {
                    self.collect_subtree(child, out);
                }
            }
            ElementKind::Part(part) => {
                let nested = part
                    .menus
                    .iter()
                    .chain(part.toolbar.iter())
                    .copied()
                    .collect::<Vec<_>>();
                for child in nested {
                    self.collect_subtree(child, out);
                }
            }
            ElementKind::Placeholder(_) | ElementKind::Item(_) => {}
        }
    }

    fn detach_from_owner(&mut self, id: ElementId) -> Result<(), ModelError> {
        let element = self.element(id)?;
        if let Some(window) = element.pool_owner {
            self.container_mut(window)?
                .shared_elements
                .retain(|member| *member != id);
            self.element_mut(id)?.pool_owner = None;
        }
        let Some(parent) = self.element(id)?.parent else {
            return Ok(());
        };
        if self.children(parent).contains(&id) {
            let _ = self.remove_child(parent, id)?;
            return Ok(());
        }
        match &mut self.element_mut(parent)?.kind {
            ElementKind::Container(container) => {
                container.windows.retain(|window| *window != id);
                if container.main_menu == Some(id) {
                    container.main_menu = None;
                }
            }
            ElementKind::Part(part) => {
                part.menus.retain(|menu| *menu != id);
                if part.toolbar == Some(id) {
                    part.toolbar = None;
                }
            }
            ElementKind::Placeholder(_) | ElementKind::Item(_) => {}
        }
        self.element_mut(id)?.parent = None;
        self.journal.push(ModelDelta::ChildRemoved {
            container: parent,
            child: id,
        });
        Ok(())
    }
}

fn check_placement(
    container: ElementId,
    role: ContainerRole,
    child: &ModelElement,
) -> Result<(), ModelError> {
    let child_role = child.role();
    let reason = match (role, &child.kind) {
        (ContainerRole::Application, _) if child_role != Some(ContainerRole::Window) => {
            Some("the application only holds top-level windows")
        }
        (_, _) if child_role.is_some_and(ContainerRole::is_window) && role != ContainerRole::Application => {
            Some("windows are created through create_window or create_detached_window")
        }
        (ContainerRole::PerspectiveStack, _) if child_role != Some(ContainerRole::Perspective) => {
            Some("perspective stacks only hold perspectives")
        }
        (_, _) if child_role == Some(ContainerRole::Perspective) && role != ContainerRole::PerspectiveStack => {
            Some("perspectives live in perspective stacks")
        }
        (ContainerRole::Menu | ContainerRole::ToolBar, ElementKind::Item(_)) => None,
        (ContainerRole::Menu, ElementKind::Container(nested)) if nested.role == ContainerRole::Menu => None,
        (ContainerRole::Menu | ContainerRole::ToolBar, _) => Some("menus only hold items and submenus"),
        (_, ElementKind::Item(_)) => Some("items belong in menus and toolbars"),
        _ => None,
    };
    match reason {
        Some(reason) => Err(ModelError::InvalidPlacement {
            container,
            child: Some(child.id),
            reason,
        }),
        None => Ok(()),
    }
}

/// Model construction and mutation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    ZeroElementId,
    ElementIdOverflow {
        current: ElementId,
    },
    MissingElement {
        element: ElementId,
    },
    NotAContainer {
        element: ElementId,
    },
    NotAPart {
        element: ElementId,
    },
    NotAPlaceholder {
        element: ElementId,
    },
    NotAChild {
        container: ElementId,
        child: ElementId,
    },
    AlreadyAttached {
        element: ElementId,
    },
    WouldCreateCycle {
        ancestor: ElementId,
        descendant: ElementId,
    },
    InvalidPlacement {
        container: ElementId,
        child: Option<ElementId>,
        reason: &'static str,
    },
    InvalidRole {
        role: ContainerRole,
    },
    PlaceholderMismatch {
        placeholder: ElementId,
        element: ElementId,
    },
    StillReferenced {
        element: ElementId,
        placeholders: usize,
    },
    CannotDestroyRoot,
    UnsupportedSchemaVersion {
        version: u16,
    },
    DuplicateElementId {
        element: ElementId,
    },
    InvalidSnapshot {
        issue_count: usize,
        first_issue: String,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroElementId => write!(f, "element id 0 is reserved"),
            Self::ElementIdOverflow { current } => {
                write!(f, "element id overflow after {current}")
            }
            Self::MissingElement { element } => write!(f, "element {element} not found"),
            Self::NotAContainer { element } => write!(f, "element {element} is not a container"),
            Self::NotAPart { element } => write!(f, "element {element} is not a part"),
            Self::NotAPlaceholder { element } => {
                write!(f, "element {element} is not a placeholder")
            }
            Self::NotAChild { container, child } => {
                write!(f, "element {child} is not a child of {container}")
            }
            Self::AlreadyAttached { element } => {
                write!(f, "element {element} already has an owner")
            }
            Self::WouldCreateCycle {
                ancestor,
                descendant,
            } => write!(
                f,
                "operation would create cycle: {ancestor} is an ancestor of {descendant}"
            ),
            Self::InvalidPlacement {
                container,
                child,
                reason,
            } => match child {
                Some(child) => write!(f, "cannot place {child} in {container}: {reason}"),
                None => write!(f, "invalid placement at {container}: {reason}"),
            },
            Self::InvalidRole { role } => write!(f, "role {role:?} is not valid here"),
            Self::PlaceholderMismatch {
                placeholder,
                element,
            } => write!(f, "placeholder {placeholder} does not reference {element}"),
            Self::StillReferenced {
                element,
                placeholders,
            } => write!(
                f,
                "shared element {element} is still referenced by {placeholders} placeholder(s)"
            ),
            Self::CannotDestroyRoot => write!(f, "the application root cannot be destroyed"),
            Self::UnsupportedSchemaVersion { version } => {
                write!(f, "unsupported model schema version {version}")
            }
            Self::DuplicateElementId { element } => {
                write!(f, "duplicate element id {element} in snapshot")
            }
            Self::InvalidSnapshot {
                issue_count,
                first_issue,
            } => write!(
                f,
                "snapshot failed validation with {issue_count} issue(s), first: {first_issue}"
            ),
        }
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with_stack() -> (WorkbenchModel, ElementId, ElementId) {
        let mut model = WorkbenchModel::new();
        let window = model.create_window("main").expect("window");
        let stack = model
            .create_child_container(window, ContainerRole::Stack, "stack")
            .expect("stack");
        (model, window, stack)
    }

    #[test]
    fn zero_id_is_rejected() {
        assert_eq!(ElementId::new(0), Err(ModelError::ZeroElementId));
        assert_eq!(ElementId::new(7).map(ElementId::get), Ok(7));
    }

    #[test]
    fn first_window_becomes_selected() {
        let mut model = WorkbenchModel::new();
        let first = model.create_window("one").expect("window");
        let _second = model.create_window("two").expect("window");
        assert_eq!(model.active_window(), Some(first));
        assert_eq!(model.windows().len(), 2);
    }

    #[test]
    fn stack_auto_selects_first_rendered_child() {
        let (mut model, _, stack) = window_with_stack();
        let hidden = model.create_part(PartSpec::new("hidden")).expect("part");
        model.set_to_be_rendered(hidden, false).expect("flag");
        model.add_child(stack, hidden).expect("add");
        assert_eq!(model.selected(stack), None);

        let shown = model.create_part(PartSpec::new("shown")).expect("part");
        model.add_child(stack, shown).expect("add");
        assert_eq!(model.selected(stack), Some(shown));
    }

    #[test]
    fn selection_must_be_a_child() {
        let (mut model, _, stack) = window_with_stack();
        let stray = model.create_part(PartSpec::new("stray")).expect("part");
        assert_eq!(
            model.set_selected(stack, Some(stray)),
            Err(ModelError::NotAChild {
                container: stack,
                child: stray
            })
        );
    }

    #[test]
    fn removing_selected_child_clears_selection() {
        let (mut model, _, stack) = window_with_stack();
        let part = model.create_part(PartSpec::new("a")).expect("part");
        model.add_child(stack, part).expect("add");
        assert_eq!(model.remove_child(stack, part), Ok(0));
        assert_eq!(model.selected(stack), None);
        assert_eq!(model.parent(part), None);
    }

    #[test]
    fn double_attach_is_rejected() {
        let (mut model, window, stack) = window_with_stack();
        let other = model
            .create_child_container(window, ContainerRole::Stack, "other")
            .expect("stack");
        let part = model.create_part(PartSpec::new("a")).expect("part");
        model.add_child(stack, part).expect("add");
        assert_eq!(
            model.add_child(other, part),
            Err(ModelError::AlreadyAttached { element: part })
        );
    }

    #[test]
    fn cycles_are_rejected() {
        let (mut model, _, stack) = window_with_stack();
        let sash = model.create_container(ContainerRole::Sash, "sash").expect("sash");
        let inner = model
            .create_child_container(sash, ContainerRole::Stack, "inner")
            .expect("inner");
        assert!(matches!(
            model.add_child(inner, sash),
            Err(ModelError::WouldCreateCycle { .. })
        ));
        assert!(matches!(
            model.add_child(sash, sash),
            Err(ModelError::WouldCreateCycle { .. })
        ));
        model.add_child(stack, sash).expect("nested layout");
    }

    #[test]
    fn perspectives_only_in_perspective_stacks() {
        let (mut model, window, stack) = window_with_stack();
        let perspective = model
            .create_container(ContainerRole::Perspective, "p")
            .expect("perspective");
        assert!(matches!(
            model.add_child(stack, perspective),
            Err(ModelError::InvalidPlacement { .. })
        ));
        let pstack = model
            .create_child_container(window, ContainerRole::PerspectiveStack, "ps")
            .expect("pstack");
        model.add_child(pstack, perspective).expect("perspective");
        assert_eq!(model.selected(pstack), Some(perspective));
    }

    #[test]
    fn current_placeholder_must_reference_the_element() {
        let (mut model, window, stack) = window_with_stack();
        let shared = model.create_part(PartSpec::new("shared")).expect("part");
        model.add_shared_element(window, shared).expect("pool");
        let other = model.create_part(PartSpec::new("other")).expect("part");
        model.add_shared_element(window, other).expect("pool");
        let placeholder = model.create_placeholder(shared).expect("placeholder");
        model.add_child(stack, placeholder).expect("add");

        assert_eq!(
            model.set_current_placeholder(other, Some(placeholder)),
            Err(ModelError::PlaceholderMismatch {
                placeholder,
                element: other
            })
        );
        model
            .set_current_placeholder(shared, Some(placeholder))
            .expect("repoint");
        assert!(model.is_current(placeholder));
        assert_eq!(model.resolve(placeholder), shared);
        assert_eq!(model.get(placeholder).and_then(|p| p.element_id.clone()), Some("shared".into()));
    }

    #[test]
    fn destroy_refuses_referenced_shared_elements() {
        let (mut model, window, stack) = window_with_stack();
        let shared = model.create_part(PartSpec::new("shared")).expect("part");
        model.add_shared_element(window, shared).expect("pool");
        let placeholder = model.create_placeholder(shared).expect("placeholder");
        model.add_child(stack, placeholder).expect("add");
        model
            .set_current_placeholder(shared, Some(placeholder))
            .expect("repoint");

        assert_eq!(
            model.destroy(shared),
            Err(ModelError::StillReferenced {
                element: shared,
                placeholders: 1
            })
        );

        model.destroy(placeholder).expect("destroy placeholder");
        assert!(!model.contains(placeholder));
        assert_eq!(model.get(shared).and_then(|s| s.cur_shared_ref), None);
        model.destroy(shared).expect("destroy shared");
        assert!(model.container(window).expect("window").shared_elements.is_empty());
    }

    #[test]
    fn destroy_window_removes_everything_below_it() {
        let (mut model, window, stack) = window_with_stack();
        let part = model.create_part(PartSpec::new("a")).expect("part");
        model.add_child(stack, part).expect("add");
        let detached = model.create_detached_window(window, "float").expect("detached");
        let before = model.len();
        model.destroy(window).expect("destroy");
        assert_eq!(model.len(), before - 4);
        assert!(!model.contains(detached));
        assert!(model.windows().is_empty());
        assert_eq!(model.active_window(), None);
    }

    #[test]
    fn mutations_are_journaled() {
        let (mut model, _, stack) = window_with_stack();
        let _ = model.drain_deltas();
        let part = model.create_part(PartSpec::new("a")).expect("part");
        model.add_child(stack, part).expect("add");
        model.set_dirty(part, true).expect("dirty");
        model.set_dirty(part, true).expect("dirty twice");
        let deltas = model.drain_deltas();
        assert_eq!(
            deltas,
            vec![
                ModelDelta::ElementCreated { element: part },
                ModelDelta::ChildAdded {
                    container: stack,
                    child: part,
                    index: 0
                },
                ModelDelta::SelectionChanged {
                    container: stack,
                    old: None,
                    new: Some(part)
                },
                ModelDelta::DirtyChanged { part, dirty: true },
            ]
        );
        assert!(model.deltas().is_empty());
    }

    #[test]
    fn part_menus_hang_off_their_part() {
        let (mut model, _, stack) = window_with_stack();
        let part = model.create_part(PartSpec::new("a")).expect("part");
        model.add_child(stack, part).expect("add");
        let menu = model
            .create_part_menu(part, ContainerRole::Menu, "view menu")
            .expect("menu");
        let item = model
            .create_item(menu, "Refresh", Some("refresh".into()))
            .expect("item");
        assert_eq!(model.parent(menu), Some(part));
        assert_eq!(model.children(menu), &[item]);
        assert!(model.create_item(stack, "bad", None).is_err());
    }
}
