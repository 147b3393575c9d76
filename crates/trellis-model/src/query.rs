//! Depth-first filtered model search.
//!
//! [`find`] walks the ownership tree from a root in pre-order and reports the
//! elements matching an [`ElementFilter`]. [`SearchScope`] flags decide which
//! regions of the tree may contribute results: content outside perspectives,
//! the selected or unselected perspectives, shared content reached through
//! placeholders, the window main menu, and per-part menus and toolbars.
//!
//! Regions gate *emission*, not traversal: a search can pass through an
//! unselected perspective to reach nothing, but a placeholder in the selected
//! perspective still yields its shared element.

use bitflags::bitflags;
use rustc_hash::FxHashSet;

use crate::model::{ContainerRole, ElementId, ElementKind, ModelElement, WorkbenchModel};

bitflags! {
    /// Regions a search may report from.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SearchScope: u8 {
        const OUTSIDE_PERSPECTIVE      = 0b0000_0001;
        const IN_ACTIVE_PERSPECTIVE    = 0b0000_0010;
        const IN_INACTIVE_PERSPECTIVES = 0b0000_0100;
        /// Follow placeholders into the shared elements they reference.
        const IN_SHARED_AREA           = 0b0000_1000;
        const IN_MAIN_MENU             = 0b0001_0000;
        /// Part menus and toolbars.
        const IN_PART                  = 0b0010_0000;

        const IN_ANY_PERSPECTIVE = Self::IN_ACTIVE_PERSPECTIVE.bits()
            | Self::IN_INACTIVE_PERSPECTIVES.bits();
        /// Everything currently arranged on screen.
        const PRESENTATION = Self::OUTSIDE_PERSPECTIVE.bits()
            | Self::IN_ACTIVE_PERSPECTIVE.bits()
            | Self::IN_SHARED_AREA.bits();
        const ANYWHERE = Self::OUTSIDE_PERSPECTIVE.bits()
            | Self::IN_ANY_PERSPECTIVE.bits()
            | Self::IN_SHARED_AREA.bits();
    }
}

impl Default for SearchScope {
    fn default() -> Self {
        Self::ANYWHERE
    }
}

/// Element type selector for [`ElementFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Part,
    Placeholder,
    Item,
    /// Any container.
    Container,
    /// Containers with a specific role.
    Role(ContainerRole),
}

impl ElementType {
    #[must_use]
    pub fn matches(self, element: &ModelElement) -> bool {
        match (self, &element.kind) {
            (Self::Part, ElementKind::Part(_))
            | (Self::Placeholder, ElementKind::Placeholder(_))
            | (Self::Item, ElementKind::Item(_))
            | (Self::Container, ElementKind::Container(_)) => true,
            (Self::Role(role), ElementKind::Container(container)) => container.role == role,
            _ => false,
        }
    }
}

/// Conjunctive element filter; empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementFilter {
    pub element_id: Option<String>,
    pub element_type: Option<ElementType>,
    /// Every tag must be present.
    pub tags: Vec<String>,
}

impl ElementFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, element_type: ElementType) -> Self {
        self.element_type = Some(element_type);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn matches(&self, element: &ModelElement) -> bool {
        if let Some(id) = &self.element_id
            && element.element_id.as_deref() != Some(id.as_str())
        {
            return false;
        }
        if let Some(element_type) = self.element_type
            && !element_type.matches(element)
        {
            return false;
        }
        self.tags.iter().all(|tag| element.has_tag(tag))
    }
}

/// Search the model below (and including) `root`.
#[must_use]
pub fn find(
    model: &WorkbenchModel,
    root: ElementId,
    filter: &ElementFilter,
    scope: SearchScope,
) -> Vec<ElementId> {
    let mut search = Search {
        model,
        filter,
        scope,
        visited: FxHashSet::default(),
        emitted: FxHashSet::default(),
        out: Vec::new(),
    };
    let allowed = if inside_perspective(model, root) {
        true
    } else {
        scope.contains(SearchScope::OUTSIDE_PERSPECTIVE)
    };
    search.visit(root, allowed);
    search.out
}

/// First match of [`find`], if any.
#[must_use]
pub fn find_first(
    model: &WorkbenchModel,
    root: ElementId,
    filter: &ElementFilter,
    scope: SearchScope,
) -> Option<ElementId> {
    find(model, root, filter, scope).into_iter().next()
}

/// Whether `element` sits below `container` through children, detached
/// windows, or placeholder references.
#[must_use]
pub fn contains(model: &WorkbenchModel, container: ElementId, element: ElementId) -> bool {
    let mut seen = FxHashSet::default();
    let mut stack = vec![container];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(node) = model.get(id) else {
            continue;
        };
        match &node.kind {
            ElementKind::Container(payload) => {
                for child in payload.children.iter().chain(&payload.windows) {
                    if *child == element {
                        return true;
                    }
                    stack.push(*child);
                }
            }
            ElementKind::Placeholder(placeholder) => {
                if placeholder.reference == element {
                    return true;
                }
                stack.push(placeholder.reference);
            }
            ElementKind::Part(_) | ElementKind::Item(_) => {}
        }
    }
    false
}

fn inside_perspective(model: &WorkbenchModel, element: ElementId) -> bool {
    let mut current = Some(element);
    let mut budget = model.len();
    while let Some(id) = current {
        let Some(node) = model.get(id) else {
            return false;
        };
        if node.role() == Some(ContainerRole::Perspective) {
            return true;
        }
        if budget == 0 {
            return false;
        }
        budget -= 1;
        current = node.parent;
    }
    false
}

struct Search<'a> {
    model: &'a WorkbenchModel,
    filter: &'a ElementFilter,
    scope: SearchScope,
    visited: FxHashSet<(ElementId, bool)>,
    emitted: FxHashSet<ElementId>,
    out: Vec<ElementId>,
}

impl Search<'_> {
    fn visit(&mut self, id: ElementId, allowed: bool) {
        let Some(node) = self.model.get(id) else {
            return;
        };
        let allowed = match node.role() {
            Some(ContainerRole::Perspective) => {
                let selected = node
                    .parent
                    .is_some_and(|stack| self.model.selected(stack) == Some(id));
                if selected {
                    self.scope.contains(SearchScope::IN_ACTIVE_PERSPECTIVE)
                } else {
                    self.scope.contains(SearchScope::IN_INACTIVE_PERSPECTIVES)
                }
            }
            _ => allowed,
        };
        if !self.visited.insert((id, allowed)) {
            return;
        }
        if allowed && self.filter.matches(node) && self.emitted.insert(id) {
            self.out.push(id);
        }

        match &node.kind {
            ElementKind::Container(container) => {
                for child in &container.children {
                    self.visit(*child, allowed);
                }
                for window in &container.windows {
                    self.visit(*window, allowed);
                }
                if let Some(menu) = container.main_menu
                    && self.scope.contains(SearchScope::IN_MAIN_MENU)
                {
                    self.visit(menu, true);
                }
            }
            ElementKind::Placeholder(placeholder) => {
                if self.scope.contains(SearchScope::IN_SHARED_AREA) {
                    self.visit(placeholder.reference, allowed);
                }
            }
            ElementKind::Part(part) => {
                if self.scope.contains(SearchScope::IN_PART) {
                    for menu in part.menus.iter().chain(part.toolbar.iter()) {
                        self.visit(*menu, allowed);
                    }
                }
            }
            ElementKind::Item(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartSpec;

    struct Fixture {
        model: WorkbenchModel,
        window: ElementId,
        outside: ElementId,
        p1_part: ElementId,
        p2_part: ElementId,
        shared: ElementId,
        menu_item: ElementId,
    }

    fn fixture() -> Fixture {
        let mut model = WorkbenchModel::new();
        let window = model.create_window("main").expect("window");
        let sash = model
            .create_child_container(window, ContainerRole::Sash, "sash")
            .expect("sash");
        let side = model
            .create_child_container(sash, ContainerRole::Stack, "side")
            .expect("side");
        let outside = model
            .create_part(PartSpec::new("outline").with_tag("view"))
            .expect("outline");
        model.add_child(side, outside).expect("add");
        let pstack = model
            .create_child_container(sash, ContainerRole::PerspectiveStack, "ps")
            .expect("pstack");
        let p1 = model
            .create_child_container(pstack, ContainerRole::Perspective, "p1")
            .expect("p1");
        let p2 = model
            .create_child_container(pstack, ContainerRole::Perspective, "p2")
            .expect("p2");
        let s1 = model
            .create_child_container(p1, ContainerRole::Stack, "s1")
            .expect("s1");
        let s2 = model
            .create_child_container(p2, ContainerRole::Stack, "s2")
            .expect("s2");
        let p1_part = model
            .create_part(PartSpec::new("console").with_tag("view"))
            .expect("console");
        model.add_child(s1, p1_part).expect("add");
        let p2_part = model.create_part(PartSpec::new("console")).expect("console");
        model.add_child(s2, p2_part).expect("add");

        let shared = model.create_part(PartSpec::new("editor")).expect("editor");
        model.add_shared_element(window, shared).expect("pool");
        for stack in [s1, s2] {
            let placeholder = model.create_placeholder(shared).expect("placeholder");
            model.add_child(stack, placeholder).expect("add");
        }
        let menu = model
            .create_part_menu(p1_part, ContainerRole::Menu, "menu")
            .expect("menu");
        let menu_item = model.create_item(menu, "Clear", None).expect("item");

        Fixture {
            model,
            window,
            outside,
            p1_part,
            p2_part,
            shared,
            menu_item,
        }
    }

    fn parts() -> ElementFilter {
        ElementFilter::new().with_type(ElementType::Part)
    }

    #[test]
    fn presentation_scope_skips_inactive_perspective() {
        let f = fixture();
        let found = find(&f.model, f.window, &parts(), SearchScope::PRESENTATION);
        assert_eq!(found, vec![f.outside, f.p1_part, f.shared]);
    }

    #[test]
    fn anywhere_reports_shared_once() {
        let f = fixture();
        let found = find(&f.model, f.window, &parts(), SearchScope::ANYWHERE);
        assert_eq!(found, vec![f.outside, f.p1_part, f.shared, f.p2_part]);
    }

    #[test]
    fn shared_content_needs_shared_area_flag() {
        let f = fixture();
        let scope = SearchScope::OUTSIDE_PERSPECTIVE | SearchScope::IN_ACTIVE_PERSPECTIVE;
        let found = find(&f.model, f.window, &parts(), scope);
        assert_eq!(found, vec![f.outside, f.p1_part]);
    }

    #[test]
    fn id_and_tag_filters_combine() {
        let f = fixture();
        let filter = ElementFilter::new().with_id("console").with_tag("view");
        let found = find(&f.model, f.window, &filter, SearchScope::ANYWHERE);
        assert_eq!(found, vec![f.p1_part]);
        let by_id = find(&f.model, f.window, &ElementFilter::new().with_id("console"), SearchScope::ANYWHERE);
        assert_eq!(by_id, vec![f.p1_part, f.p2_part]);
    }

    #[test]
    fn part_menus_need_in_part() {
        let f = fixture();
        let items = ElementFilter::new().with_type(ElementType::Item);
        assert!(find(&f.model, f.window, &items, SearchScope::ANYWHERE).is_empty());
        let found = find(
            &f.model,
            f.window,
            &items,
            SearchScope::ANYWHERE | SearchScope::IN_PART,
        );
        assert_eq!(found, vec![f.menu_item]);
    }

    #[test]
    fn search_rooted_in_inactive_perspective_still_reports() {
        let f = fixture();
        let p2 = f.model.parent(f.model.parent(f.p2_part).expect("stack")).expect("p2");
        let found = find(&f.model, p2, &parts(), SearchScope::OUTSIDE_PERSPECTIVE);
        // Root perspective is gated by its own flag.
        assert!(found.is_empty());
        let stack = f.model.parent(f.p2_part).expect("stack");
        let found = find(&f.model, stack, &parts(), SearchScope::OUTSIDE_PERSPECTIVE);
        assert_eq!(found, vec![f.p2_part]);
    }

    #[test]
    fn containment_follows_placeholders() {
        let f = fixture();
        assert!(contains(&f.model, f.window, f.shared));
        assert!(contains(&f.model, f.window, f.p2_part));
        assert!(!contains(&f.model, f.p1_part, f.window));
    }
}
