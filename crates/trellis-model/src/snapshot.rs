//! Serialized model form, invariant diagnostics, and deterministic hashing.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::model::{
    ContainerRole, ElementId, ElementKind, MODEL_SCHEMA_VERSION, ModelElement, ModelError,
    WorkbenchModel,
};

/// Canonical serialized model shape.
///
/// Widgets and contribution handles are runtime state and are not persisted.
/// The extension map is reserved for forward-compatible fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    pub root: ElementId,
    pub next_id: ElementId,
    pub elements: Vec<ModelElement>,
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

fn default_schema_version() -> u16 {
    MODEL_SCHEMA_VERSION
}

impl ModelSnapshot {
    /// Canonicalize element ordering by ID.
    pub fn canonicalize(&mut self) {
        self.elements.sort_by_key(|element| element.id);
    }

    /// Deterministic hash over the persisted state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut canonical = self.clone();
        canonical.canonicalize();
        let mut hasher = FnvHasher::default();
        canonical.schema_version.hash(&mut hasher);
        canonical.root.hash(&mut hasher);
        canonical.next_id.hash(&mut hasher);
        canonical.extensions.hash(&mut hasher);
        for element in &canonical.elements {
            let mut persisted = element.clone();
            persisted.widget = None;
            if let ElementKind::Part(part) = &mut persisted.kind {
                part.contribution = None;
            }
            persisted.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Inspect structural invariants.
    #[must_use]
    pub fn invariant_report(&self) -> InvariantReport {
        build_invariant_report(self)
    }
}

impl WorkbenchModel {
    /// Export to canonical snapshot form.
    #[must_use]
    pub fn to_snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            schema_version: MODEL_SCHEMA_VERSION,
            root: self.root,
            next_id: self.next_id,
            elements: self.nodes.values().cloned().collect(),
            extensions: BTreeMap::new(),
        }
    }

    /// Construct and validate from a snapshot.
    pub fn from_snapshot(mut snapshot: ModelSnapshot) -> Result<Self, ModelError> {
        if snapshot.schema_version != MODEL_SCHEMA_VERSION {
            return Err(ModelError::UnsupportedSchemaVersion {
                version: snapshot.schema_version,
            });
        }
        snapshot.canonicalize();
        let report = snapshot.invariant_report();
        if let Some(first) = report
            .issues
            .iter()
            .find(|issue| issue.severity == InvariantSeverity::Error)
        {
            if first.code == InvariantCode::DuplicateElementId
                && let Some(element) = first.element
            {
                return Err(ModelError::DuplicateElementId { element });
            }
            return Err(ModelError::InvalidSnapshot {
                issue_count: report.error_count(),
                first_issue: first.message.clone(),
            });
        }
        let nodes = snapshot
            .elements
            .into_iter()
            .map(|element| (element.id, element))
            .collect();
        Ok(Self {
            root: snapshot.root,
            next_id: snapshot.next_id,
            nodes,
            journal: Vec::new(),
        })
    }

    /// Structured invariant diagnostics for the live model.
    #[must_use]
    pub fn invariant_report(&self) -> InvariantReport {
        self.to_snapshot().invariant_report()
    }

    /// Deterministic hash of the persisted model state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.to_snapshot().state_hash()
    }
}

/// 64-bit FNV-1a; stable across runs, unlike `DefaultHasher`.
#[derive(Debug, Clone, Copy)]
struct FnvHasher(u64);

impl Default for FnvHasher {
    fn default() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(0x0000_0001_0000_01b3);
        }
    }
}

/// Severity for one invariant finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantSeverity {
    Error,
    Warning,
}

/// Stable code for invariant findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantCode {
    DuplicateElementId,
    MissingRoot,
    RootNotApplication,
    RootHasParent,
    MissingChild,
    ParentMismatch,
    MultipleOwners,
    SelectionNotAChild,
    DanglingReference,
    ReferenceNotShared,
    CurrentPlaceholderMismatch,
    PoolMismatch,
    CycleDetected,
    UnreachableElement,
    NextIdNotGreaterThanExisting,
    HiddenSelection,
}

/// One actionable invariant finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantIssue {
    pub code: InvariantCode,
    pub severity: InvariantSeverity,
    pub element: Option<ElementId>,
    pub related: Option<ElementId>,
    pub message: String,
}

/// Structured invariant report over a model snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    pub snapshot_hash: u64,
    pub issues: Vec<InvariantIssue>,
}

impl InvariantReport {
    /// Return true if any error-level finding exists.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == InvariantSeverity::Error)
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == InvariantSeverity::Error)
            .count()
    }

    /// Codes present in the report, deduplicated.
    #[must_use]
    pub fn codes(&self) -> BTreeSet<InvariantCode> {
        self.issues.iter().map(|issue| issue.code).collect()
    }
}

struct ReportBuilder {
    issues: Vec<InvariantIssue>,
}

impl ReportBuilder {
    fn error(
        &mut self,
        code: InvariantCode,
        element: Option<ElementId>,
        related: Option<ElementId>,
        message: impl Into<String>,
    ) {
        self.push(code, InvariantSeverity::Error, element, related, message);
    }

    fn warning(
        &mut self,
        code: InvariantCode,
        element: Option<ElementId>,
        related: Option<ElementId>,
        message: impl Into<String>,
    ) {
        self.push(code, InvariantSeverity::Warning, element, related, message);
    }

    fn push(
        &mut self,
        code: InvariantCode,
        severity: InvariantSeverity,
        element: Option<ElementId>,
        related: Option<ElementId>,
        message: impl Into<String>,
    ) {
        self.issues.push(InvariantIssue {
            code,
            severity,
            element,
            related,
            message: message.into(),
        });
    }
}

/// Every element an element owns, paired with whether the owned element
/// should carry a `parent` back-link.
fn owned(element: &ModelElement) -> Vec<(ElementId, bool)> {
    match &element.kind {
        ElementKind::Container(container) => container
            .children
            .iter()
            .chain(&container.windows)
            .chain(container.main_menu.iter())
            .map(|id| (*id, true))
            .chain(container.shared_elements.iter().map(|id| (*id, false)))
            .collect(),
        ElementKind::Part(part) => part
            .menus
            .iter()
            .chain(part.toolbar.iter())
            .map(|id| (*id, true))
            .collect(),
        ElementKind::Placeholder(_) | ElementKind::Item(_) => Vec::new(),
    }
}

fn build_invariant_report(snapshot: &ModelSnapshot) -> InvariantReport {
    let mut report = ReportBuilder { issues: Vec::new() };

    let mut nodes: BTreeMap<ElementId, &ModelElement> = BTreeMap::new();
    for element in &snapshot.elements {
        if nodes.insert(element.id, element).is_some() {
            report.error(
                InvariantCode::DuplicateElementId,
                Some(element.id),
                None,
                format!("element id {} appears more than once", element.id),
            );
        }
    }

    match nodes.get(&snapshot.root) {
        None => report.error(
            InvariantCode::MissingRoot,
            Some(snapshot.root),
            None,
            format!("root {} is missing", snapshot.root),
        ),
        Some(root) => {
            if root.role() != Some(ContainerRole::Application) {
                report.error(
                    InvariantCode::RootNotApplication,
                    Some(root.id),
                    None,
                    "root is not an application container",
                );
            }
            if root.parent.is_some() {
                report.error(
                    InvariantCode::RootHasParent,
                    Some(root.id),
                    root.parent,
                    "root must not have a parent",
                );
            }
        }
    }

    if let Some(max) = nodes.keys().next_back()
        && snapshot.next_id <= *max
    {
        report.error(
            InvariantCode::NextIdNotGreaterThanExisting,
            Some(snapshot.next_id),
            Some(*max),
            format!("next id {} does not exceed {}", snapshot.next_id, max),
        );
    }

    let mut owner_of: BTreeMap<ElementId, ElementId> = BTreeMap::new();
    for element in nodes.values() {
        for (child, linked) in owned(element) {
            let Some(record) = nodes.get(&child) else {
                report.error(
                    InvariantCode::MissingChild,
                    Some(element.id),
                    Some(child),
                    format!("{} owns missing element {}", element.id, child),
                );
                continue;
            };
            if let Some(previous) = owner_of.insert(child, element.id) {
                report.error(
                    InvariantCode::MultipleOwners,
                    Some(child),
                    Some(previous),
                    format!("{} is owned by both {} and {}", child, previous, element.id),
                );
            }
            if linked && record.parent != Some(element.id) {
                report.error(
                    InvariantCode::ParentMismatch,
                    Some(child),
                    Some(element.id),
                    format!("{} is owned by {} but points at {:?}", child, element.id, record.parent),
                );
            }
            if !linked && (record.parent.is_some() || record.pool_owner != Some(element.id)) {
                report.error(
                    InvariantCode::PoolMismatch,
                    Some(child),
                    Some(element.id),
                    format!("shared element {} is not cleanly pooled in {}", child, element.id),
                );
            }
        }

        if let Some(container) = element.as_container()
            && let Some(selected) = container.selected
        {
            if !container.children.contains(&selected) {
                report.error(
                    InvariantCode::SelectionNotAChild,
                    Some(element.id),
                    Some(selected),
                    format!("{} selects non-child {}", element.id, selected),
                );
            } else if nodes.get(&selected).is_some_and(|child| !child.to_be_rendered) {
                report.warning(
                    InvariantCode::HiddenSelection,
                    Some(element.id),
                    Some(selected),
                    format!("{} selects unrendered child {}", element.id, selected),
                );
            }
        }

        if let Some(placeholder) = element.as_placeholder() {
            match nodes.get(&placeholder.reference) {
                None => report.error(
                    InvariantCode::DanglingReference,
                    Some(element.id),
                    Some(placeholder.reference),
                    format!("placeholder {} references missing {}", element.id, placeholder.reference),
                ),
                Some(target) if !target.is_shared() => report.error(
                    InvariantCode::ReferenceNotShared,
                    Some(element.id),
                    Some(target.id),
                    format!("placeholder {} references unpooled {}", element.id, target.id),
                ),
                Some(_) => {}
            }
        }

        if let Some(current) = element.cur_shared_ref {
            let valid = nodes
                .get(&current)
                .and_then(|placeholder| placeholder.as_placeholder())
                .is_some_and(|placeholder| placeholder.reference == element.id);
            if !valid {
                report.error(
                    InvariantCode::CurrentPlaceholderMismatch,
                    Some(element.id),
                    Some(current),
                    format!("{} names {} as current placeholder", element.id, current),
                );
            }
        }

        if let Some(window) = element.pool_owner {
            let listed = nodes
                .get(&window)
                .and_then(|owner| owner.as_container())
                .is_some_and(|owner| owner.shared_elements.contains(&element.id));
            if !listed {
                report.error(
                    InvariantCode::PoolMismatch,
                    Some(element.id),
                    Some(window),
                    format!("{} claims pool owner {} which does not list it", element.id, window),
                );
            }
        }
    }

    for element in nodes.values() {
        if element.id != snapshot.root && element.parent.is_some() && !owner_of.contains_key(&element.id) {
            report.error(
                InvariantCode::ParentMismatch,
                Some(element.id),
                element.parent,
                format!("{} points at parent {:?} which does not own it", element.id, element.parent),
            );
        }
    }

    // Ownership walks from the root and from every detached subtree root:
    // revisits are cycles, leftovers sit in an ownership loop.
    let detached_roots: Vec<ElementId> = nodes
        .values()
        .filter(|element| {
            element.id != snapshot.root && element.parent.is_none() && element.pool_owner.is_none()
        })
        .map(|element| element.id)
        .collect();
    let mut reached = BTreeSet::new();
    for start in std::iter::once(snapshot.root).chain(detached_roots.iter().copied()) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !reached.insert(id) {
                report.error(
                    InvariantCode::CycleDetected,
                    Some(id),
                    None,
                    format!("{id} is reachable more than once"),
                );
                continue;
            }
            if let Some(element) = nodes.get(&id) {
                stack.extend(
                    owned(element)
                        .into_iter()
                        .map(|(child, _)| child)
                        .filter(|child| nodes.contains_key(child)),
                );
            }
        }
    }
    // Detached subtrees awaiting placement are legal but worth reporting.
    for id in &detached_roots {
        report.warning(
            InvariantCode::UnreachableElement,
            Some(*id),
            None,
            format!("{id} is not attached to the model"),
        );
    }
    for (id, element) in &nodes {
        if !reached.contains(id) {
            report.error(
                InvariantCode::UnreachableElement,
                Some(*id),
                element.parent.or(element.pool_owner),
                format!("{id} is owned but not reachable from any root"),
            );
        }
    }

    InvariantReport {
        snapshot_hash: snapshot.state_hash(),
        issues: report.issues,
    }
}
