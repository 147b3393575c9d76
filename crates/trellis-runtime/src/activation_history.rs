#![forbid(unsafe_code)]

//! Most-recently-used activation history for one window.
//!
//! # Invariants
//!
//! 1. A part appears at most once; `record` moves it to the front.
//! 2. `len() <= max_depth` after any operation.
//! 3. Entries are weak: destroyed or unreachable parts stay in the deque
//!    until [`ActivationHistory::prune_stale`] runs, and every lookup skips them.
//!
//! ```text
//! record(C)            record(A)
//! ┌──────────────┐     ┌──────────────┐
//! │ [C, B, A]    │ ──▶ │ [A, C, B]    │
//! └──────────────┘     └──────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;

use trellis_model::{ElementId, WorkbenchModel, contains, effectively_visible};

/// Per-window MRU stack of activated parts.
#[derive(Clone)]
pub struct ActivationHistory {
    entries: VecDeque<ElementId>,
    max_depth: usize,
}

impl fmt::Debug for ActivationHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationHistory")
            .field("depth", &self.entries.len())
            .field("max_depth", &self.max_depth)
            .field("front", &self.entries.front())
            .finish()
    }
}

impl Default for ActivationHistory {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ActivationHistory {
    /// Create a history keeping at most `max_depth` entries (minimum 1).
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Move `part` to the front.
    pub fn record(&mut self, part: ElementId) {
        if self.entries.front() == Some(&part) {
            return;
        }
        self.entries.retain(|entry| *entry != part);
        self.entries.push_front(part);
        self.entries.truncate(self.max_depth);
    }

    /// Drop `part`. Returns whether it was present.
    pub fn forget(&mut self, part: ElementId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| *entry != part);
        self.entries.len() != before
    }

    /// Drop entries that no longer name a part in `model`.
    pub fn prune_stale(&mut self, model: &WorkbenchModel) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| model.get(*entry).is_some_and(|element| element.is_part()));
        before - self.entries.len()
    }

    /// Entries from most to least recent.
    pub fn iter(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.entries.iter().copied()
    }

    #[must_use]
    pub fn most_recent(&self) -> Option<ElementId> {
        self.entries.front().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Successor for a disappearing part.
    ///
    /// Scans the history front to back for a visible part other than
    /// `excluding`, then falls back to the visible parts among
    /// `former_container`'s children.
    #[must_use]
    pub fn pick_successor(
        &self,
        model: &WorkbenchModel,
        excluding: ElementId,
        former_container: Option<ElementId>,
    ) -> Option<ElementId> {
        self.iter()
            .find(|entry| *entry != excluding && is_visible_part(model, *entry))
            .or_else(|| {
                let container = former_container?;
                model
                    .children(container)
                    .iter()
                    .map(|child| model.resolve(*child))
                    .find(|part| *part != excluding && is_visible_part(model, *part))
            })
    }

    /// Most recent visible part located under `container`.
    #[must_use]
    pub fn candidate_within(&self, model: &WorkbenchModel, container: ElementId) -> Option<ElementId> {
        self.iter()
            .find(|entry| is_visible_part(model, *entry) && contains(model, container, *entry))
    }

    /// Child of `container` to select in place of `excluding`.
    ///
    /// Returns the local child (the part itself or its placeholder) of the most
    /// recently activated sibling that is still to be rendered.
    #[must_use]
    pub fn sibling_candidate(
        &self,
        model: &WorkbenchModel,
        container: ElementId,
        excluding: ElementId,
    ) -> Option<ElementId> {
        let children = model.children(container);
        self.iter()
            .filter(|entry| *entry != excluding)
            .find_map(|entry| {
                children.iter().copied().find(|child| {
                    model.resolve(*child) == entry
                        && model.get(*child).is_some_and(|element| element.to_be_rendered)
                })
            })
    }
}

fn is_visible_part(model: &WorkbenchModel, id: ElementId) -> bool {
    model.get(id).is_some_and(|element| element.is_part()) && effectively_visible(model, id)
}
