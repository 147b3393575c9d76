//! Save coordination for dirty parts.
//!
//! # Invariants
//!
//! 1. A part that is not dirty is never persisted and never prompted for.
//! 2. A failed persist leaves the part dirty.
//! 3. `save_all` prompts once for the whole batch; any `Cancel` aborts the
//!    batch before a single part is persisted.
//!
//! # Failure Modes
//!
//! - `persist` returning [`SaveError`] or panicking: logged under
//!   `trellis.save`, published as [`WorkbenchEvent::SaveFailed`], reported as
//!   `false`. Remaining parts of a batch are still attempted.

use std::panic::{AssertUnwindSafe, catch_unwind};

use trellis_model::{ElementId, ModelElement};

use crate::bus::WorkbenchEvent;
use crate::error::{Result, WorkbenchError};
use crate::listener::panic_message;
use crate::logging::targets;
use crate::part_service::PartService;

/// Answer to a save prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Save {
    Yes,
    No,
    Cancel,
}

/// Decides whether dirty parts are saved.
pub trait SaveHandler {
    fn prompt_to_save(&mut self, part: &ModelElement) -> Save;

    /// One decision per part, in order.
    fn prompt_to_save_all(&mut self, parts: &[&ModelElement]) -> Vec<Save>;
}

/// Failure reported by [`crate::presentation::PartContribution::persist`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveError {
    #[error("save failed: {0}")]
    Failed(String),
    #[error("part has no live contribution")]
    NoContribution,
}

impl PartService {
    /// Save one part.
    ///
    /// Returns `true` when the part was clean, saved, or the handler chose
    /// not to save it; `false` on cancel or a failed persist. Without
    /// `confirm` or without a handler the part is saved.
    pub fn save_part(&mut self, part: ElementId, confirm: bool) -> Result<bool> {
        let _span = tracing::debug_span!("part_service.save_part", part = %part, confirm).entered();

        let element = self.model.element(part)?;
        if !element.is_part() {
            return Err(WorkbenchError::invalid(part, "not a part"));
        }
        if !element.is_dirty() {
            return Ok(true);
        }
        let decision = match (&mut self.save_handler, confirm) {
            (Some(handler), true) => handler.prompt_to_save(element),
            _ => Save::Yes,
        };
        tracing::debug!(target: targets::SAVE, part = %part, decision = ?decision, "save decision");
        Ok(match decision {
            Save::Yes => self.persist(part),
            Save::No => true,
            Save::Cancel => false,
        })
    }

    /// Save every dirty part of the active window.
    ///
    /// Any `Cancel` (including a missing decision) aborts without saving.
    /// Otherwise each `Yes` part is persisted even when an earlier one
    /// failed, and the result is `true` only when all of them succeeded.
    pub fn save_all(&mut self, confirm: bool) -> Result<bool> {
        let _span = tracing::debug_span!("part_service.save_all", confirm).entered();

        let dirty = self.dirty_parts();
        if dirty.is_empty() {
            return Ok(true);
        }
        let decisions = match (&mut self.save_handler, confirm) {
            (Some(handler), true) => {
                let elements: Vec<&ModelElement> =
                    dirty.iter().filter_map(|part| self.model.get(*part)).collect();
                handler.prompt_to_save_all(&elements)
            }
            _ => vec![Save::Yes; dirty.len()],
        };
        if decisions.len() < dirty.len() || decisions.contains(&Save::Cancel) {
            tracing::info!(
                target: targets::SAVE,
                dirty = dirty.len(),
                decisions = decisions.len(),
                "save all cancelled"
            );
            return Ok(false);
        }

        let mut all_saved = true;
        for (part, decision) in dirty.into_iter().zip(decisions) {
            if decision == Save::Yes {
                all_saved &= self.persist(part);
            }
        }
        Ok(all_saved)
    }

    /// Save `part` with confirmation, then hide and remove it.
    ///
    /// Returns `false` and leaves the part in place when the save was
    /// cancelled or failed.
    pub fn close_part(&mut self, part: ElementId) -> Result<bool> {
        if !self.save_part(part, true)? {
            return Ok(false);
        }
        self.hide_part(part, true)?;
        Ok(true)
    }

    fn persist(&mut self, part: ElementId) -> bool {
        let handle = self
            .model
            .get(part)
            .and_then(ModelElement::as_part)
            .and_then(|payload| payload.contribution);
        let outcome = match handle.and_then(|handle| self.contributions.get_mut(&handle)) {
            Some(contribution) => match catch_unwind(AssertUnwindSafe(|| contribution.persist())) {
                Ok(result) => result,
                Err(payload) => Err(SaveError::Failed(panic_message(payload.as_ref()))),
            },
            None => Err(SaveError::NoContribution),
        };

        match outcome {
            Ok(()) => {
                if let Err(err) = self.model.set_dirty(part, false) {
                    tracing::warn!(target: targets::SAVE, part = %part, error = %err, "saved part vanished");
                    return false;
                }
                self.publish_deltas();
                tracing::info!(target: targets::SAVE, part = %part, "part saved");
                self.bus.publish(&WorkbenchEvent::PartSaved { part });
                true
            }
            Err(err) => {
                tracing::warn!(target: targets::SAVE, part = %part, error = %err, "part save failed");
                self.bus.publish(&WorkbenchEvent::SaveFailed {
                    part,
                    reason: err.to_string(),
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_model::{ContainerRole, PartSpec, WorkbenchModel};

    struct Scripted(Vec<Save>);

    impl SaveHandler for Scripted {
        fn prompt_to_save(&mut self, _part: &ModelElement) -> Save {
            self.0.first().copied().unwrap_or(Save::Cancel)
        }

        fn prompt_to_save_all(&mut self, _parts: &[&ModelElement]) -> Vec<Save> {
            self.0.clone()
        }
    }

    fn service() -> (PartService, ElementId, ElementId) {
        let mut model = WorkbenchModel::new();
        let window = model.create_window("main").expect("window");
        let stack = model
            .create_child_container(window, ContainerRole::Stack, "stack")
            .expect("stack");
        let a = model.create_part(PartSpec::new("a")).expect("a");
        let b = model.create_part(PartSpec::new("b")).expect("b");
        model.add_child(stack, a).expect("add");
        model.add_child(stack, b).expect("add");
        let mut service = PartService::new(model);
        service.activate(b).expect("render b");
        service.activate(a).expect("render a");
        (service, a, b)
    }

    #[test]
    fn clean_parts_save_without_prompting() {
        let (mut service, a, _) = service();
        service.set_save_handler(Some(Box::new(Scripted(vec![Save::Cancel]))));
        assert_eq!(service.save_part(a, true), Ok(true));
    }

    #[test]
    fn decisions_map_to_results() {
        let (mut service, a, _) = service();
        service.set_dirty(a, true).expect("dirty");

        service.set_save_handler(Some(Box::new(Scripted(vec![Save::No]))));
        assert_eq!(service.save_part(a, true), Ok(true));
        assert!(service.model().element(a).expect("a").is_dirty());

        service.set_save_handler(Some(Box::new(Scripted(vec![Save::Cancel]))));
        assert_eq!(service.save_part(a, true), Ok(false));

        assert_eq!(service.save_part(a, false), Ok(true));
        assert!(!service.model().element(a).expect("a").is_dirty());
    }

    #[test]
    fn short_decision_lists_cancel_the_batch() {
        let (mut service, a, b) = service();
        service.set_dirty(a, true).expect("dirty");
        service.set_dirty(b, true).expect("dirty");
        service.set_save_handler(Some(Box::new(Scripted(vec![Save::Yes]))));
        assert_eq!(service.save_all(true), Ok(false));
        assert_eq!(service.dirty_parts().len(), 2);
        assert_eq!(service.save_all(false), Ok(true));
        assert!(service.dirty_parts().is_empty());
    }

    #[test]
    fn parts_without_contribution_fail_to_save() {
        let mut model = WorkbenchModel::new();
        let window = model.create_window("main").expect("window");
        let part = model.create_part(PartSpec::new("idle")).expect("part");
        model.add_child(window, part).expect("add");
        model.set_to_be_rendered(part, false).expect("flag");
        model.set_dirty(part, true).expect("dirty");
        let mut service = PartService::new(model);
        assert_eq!(service.save_part(part, false), Ok(false));
        assert!(service.model().element(part).expect("part").is_dirty());
    }

    #[test]
    fn close_removes_saved_parts() {
        let (mut service, a, b) = service();
        service.set_dirty(a, true).expect("dirty");
        assert_eq!(service.close_part(a), Ok(true));
        assert!(service.model().get(a).is_none());
        assert_eq!(service.active_part(), Some(b));
    }
}
