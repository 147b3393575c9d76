//! Presentation engine seam.
//!
//! The part service decides *what* is rendered; a [`PresentationEngine`]
//! creates and destroys the widgets. Widgets and part contributions are opaque
//! to the engine and addressed through handles stored on the model.

use trellis_model::{ElementId, WidgetHandle, WorkbenchModel};

use crate::save::SaveError;

/// Live object behind a rendered part.
pub trait PartContribution {
    /// Take keyboard focus.
    fn focus(&mut self) {}

    /// Persist unsaved content.
    fn persist(&mut self) -> Result<(), SaveError>;
}

/// Widget lifecycle callbacks driven by the part service.
pub trait PresentationEngine {
    /// Create the widget for `element` under `parent_widget`.
    fn render(
        &mut self,
        model: &WorkbenchModel,
        element: ElementId,
        parent_widget: Option<WidgetHandle>,
    ) -> Option<WidgetHandle>;

    /// Destroy the widget for `element`. Children are unrendered first.
    fn unrender(&mut self, model: &WorkbenchModel, element: ElementId);

    /// Move an already rendered shared element under a new placeholder widget.
    fn reparent(
        &mut self,
        _model: &WorkbenchModel,
        _element: ElementId,
        _parent_widget: Option<WidgetHandle>,
    ) {
    }

    /// Create the contribution of a part on its first render.
    fn instantiate(
        &mut self,
        _model: &WorkbenchModel,
        _part: ElementId,
    ) -> Option<Box<dyn PartContribution>> {
        None
    }

    /// Move focus to an activated part. The default forwards to the part's
    /// contribution, if it has one.
    fn focus(
        &mut self,
        _model: &WorkbenchModel,
        _part: ElementId,
        contribution: Option<&mut dyn PartContribution>,
    ) {
        if let Some(contribution) = contribution {
            contribution.focus();
        }
    }
}

/// Presentation engine that only hands out widget handles.
#[derive(Debug, Default)]
pub struct HeadlessPresentation {
    next_widget: u64,
}

impl HeadlessPresentation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresentationEngine for HeadlessPresentation {
    fn render(
        &mut self,
        _model: &WorkbenchModel,
        _element: ElementId,
        _parent_widget: Option<WidgetHandle>,
    ) -> Option<WidgetHandle> {
        self.next_widget += 1;
        Some(WidgetHandle(self.next_widget))
    }

    fn unrender(&mut self, _model: &WorkbenchModel, _element: ElementId) {}

    fn instantiate(
        &mut self,
        _model: &WorkbenchModel,
        _part: ElementId,
    ) -> Option<Box<dyn PartContribution>> {
        Some(Box::new(HeadlessContribution))
    }
}

/// Contribution whose save always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessContribution;

impl PartContribution for HeadlessContribution {
    fn persist(&mut self) -> Result<(), SaveError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingContribution {
        focused: usize,
    }

    impl PartContribution for CountingContribution {
        fn focus(&mut self) {
            self.focused += 1;
        }

        fn persist(&mut self) -> Result<(), SaveError> {
            Ok(())
        }
    }

    #[test]
    fn default_focus_forwards_to_the_contribution() {
        let model = WorkbenchModel::new();
        let part = ElementId::new(1).expect("id");
        let mut presentation = HeadlessPresentation::new();
        let mut contribution = CountingContribution::default();

        presentation.focus(&model, part, Some(&mut contribution));
        presentation.focus(&model, part, None);

        assert_eq!(contribution.focused, 1);
    }
}
