//! Recording implementations of the runtime collaborator traits.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;

use trellis_model::{ElementId, ModelElement, WidgetHandle, WorkbenchModel};
use trellis_runtime::{
    EventBus, ListenerError, PartContribution, PartEvent, PartEventKind, PartListener,
    PresentationEngine, Save, SaveError, SaveHandler, WorkbenchEvent,
};

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// One call observed by a [`RecordingPresentation`] or its contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationCall {
    Render(ElementId),
    Unrender(ElementId),
    Reparent(ElementId),
    Instantiate(ElementId),
    /// Presentation-level focus.
    Focus(ElementId),
    /// Focus delivered to the part's contribution.
    ContributionFocus(ElementId),
    Persist(ElementId),
}

#[derive(Debug, Default)]
struct TraceState {
    calls: Vec<PresentationCall>,
    failing: BTreeSet<ElementId>,
    panicking: BTreeSet<ElementId>,
    next_widget: u64,
}

/// Shared view of everything a [`RecordingPresentation`] did, plus persist
/// failure injection.
#[derive(Debug, Clone, Default)]
pub struct PresentationTrace(Rc<RefCell<TraceState>>);

impl PresentationTrace {
    #[must_use]
    pub fn calls(&self) -> Vec<PresentationCall> {
        self.0.borrow().calls.clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().calls.clear();
    }

    #[must_use]
    pub fn count(&self, call: PresentationCall) -> usize {
        self.0.borrow().calls.iter().filter(|seen| **seen == call).count()
    }

    /// Parts that received presentation focus, in order.
    #[must_use]
    pub fn focused(&self) -> Vec<ElementId> {
        self.0
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                PresentationCall::Focus(part) => Some(*part),
                _ => None,
            })
            .collect()
    }

    /// Parts whose contribution was asked to persist, in order.
    #[must_use]
    pub fn persisted(&self) -> Vec<ElementId> {
        self.0
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                PresentationCall::Persist(part) => Some(*part),
                _ => None,
            })
            .collect()
    }

    /// Make `part`'s contribution report a save failure.
    pub fn fail_persist(&self, part: ElementId) {
        let _ = self.0.borrow_mut().failing.insert(part);
    }

    /// Make `part`'s contribution panic while saving.
    pub fn panic_on_persist(&self, part: ElementId) {
        let _ = self.0.borrow_mut().panicking.insert(part);
    }

    fn record(&self, call: PresentationCall) {
        self.0.borrow_mut().calls.push(call);
    }
}

/// Presentation engine that logs every callback.
#[derive(Debug)]
pub struct RecordingPresentation {
    trace: PresentationTrace,
}

impl RecordingPresentation {
    #[must_use]
    pub fn new() -> (Self, PresentationTrace) {
        let trace = PresentationTrace::default();
        (
            Self {
                trace: trace.clone(),
            },
            trace,
        )
    }
}

impl PresentationEngine for RecordingPresentation {
    fn render(
        &mut self,
        _model: &WorkbenchModel,
        element: ElementId,
        _parent_widget: Option<WidgetHandle>,
    ) -> Option<WidgetHandle> {
        self.trace.record(PresentationCall::Render(element));
        let mut state = self.trace.0.borrow_mut();
        state.next_widget += 1;
        Some(WidgetHandle(state.next_widget))
    }

    fn unrender(&mut self, _model: &WorkbenchModel, element: ElementId) {
        self.trace.record(PresentationCall::Unrender(element));
    }

    fn reparent(
        &mut self,
        _model: &WorkbenchModel,
        element: ElementId,
        _parent_widget: Option<WidgetHandle>,
    ) {
        self.trace.record(PresentationCall::Reparent(element));
    }

    fn instantiate(
        &mut self,
        _model: &WorkbenchModel,
        part: ElementId,
    ) -> Option<Box<dyn PartContribution>> {
        self.trace.record(PresentationCall::Instantiate(part));
        Some(Box::new(RecordingContribution {
            part,
            trace: self.trace.clone(),
        }))
    }

    fn focus(
        &mut self,
        _model: &WorkbenchModel,
        part: ElementId,
        contribution: Option<&mut dyn PartContribution>,
    ) {
        self.trace.record(PresentationCall::Focus(part));
        if let Some(contribution) = contribution {
            contribution.focus();
        }
    }
}

/// Contribution created by [`RecordingPresentation`].
#[derive(Debug)]
pub struct RecordingContribution {
    part: ElementId,
    trace: PresentationTrace,
}

impl PartContribution for RecordingContribution {
    fn focus(&mut self) {
        self.trace
            .record(PresentationCall::ContributionFocus(self.part));
    }

    fn persist(&mut self) -> Result<(), SaveError> {
        self.trace.record(PresentationCall::Persist(self.part));
        let (fails, panics) = {
            let state = self.trace.0.borrow();
            (
                state.failing.contains(&self.part),
                state.panicking.contains(&self.part),
            )
        };
        if panics {
            panic!("persist exploded for {}", self.part);
        }
        if fails {
            return Err(SaveError::Failed(format!("disk full while saving {}", self.part)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Events seen by a [`RecordingListener`].
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<PartEvent>>>);

impl EventLog {
    #[must_use]
    pub fn events(&self) -> Vec<PartEvent> {
        self.0.borrow().clone()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<PartEvent> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    #[must_use]
    pub fn kinds_for(&self, part: ElementId) -> Vec<PartEventKind> {
        self.0
            .borrow()
            .iter()
            .filter(|event| event.part == part)
            .map(|event| event.kind)
            .collect()
    }

    #[must_use]
    pub fn parts_with(&self, kind: PartEventKind) -> Vec<ElementId> {
        self.0
            .borrow()
            .iter()
            .filter(|event| event.kind == kind)
            .map(|event| event.part)
            .collect()
    }
}

#[derive(Debug)]
pub struct RecordingListener {
    log: EventLog,
}

impl RecordingListener {
    #[must_use]
    pub fn new() -> (Self, EventLog) {
        let log = EventLog::default();
        (Self { log: log.clone() }, log)
    }

    fn push(&mut self, kind: PartEventKind, part: ElementId) -> Result<(), ListenerError> {
        self.log.0.borrow_mut().push(PartEvent::new(kind, part));
        Ok(())
    }
}

impl PartListener for RecordingListener {
    fn part_activated(&mut self, part: ElementId) -> Result<(), ListenerError> {
        self.push(PartEventKind::Activated, part)
    }

    fn part_deactivated(&mut self, part: ElementId) -> Result<(), ListenerError> {
        self.push(PartEventKind::Deactivated, part)
    }

    fn part_hidden(&mut self, part: ElementId) -> Result<(), ListenerError> {
        self.push(PartEventKind::Hidden, part)
    }

    fn part_visible(&mut self, part: ElementId) -> Result<(), ListenerError> {
        self.push(PartEventKind::Visible, part)
    }

    fn part_brought_to_top(&mut self, part: ElementId) -> Result<(), ListenerError> {
        self.push(PartEventKind::BroughtToTop, part)
    }
}

/// Listener that rejects every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingListener;

impl PartListener for FailingListener {
    fn part_activated(&mut self, part: ElementId) -> Result<(), ListenerError> {
        Err(format!("refused activation of {part}").into())
    }

    fn part_deactivated(&mut self, part: ElementId) -> Result<(), ListenerError> {
        Err(format!("refused deactivation of {part}").into())
    }

    fn part_hidden(&mut self, part: ElementId) -> Result<(), ListenerError> {
        Err(format!("refused hide of {part}").into())
    }

    fn part_visible(&mut self, part: ElementId) -> Result<(), ListenerError> {
        Err(format!("refused visibility of {part}").into())
    }

    fn part_brought_to_top(&mut self, part: ElementId) -> Result<(), ListenerError> {
        Err(format!("refused bring to top of {part}").into())
    }
}

/// Listener that panics on activation and hide notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanickingListener;

impl PartListener for PanickingListener {
    fn part_activated(&mut self, part: ElementId) -> Result<(), ListenerError> {
        panic!("listener blew up activating {part}");
    }

    fn part_hidden(&mut self, part: ElementId) -> Result<(), ListenerError> {
        panic!("listener blew up hiding {part}");
    }
}

// ---------------------------------------------------------------------------
// Event bus
// ---------------------------------------------------------------------------

/// Events published to a [`RecordingEventBus`].
#[derive(Debug, Clone, Default)]
pub struct BusLog(Rc<RefCell<Vec<WorkbenchEvent>>>);

impl BusLog {
    #[must_use]
    pub fn events(&self) -> Vec<WorkbenchEvent> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// `(window, old, new)` for every active-part change, in order.
    #[must_use]
    pub fn active_changes(&self) -> Vec<(ElementId, Option<ElementId>, Option<ElementId>)> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                WorkbenchEvent::ActivePartChanged { window, old, new } => Some((*window, *old, *new)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn saved(&self) -> Vec<ElementId> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                WorkbenchEvent::PartSaved { part } => Some(*part),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn save_failures(&self) -> Vec<ElementId> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                WorkbenchEvent::SaveFailed { part, .. } => Some(*part),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn model_deltas(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|event| matches!(event, WorkbenchEvent::Model(_)))
            .count()
    }
}

#[derive(Debug)]
pub struct RecordingEventBus {
    log: BusLog,
}

impl RecordingEventBus {
    #[must_use]
    pub fn new() -> (Self, BusLog) {
        let log = BusLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl EventBus for RecordingEventBus {
    fn publish(&mut self, event: &WorkbenchEvent) {
        self.log.0.borrow_mut().push(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Save prompts
// ---------------------------------------------------------------------------

/// Parts each prompt was asked about, one entry per prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptLog(Rc<RefCell<Vec<Vec<ElementId>>>>);

impl PromptLog {
    #[must_use]
    pub fn prompts(&self) -> Vec<Vec<ElementId>> {
        self.0.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Save handler answering from a script.
///
/// Single prompts pop answers front to back and default to `Yes` once the
/// script runs out. Batch prompts return the batch script verbatim.
#[derive(Debug, Default)]
pub struct ScriptedSaveHandler {
    single: VecDeque<Save>,
    batch: Vec<Save>,
    prompts: PromptLog,
}

impl ScriptedSaveHandler {
    #[must_use]
    pub fn new() -> (Self, PromptLog) {
        let handler = Self::default();
        let prompts = handler.prompts.clone();
        (handler, prompts)
    }

    #[must_use]
    pub fn answering(mut self, answers: impl IntoIterator<Item = Save>) -> Self {
        self.single.extend(answers);
        self
    }

    #[must_use]
    pub fn answering_all(mut self, answers: impl IntoIterator<Item = Save>) -> Self {
        self.batch = answers.into_iter().collect();
        self
    }
}

impl SaveHandler for ScriptedSaveHandler {
    fn prompt_to_save(&mut self, part: &ModelElement) -> Save {
        self.prompts.0.borrow_mut().push(vec![part.id]);
        self.single.pop_front().unwrap_or(Save::Yes)
    }

    fn prompt_to_save_all(&mut self, parts: &[&ModelElement]) -> Vec<Save> {
        self.prompts
            .0
            .borrow_mut()
            .push(parts.iter().map(|part| part.id).collect());
        self.batch.clone()
    }
}
