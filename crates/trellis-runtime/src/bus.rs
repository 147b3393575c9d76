//! One-way event publication.

use trellis_model::{ElementId, ModelDelta};

use crate::listener::PartEvent;

/// Events published after every part service operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkbenchEvent {
    /// Structural model change.
    Model(ModelDelta),
    /// The active part of `window` changed.
    ActivePartChanged {
        window: ElementId,
        old: Option<ElementId>,
        new: Option<ElementId>,
    },
    /// Listener-level part notification, mirrored for bus observers.
    Part(PartEvent),
    PartSaved {
        part: ElementId,
    },
    SaveFailed {
        part: ElementId,
        reason: String,
    },
}

/// Sink for [`WorkbenchEvent`]s. The engine never reads events back.
pub trait EventBus {
    fn publish(&mut self, event: &WorkbenchEvent);
}

/// Bus that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn publish(&mut self, _event: &WorkbenchEvent) {}
}
