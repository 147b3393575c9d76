//! Part listener registration and isolated dispatch.
//!
//! Listeners are invoked in registration order. Each call runs inside its own
//! error boundary: a returned error or a panic is logged under
//! `trellis.listener`, counted, and the loop moves on to the next listener.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use trellis_model::ElementId;

use crate::logging::targets;

/// Error a listener may report. Logged, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Observer of part lifecycle notifications.
pub trait PartListener {
    fn part_activated(&mut self, _part: ElementId) -> Result<(), ListenerError> {
        Ok(())
    }

    fn part_deactivated(&mut self, _part: ElementId) -> Result<(), ListenerError> {
        Ok(())
    }

    fn part_hidden(&mut self, _part: ElementId) -> Result<(), ListenerError> {
        Ok(())
    }

    fn part_visible(&mut self, _part: ElementId) -> Result<(), ListenerError> {
        Ok(())
    }

    fn part_brought_to_top(&mut self, _part: ElementId) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartEventKind {
    Activated,
    Deactivated,
    Hidden,
    Visible,
    BroughtToTop,
}

impl PartEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activated => "activated",
            Self::Deactivated => "deactivated",
            Self::Hidden => "hidden",
            Self::Visible => "visible",
            Self::BroughtToTop => "brought_to_top",
        }
    }
}

/// One part notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartEvent {
    pub kind: PartEventKind,
    pub part: ElementId,
}

impl PartEvent {
    #[must_use]
    pub const fn new(kind: PartEventKind, part: ElementId) -> Self {
        Self { kind, part }
    }
}

/// Registration handle returned by [`PartListenerList::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Ordered listener registry.
#[derive(Default)]
pub struct PartListenerList {
    listeners: Vec<(ListenerId, Box<dyn PartListener>)>,
    next_id: u64,
    failures: u64,
}

impl fmt::Debug for PartListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartListenerList")
            .field("listeners", &self.listeners.len())
            .field("failures", &self.failures)
            .finish()
    }
}

impl PartListenerList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Box<dyn PartListener>) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns false for unknown ids.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(registered, _)| *registered != id);
        self.listeners.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Listener calls that returned an error or panicked, since creation.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Deliver `event` to every listener.
    pub fn dispatch(&mut self, event: PartEvent) {
        for (id, listener) in &mut self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| match event.kind {
                PartEventKind::Activated => listener.part_activated(event.part),
                PartEventKind::Deactivated => listener.part_deactivated(event.part),
                PartEventKind::Hidden => listener.part_hidden(event.part),
                PartEventKind::Visible => listener.part_visible(event.part),
                PartEventKind::BroughtToTop => listener.part_brought_to_top(event.part),
            }));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            self.failures += 1;
            tracing::warn!(
                target: targets::LISTENER,
                listener = id.0,
                event = event.kind.as_str(),
                part = %event.part,
                error = %failure,
                "part listener failed"
            );
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic: <non-string payload>".to_string()
    }
}
