#![forbid(unsafe_code)]

//! Test support for Trellis: recording collaborators, tracing capture, and
//! workbench fixtures.
//!
//! Every recorder hands out a cloneable log handle so tests can keep
//! inspecting calls after the recorder itself moved into the part service.

pub mod capture;
pub mod fixture;
pub mod recording;

pub use capture::{CaptureHandle, CapturedEvent, CapturedSpan, LogCapture, with_captured_tracing};
pub use fixture::{Names, WorkbenchBuilder, shared_perspectives, two_stacks, two_windows};
pub use recording::{
    BusLog, EventLog, FailingListener, PanickingListener, PresentationCall, PresentationTrace,
    PromptLog, RecordingContribution, RecordingEventBus, RecordingListener, RecordingPresentation,
    ScriptedSaveHandler,
};
