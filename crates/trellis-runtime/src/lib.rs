#![forbid(unsafe_code)]

//! Part activation, visibility, and save coordination for Trellis
//! workbenches.
//!
//! [`PartService`] owns a [`trellis_model::WorkbenchModel`] and is the only
//! writer of it. Rendering, descriptors, prompts and event publication are
//! injected through the [`PresentationEngine`], [`DescriptorRegistry`],
//! [`SaveHandler`] and [`EventBus`] seams.
//!
//! ```rust,ignore
//! let mut service = PartService::new(model).with_descriptors(registry);
//! service.show("console", PartState::Activate)?;
//! service.hide_part(console, false)?;
//! ```

pub mod activation_history;
pub mod bus;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod listener;
pub mod logging;
pub mod part_service;
pub mod placement;
pub mod presentation;
pub mod save;

pub use activation_history::ActivationHistory;
pub use bus::{EventBus, NullEventBus, WorkbenchEvent};
pub use config::{ConfigError, DEFAULT_NEW_STACK_TAG, DEFAULT_REMOVE_ON_HIDE_TAG, WorkbenchConfig};
pub use descriptor::{
    DescriptorRegistry, ItemTemplate, MenuTemplate, PartDescriptor, StaticDescriptorRegistry,
};
pub use error::{Result, WorkbenchError};
pub use listener::{
    ListenerError, ListenerId, PartEvent, PartEventKind, PartListener, PartListenerList,
};
#[cfg(feature = "tracing-json")]
pub use logging::init_json_logging;
pub use part_service::{ActivateOptions, PartService};
pub use placement::{PartState, ShowTarget};
pub use presentation::{
    HeadlessContribution, HeadlessPresentation, PartContribution, PresentationEngine,
};
pub use save::{Save, SaveError, SaveHandler};
