#![forbid(unsafe_code)]

//! Workbench model tree, visibility resolution, and model search.

pub mod model;
pub mod query;
pub mod snapshot;
pub mod visibility;

pub use model::{
    Container, ContainerRole, ContributionHandle, ElementId, ElementKind, Item, MODEL_SCHEMA_VERSION,
    ModelDelta, ModelElement, ModelError, Part, PartSpec, Placeholder, WidgetHandle,
    WorkbenchModel,
};
pub use query::{ElementFilter, ElementType, SearchScope, contains, find, find_first};
pub use snapshot::{InvariantCode, InvariantIssue, InvariantReport, InvariantSeverity, ModelSnapshot};
pub use visibility::{
    PartLocation, RenderPath, RenderStep, StepLink, effectively_visible, in_active_layout, locate,
    render_path, selected_chain, top_window,
};
