//! Structured logging bootstrap.
//!
//! The engine logs through `tracing` under `trellis.*` targets. Embedders that
//! have no subscriber of their own can install the JSON one provided here.

/// Install a global JSON subscriber filtered by `filter`
/// (an `EnvFilter` directive such as `"trellis=debug"`).
///
/// `RUST_LOG` takes precedence when set. Fails when a global subscriber is
/// already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging(
    filter: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_current_span(true)
        .try_init()
}

/// Log targets used by the engine, for building filters.
pub mod targets {
    pub const ACTIVATION: &str = "trellis.activation";
    pub const PLACEMENT: &str = "trellis.placement";
    pub const HIDE: &str = "trellis.hide";
    pub const PERSPECTIVE: &str = "trellis.perspective";
    pub const SAVE: &str = "trellis.save";
    pub const LISTENER: &str = "trellis.listener";
}
