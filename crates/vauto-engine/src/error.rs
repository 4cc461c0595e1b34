//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop startup, so `main`
//! can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: vauto_core::config::ConfigError,
    },

    /// The plan directory could not be opened.
    #[error("plan store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: vauto_core::StoreError,
    },

    /// The world collaborators could not be built.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: vauto_world::WorldError,
    },

    /// The conveyor configuration was rejected.
    #[error("conveyor error: {source}")]
    Conveyor {
        /// The underlying conveyor error.
        #[from]
        source: vauto_core::conveyor::ConveyorError,
    },

    /// The operator API server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: vauto_observer::ServerError,
    },
}
