//! Thermogate - per-user authorization and override reconciliation for a
//! heating controller.
//!
//! This library provides the core of the `thermogate` service: resolving
//! which modes and entities a caller may see, validating their form
//! submissions, and turning them into the minimal set of calls against the
//! control service.

pub mod cli;
pub mod commands;
pub mod config;
pub mod entity;
pub mod forms;
pub mod gateway;
pub mod notify;
pub mod reconcile;
pub mod server;

use entity::EntityKind;
use forms::FormErrors;
use gateway::GatewayError;

/// Library-level error type for Thermogate operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The key pair resolved to nothing for this caller.
    #[error("Disabled by configuration: '{0}' is not set")]
    ConfigurationDisabled(String),

    #[error("Unknown {kind}: {id}")]
    UnknownEntity { kind: EntityKind, id: i64 },

    #[error("Invalid ID format: {0}")]
    MalformedIdentifier(String),

    #[error("Invalid submission: {0}")]
    Validation(FormErrors),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Some mutations of a request were applied before one failed.
    #[error("Partial update: {applied} succeeded, {failed} failed: {source}")]
    PartialMutationFailure {
        applied: String,
        failed: String,
        #[source]
        source: GatewayError,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Thermogate operations.
pub type Result<T> = std::result::Result<T, Error>;
