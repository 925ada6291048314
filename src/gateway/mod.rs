//! Access to the external control service.
//!
//! The control daemon owns all entity state. [`EntityGateway`] is the narrow
//! capability set this crate needs from it: per-entity reads, the three entity
//! mutators, and the two global system-mode properties. Every call is a
//! blocking round trip bounded by the adapter's timeout; nothing is cached.
//!
//! Adapters:
//! - [`HttpGateway`]: JSON bridge in front of the daemon
//! - [`MemoryGateway`]: in-process state for tests and `serve --simulate`

mod http;
mod memory;

pub use http::HttpGateway;
pub use memory::{Call, MemoryGateway};

use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;

/// Temperature setpoints and readings of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Setpoints {
    pub comfort: f64,
    pub eco: f64,
    pub frost: f64,
    pub target: f64,
    pub current: f64,
}

/// What a failing gateway call was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayTarget {
    Entity(EntityRef),
    /// Global runtime properties (system mode, suppress flag)
    Runtime,
    Sensor(i64),
}

impl std::fmt::Display for GatewayTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayTarget::Entity(entity) => write!(f, "{}", entity),
            GatewayTarget::Runtime => write!(f, "runtime"),
            GatewayTarget::Sensor(id) => write!(f, "sensor {}", id),
        }
    }
}

/// Why a gateway call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureKind {
    /// Timeout, refused connection, or server-side failure.
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// The service understood the call and refused it.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The reply could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A failed gateway call, with enough context to log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} on {target}: {kind}")]
pub struct GatewayError {
    pub operation: &'static str,
    pub target: GatewayTarget,
    pub kind: FailureKind,
}

impl GatewayError {
    pub fn new(operation: &'static str, target: GatewayTarget, kind: FailureKind) -> Self {
        Self {
            operation,
            target,
            kind,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self.kind, FailureKind::Unavailable(_))
    }
}

/// Result type alias for gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Capability set consumed from the control service.
pub trait EntityGateway: Send + Sync {
    fn name(&self, entity: EntityRef) -> GatewayResult<String>;

    /// Mode the entity would run at without an override.
    fn standing_mode(&self, entity: EntityRef) -> GatewayResult<i64>;

    /// Effective mode.
    fn current_mode(&self, entity: EntityRef) -> GatewayResult<i64>;

    fn override_active(&self, entity: EntityRef) -> GatewayResult<bool>;

    /// Force `mode`. Fails if the service does not know the mode code.
    fn set_override(&self, entity: EntityRef, mode: i64) -> GatewayResult<()>;

    /// Drop any override. Idempotent.
    fn clear_override(&self, entity: EntityRef) -> GatewayResult<()>;

    fn offset(&self, entity: EntityRef) -> GatewayResult<f64>;

    fn set_offset(&self, entity: EntityRef, offset: f64) -> GatewayResult<()>;

    fn setpoints(&self, entity: EntityRef) -> GatewayResult<Setpoints>;

    fn has_ambient_sensor(&self, entity: EntityRef) -> GatewayResult<bool>;

    /// Primary global mode (bits 0..=6 of the composite).
    fn system_mode(&self) -> GatewayResult<u8>;

    fn set_system_mode(&self, primary: u8) -> GatewayResult<()>;

    /// Secondary suppression flag (bit 7 of the composite).
    fn suppress_flag(&self) -> GatewayResult<bool>;

    fn set_suppress_flag(&self, suppress: bool) -> GatewayResult<()>;

    fn temperature(&self, sensor: i64) -> GatewayResult<f64>;
}
