//! Controllable entities and their per-kind descriptors.

use serde::Serialize;

use crate::config::{self, KeyPair};
use crate::gateway::{EntityGateway, GatewayResult, Setpoints};
use crate::{Error, Result};

/// The closed set of entity kinds that support overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Heating circuit
    Circuit,
    /// Domestic hot-water tank
    Tank,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Circuit, EntityKind::Tank];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Circuit => "circuit",
            EntityKind::Tank => "tank",
        }
    }

    /// Plural path segment used by routes and the gateway bridge.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Circuit => "circuits",
            EntityKind::Tank => "tanks",
        }
    }

    /// Configuration keys listing the addressable ids.
    pub fn id_keys(&self) -> KeyPair {
        match self {
            EntityKind::Circuit => config::CIRCUITS,
            EntityKind::Tank => config::TANKS,
        }
    }

    /// Configuration keys listing the run-mode choices.
    pub fn run_mode_keys(&self) -> KeyPair {
        match self {
            EntityKind::Circuit => config::CIRCUIT_RUN_MODES,
            EntityKind::Tank => config::TANK_RUN_MODES,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "circuit" | "circuits" => Ok(EntityKind::Circuit),
            "tank" | "tanks" => Ok(EntityKind::Tank),
            _ => Err(Error::InvalidInput(format!("unknown entity kind '{}'", s))),
        }
    }
}

/// Reference to one entity on the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }

    /// Parse an id taken from a request path.
    pub fn parse(kind: EntityKind, raw: &str) -> Result<Self> {
        raw.trim()
            .parse::<i64>()
            .map(|id| Self::new(kind, id))
            .map_err(|_| Error::MalformedIdentifier(raw.to_string()))
    }

    /// Path of this entity below a gateway or router base.
    pub fn path(&self) -> String {
        format!("{}/{}", self.kind.collection(), self.id)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Live state of an entity, read fresh for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    #[serde(flatten)]
    pub entity: EntityRef,
    pub name: String,
    /// Mode the entity runs at absent any override.
    pub standing_mode: i64,
    /// Effective mode, possibly overridden.
    pub current_mode: i64,
    pub override_active: bool,
    pub offset: f64,
    pub setpoints: Setpoints,
    pub has_ambient_sensor: bool,
}

impl EntitySnapshot {
    /// Read every attribute from the gateway.
    pub fn fetch(gateway: &dyn EntityGateway, entity: EntityRef) -> GatewayResult<Self> {
        Ok(Self {
            entity,
            name: gateway.name(entity)?,
            standing_mode: gateway.standing_mode(entity)?,
            current_mode: gateway.current_mode(entity)?,
            override_active: gateway.override_active(entity)?,
            offset: gateway.offset(entity)?,
            setpoints: gateway.setpoints(entity)?,
            has_ambient_sensor: gateway.has_ambient_sensor(entity)?,
        })
    }
}
