//! Per-caller resolution of paired configuration keys.
//!
//! Every tiered setting is stored twice: under a `privileged*` key and under a
//! `standard*` key. The effective value for a caller is picked as follows:
//!
//! 1. Privileged value, when the caller is the configured `adminName` and the
//!    privileged key is set to something non-empty
//! 2. Standard value, when set
//! 3. Nothing: the feature is disabled for this caller
//!
//! An empty or missing `adminName` never grants the privileged tier, so an
//! anonymous caller cannot match it.

use serde::Serialize;

use crate::config::{ADMIN_NAME, ConfigDocument, ConfigValue, KeyPair, MODES, ModeChoice};
use crate::entity::{EntityKind, EntityRef};
use crate::{Error, Result};

/// Caller identity as reported by the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity(Option<String>);

impl Identity {
    /// The anonymous caller.
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// A named caller. An empty name is anonymous.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Self(None)
        } else {
            Self(Some(name))
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "<anonymous>"),
        }
    }
}

/// Which half of a key pair applies to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeTier {
    Privileged,
    Standard,
}

impl PrivilegeTier {
    /// Derive the tier of `identity` under `config`.
    pub fn of(config: &ConfigDocument, identity: &Identity) -> Self {
        let admin = config.get_text(ADMIN_NAME).filter(|name| !name.is_empty());
        match (identity.name(), admin) {
            (Some(name), Some(admin)) if name == admin => PrivilegeTier::Privileged,
            _ => PrivilegeTier::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivilegeTier::Privileged => "privileged",
            PrivilegeTier::Standard => "standard",
        }
    }
}

impl std::fmt::Display for PrivilegeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks which key a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    /// Value from the `privileged*` key
    Privileged,
    /// Value from the `standard*` key
    Standard,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Privileged => write!(f, "privileged"),
            ValueSource::Standard => write!(f, "standard"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    /// The resolved value
    pub value: &'a ConfigValue,
    /// Which half of the pair it came from
    pub source: ValueSource,
    /// The configuration key that was read
    pub key: &'static str,
}

/// Resolve a key pair for a caller.
///
/// Returns `None` when neither key applies; callers treat that as
/// "feature disabled", not as an error.
pub fn resolve<'a>(
    config: &'a ConfigDocument,
    identity: &Identity,
    pair: KeyPair,
) -> Option<Resolved<'a>> {
    if PrivilegeTier::of(config, identity) == PrivilegeTier::Privileged {
        if let Some(value) = config.get(pair.privileged).filter(|v| !v.is_empty()) {
            return Some(Resolved {
                value,
                source: ValueSource::Privileged,
                key: pair.privileged,
            });
        }
    }

    config.get(pair.standard).map(|value| Resolved {
        value,
        source: ValueSource::Standard,
        key: pair.standard,
    })
}

/// Resolve a pair holding a choice list.
pub fn resolve_choices(
    config: &ConfigDocument,
    identity: &Identity,
    pair: KeyPair,
) -> Result<Option<Vec<ModeChoice>>> {
    match resolve(config, identity, pair) {
        None => Ok(None),
        Some(resolved) => resolved
            .value
            .as_choices()
            .map(|choices| Some(choices.to_vec()))
            .ok_or_else(|| Error::Config(format!("'{}' must be a choice list", resolved.key))),
    }
}

/// Resolve a pair holding an id list.
pub fn resolve_ids(
    config: &ConfigDocument,
    identity: &Identity,
    pair: KeyPair,
) -> Result<Option<Vec<i64>>> {
    match resolve(config, identity, pair) {
        None => Ok(None),
        Some(resolved) => resolved
            .value
            .as_ids()
            .map(Some)
            .ok_or_else(|| Error::Config(format!("'{}' must be an id list", resolved.key))),
    }
}

/// Everything a form needs to know about the caller, resolved once per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum RenderContext {
    /// The global system mode form.
    SystemMode { modes: Vec<ModeChoice> },
    /// A circuit or tank form.
    Entity {
        kind: EntityKind,
        ids: Vec<i64>,
        /// `None` when run-mode overrides are disabled for this caller.
        run_modes: Option<Vec<ModeChoice>>,
    },
}

impl RenderContext {
    /// Context for the system mode form.
    pub fn system_mode(config: &ConfigDocument, identity: &Identity) -> Result<Self> {
        let modes = resolve_choices(config, identity, MODES)?
            .ok_or_else(|| Error::ConfigurationDisabled(MODES.standard.to_string()))?;
        Ok(RenderContext::SystemMode { modes })
    }

    /// Context for the forms of one entity kind.
    pub fn entity(config: &ConfigDocument, identity: &Identity, kind: EntityKind) -> Result<Self> {
        let id_keys = kind.id_keys();
        let ids = resolve_ids(config, identity, id_keys)?
            .ok_or_else(|| Error::ConfigurationDisabled(id_keys.standard.to_string()))?;
        let run_modes = resolve_choices(config, identity, kind.run_mode_keys())?;
        Ok(RenderContext::Entity {
            kind,
            ids,
            run_modes,
        })
    }

    /// Turn a raw path segment into an addressable entity.
    ///
    /// Fails with `MalformedIdentifier` for non-integers and `UnknownEntity`
    /// for ids the caller cannot see.
    pub fn address(&self, raw_id: &str) -> Result<EntityRef> {
        match self {
            RenderContext::Entity { kind, ids, .. } => {
                let entity = EntityRef::parse(*kind, raw_id)?;
                if ids.contains(&entity.id) {
                    Ok(entity)
                } else {
                    Err(Error::UnknownEntity {
                        kind: *kind,
                        id: entity.id,
                    })
                }
            }
            RenderContext::SystemMode { .. } => Err(Error::Other(
                "the system mode has no addressable entities".to_string(),
            )),
        }
    }

    /// Entities visible to the caller, empty for the system context.
    pub fn visible(&self) -> Vec<EntityRef> {
        match self {
            RenderContext::Entity { kind, ids, .. } => {
                ids.iter().map(|id| EntityRef::new(*kind, *id)).collect()
            }
            RenderContext::SystemMode { .. } => Vec::new(),
        }
    }
}
