//! KDL schema for the configuration document.
//!
//! This module provides:
//! - The typed values a configuration key can hold
//! - Parsing from a KDL document, with load-time validation
//! - Typed accessors used by the resolver
//!
//! A node maps to a value by shape:
//!
//! ```kdl
//! adminName "admin"          // one argument: scalar
//! standardCircuits 0 1 2     // several integer arguments: id list
//! standardTanks              // no argument: empty list
//! standardModes {            // children: choice list, display order kept
//!     choice 2 "Auto"
//!     choice 4 "Eco"
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use kdl::{KdlDocument, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

use crate::config::{ADMIN_NAME, APP_TITLE, CHOICE_PAIRS, ID_PAIRS, MODES, VERSION};
use crate::reconcile::PRIMARY_MASK;
use crate::{Error, Result};

/// The only document version this build understands.
pub const SUPPORTED_VERSION: i64 = 1;

/// A selectable `(code, label)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeChoice {
    pub code: i64,
    pub label: String,
}

impl ModeChoice {
    pub fn new(code: i64, label: impl Into<String>) -> Self {
        Self {
            code,
            label: label.into(),
        }
    }
}

/// A single scalar setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// Value held under a configuration key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Scalar(Scalar),
    Choices(Vec<ModeChoice>),
    Ids(Vec<i64>),
}

impl ConfigValue {
    /// Text value, if this is a text scalar.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Choice list. An empty list written without children counts as an
    /// empty choice list.
    pub fn as_choices(&self) -> Option<&[ModeChoice]> {
        match self {
            ConfigValue::Choices(choices) => Some(choices),
            ConfigValue::Ids(ids) if ids.is_empty() => Some(&[]),
            _ => None,
        }
    }

    /// Id list. A single integer scalar is a one-element list.
    pub fn as_ids(&self) -> Option<Vec<i64>> {
        match self {
            ConfigValue::Ids(ids) => Some(ids.clone()),
            ConfigValue::Scalar(Scalar::Int(id)) => Some(vec![*id]),
            _ => None,
        }
    }

    /// Whether the value carries nothing usable.
    pub fn is_empty(&self) -> bool {
        match self {
            ConfigValue::Scalar(Scalar::Text(s)) => s.is_empty(),
            ConfigValue::Scalar(_) => false,
            ConfigValue::Choices(choices) => choices.is_empty(),
            ConfigValue::Ids(ids) => ids.is_empty(),
        }
    }
}

/// The loaded configuration document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigDocument {
    version: i64,
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            version: SUPPORTED_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load and validate a document from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        content
            .parse::<Self>()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Build a document from a parsed KDL document.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self> {
        let mut config = Self::new();
        let mut version_seen = false;

        for node in doc.nodes() {
            let key = node.name().value();

            if key == VERSION {
                if version_seen {
                    return Err(Error::Config("duplicate key 'version'".to_string()));
                }
                version_seen = true;
                config.version = parse_version(node)?;
                continue;
            }

            if config.entries.contains_key(key) {
                return Err(Error::Config(format!("duplicate key '{}'", key)));
            }
            let value = parse_value(node)?;
            config.entries.insert(key.to_string(), value);
        }

        config.validate()?;
        Ok(config)
    }

    /// Builder-style insert, mostly for tests and the simulator.
    pub fn with(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    /// Document format version.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Look up a text key.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_text)
    }

    /// Iterate over all keys and values in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of keys set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the shape of every known key.
    ///
    /// Unknown keys are kept and reported through the log only.
    pub fn validate(&self) -> Result<()> {
        if self.version != SUPPORTED_VERSION {
            return Err(Error::Config(format!(
                "unsupported configuration version {} (expected {})",
                self.version, SUPPORTED_VERSION
            )));
        }

        for key in [ADMIN_NAME, APP_TITLE] {
            if let Some(value) = self.get(key) {
                if value.as_text().is_none() {
                    return Err(Error::Config(format!("'{}' must be a string", key)));
                }
            }
        }

        for pair in CHOICE_PAIRS {
            for key in [pair.privileged, pair.standard] {
                if let Some(value) = self.get(key) {
                    if value.as_choices().is_none() {
                        return Err(Error::Config(format!(
                            "'{}' must be a block of `choice <code> \"<label>\"` entries",
                            key
                        )));
                    }
                }
            }
        }

        // System-mode codes share a byte with the suppress bit.
        for key in [MODES.privileged, MODES.standard] {
            let choices = self.get(key).and_then(ConfigValue::as_choices).unwrap_or_default();
            if let Some(bad) = choices
                .iter()
                .find(|c| !(0..=i64::from(PRIMARY_MASK)).contains(&c.code))
            {
                return Err(Error::Config(format!(
                    "'{}': mode code {} outside 0..={}",
                    key, bad.code, PRIMARY_MASK
                )));
            }
        }

        for pair in ID_PAIRS {
            for key in [pair.privileged, pair.standard] {
                if let Some(value) = self.get(key) {
                    if value.as_ids().is_none() {
                        return Err(Error::Config(format!(
                            "'{}' must be a list of integer ids",
                            key
                        )));
                    }
                }
            }
        }

        for key in self.entries.keys() {
            if !is_known_key(key) {
                tracing::warn!("Unrecognised configuration key '{}'", key);
            }
        }

        Ok(())
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for ConfigDocument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let doc: KdlDocument = s
            .parse()
            .map_err(|e| Error::Config(format!("Failed to parse KDL: {}", e)))?;
        Self::from_kdl(&doc)
    }
}

fn is_known_key(key: &str) -> bool {
    key == ADMIN_NAME
        || key == APP_TITLE
        || CHOICE_PAIRS
            .iter()
            .chain(ID_PAIRS.iter())
            .any(|pair| pair.privileged == key || pair.standard == key)
}

fn parse_version(node: &KdlNode) -> Result<i64> {
    let args = positional_args(node)?;
    match args.as_slice() {
        [KdlValue::Integer(v)] => i64::try_from(*v)
            .map_err(|_| Error::Config(format!("version {} out of range", v))),
        _ => Err(Error::Config(
            "'version' takes a single integer argument".to_string(),
        )),
    }
}

fn parse_value(node: &KdlNode) -> Result<ConfigValue> {
    let key = node.name().value();
    let args = positional_args(node)?;

    if let Some(children) = node.children() {
        if !args.is_empty() {
            return Err(Error::Config(format!(
                "'{}' cannot have both arguments and a choice block",
                key
            )));
        }
        return parse_choices(key, children).map(ConfigValue::Choices);
    }

    match args.as_slice() {
        [] => Ok(ConfigValue::Ids(Vec::new())),
        [single] => parse_scalar(key, single).map(ConfigValue::Scalar),
        many => many
            .iter()
            .map(|value| integer(key, value))
            .collect::<Result<Vec<_>>>()
            .map(ConfigValue::Ids),
    }
}

fn parse_choices(key: &str, children: &KdlDocument) -> Result<Vec<ModeChoice>> {
    let mut choices = Vec::new();
    let mut seen = HashSet::new();

    for child in children.nodes() {
        if child.name().value() != "choice" {
            return Err(Error::Config(format!(
                "'{}': unexpected entry '{}', expected `choice <code> \"<label>\"`",
                key,
                child.name().value()
            )));
        }
        let args = positional_args(child)?;
        let (code, label) = match args.as_slice() {
            [code, KdlValue::String(label)] => (integer(key, code)?, label.clone()),
            _ => {
                return Err(Error::Config(format!(
                    "'{}': choice entries take an integer code and a string label",
                    key
                )));
            }
        };
        if !seen.insert(code) {
            return Err(Error::Config(format!(
                "'{}': duplicate choice code {}",
                key, code
            )));
        }
        choices.push(ModeChoice::new(code, label));
    }

    Ok(choices)
}

fn parse_scalar(key: &str, value: &KdlValue) -> Result<Scalar> {
    match value {
        KdlValue::String(s) => Ok(Scalar::Text(s.clone())),
        KdlValue::Integer(_) => integer(key, value).map(Scalar::Int),
        KdlValue::Float(f) => Ok(Scalar::Float(*f)),
        KdlValue::Bool(b) => Ok(Scalar::Bool(*b)),
        KdlValue::Null => Err(Error::Config(format!("'{}' cannot be null", key))),
    }
}

fn integer(key: &str, value: &KdlValue) -> Result<i64> {
    match value {
        KdlValue::Integer(i) => i64::try_from(*i)
            .map_err(|_| Error::Config(format!("'{}': integer {} out of range", key, i))),
        other => Err(Error::Config(format!(
            "'{}': expected an integer, got {:?}",
            key, other
        ))),
    }
}

fn positional_args(node: &KdlNode) -> Result<Vec<KdlValue>> {
    let mut args = Vec::new();
    for entry in node.entries() {
        if let Some(name) = entry.name() {
            return Err(Error::Config(format!(
                "'{}': properties are not supported (found '{}')",
                node.name().value(),
                name.value()
            )));
        }
        args.push(entry.value().clone());
    }
    Ok(args)
}
