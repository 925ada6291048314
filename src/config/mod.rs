//! Configuration document and per-caller resolution.
//!
//! The configuration is a single KDL file loaded once at process start:
//!
//! ```kdl
//! version 1
//! adminName "admin"
//! appTitle "Chaufferie"
//!
//! standardModes {
//!     choice 2 "Auto"
//!     choice 4 "Eco"
//! }
//! privilegedModes {
//!     choice 0 "Off"
//!     choice 2 "Auto"
//!     choice 3 "Comfort"
//!     choice 4 "Eco"
//! }
//!
//! standardCircuits 0
//! privilegedCircuits 0 1
//! standardCircuitRunModes {
//!     choice 2 "Comfort"
//!     choice 3 "Eco"
//! }
//! ```
//!
//! Most settings come in pairs: a `privileged*` key read for the configured
//! admin identity and a `standard*` key read for everybody else. Use the
//! [`resolver`] module to pick the effective value for a caller.
//!
//! ## Location
//!
//! `--config` flag > `TG_CONFIG` env var > `~/.config/thermogate/config.kdl`

pub mod resolver;
pub mod schema;

use std::path::PathBuf;

pub use resolver::{Identity, PrivilegeTier, RenderContext, Resolved, ValueSource};
pub use schema::{ConfigDocument, ConfigValue, ModeChoice, Scalar, SUPPORTED_VERSION};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "TG_CONFIG";

/// Identity allowed to read the `privileged*` keys.
pub const ADMIN_NAME: &str = "adminName";

/// Application title; its presence enables the web manifest.
pub const APP_TITLE: &str = "appTitle";

/// Document format version.
pub const VERSION: &str = "version";

/// A privileged/standard pair of configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    pub privileged: &'static str,
    pub standard: &'static str,
}

impl KeyPair {
    pub const fn new(privileged: &'static str, standard: &'static str) -> Self {
        Self {
            privileged,
            standard,
        }
    }
}

/// Global system mode choices.
pub const MODES: KeyPair = KeyPair::new("privilegedModes", "standardModes");

/// Addressable heating circuit ids.
pub const CIRCUITS: KeyPair = KeyPair::new("privilegedCircuits", "standardCircuits");

/// Addressable hot-water tank ids.
pub const TANKS: KeyPair = KeyPair::new("privilegedTanks", "standardTanks");

/// Run-mode choices offered for heating circuits.
pub const CIRCUIT_RUN_MODES: KeyPair =
    KeyPair::new("privilegedCircuitRunModes", "standardCircuitRunModes");

/// Run-mode choices offered for hot-water tanks.
pub const TANK_RUN_MODES: KeyPair = KeyPair::new("privilegedTankRunModes", "standardTankRunModes");

/// Outdoor temperature sensor ids shown on the system page.
pub const OUTDOOR_SENSORS: KeyPair =
    KeyPair::new("privilegedOutdoorSensors", "standardOutdoorSensors");

/// Indoor temperature sensor ids shown on the system page.
pub const INDOOR_SENSORS: KeyPair =
    KeyPair::new("privilegedIndoorSensors", "standardIndoorSensors");

/// Pairs holding `(code, label)` choice lists.
pub const CHOICE_PAIRS: [KeyPair; 3] = [MODES, CIRCUIT_RUN_MODES, TANK_RUN_MODES];

/// Pairs holding id lists.
pub const ID_PAIRS: [KeyPair; 4] = [CIRCUITS, TANKS, OUTDOOR_SENSORS, INDOOR_SENSORS];

/// Every known key pair, in display order.
pub const ALL_PAIRS: [KeyPair; 7] = [
    MODES,
    CIRCUITS,
    CIRCUIT_RUN_MODES,
    TANKS,
    TANK_RUN_MODES,
    OUTDOOR_SENSORS,
    INDOOR_SENSORS,
];

/// Default configuration path: `$TG_CONFIG`, else `~/.config/thermogate/config.kdl`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|dir| dir.join("thermogate").join("config.kdl"))
}
