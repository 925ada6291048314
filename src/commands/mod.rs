//! Command implementations for the Thermogate CLI.
//!
//! - `config check` - load and validate a configuration file
//! - `config resolve` - show what one caller resolves to
//! - `serve` - assemble the service state from CLI arguments

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cli::ServeArgs;
use crate::config::resolver::resolve;
use crate::config::{
    self, ADMIN_NAME, ALL_PAIRS, APP_TITLE, ConfigDocument, ConfigValue, Identity, PrivilegeTier,
    RenderContext, ValueSource,
};
use crate::entity::EntityKind;
use crate::gateway::{EntityGateway, HttpGateway, MemoryGateway};
use crate::notify::{Notifier, WebhookSink};
use crate::server::{AppState, ServerOptions};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Pick the configuration file: explicit path, else the default location.
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    explicit.or_else(config::default_config_path).ok_or_else(|| {
        Error::InvalidInput(format!(
            "no configuration file given and no default location (set {})",
            config::CONFIG_PATH_ENV
        ))
    })
}

/// Load a configuration file and validate it.
pub fn load_config(path: &Path) -> Result<ConfigDocument> {
    let document = ConfigDocument::load(path)?;
    tracing::debug!(path = %path.display(), keys = document.len(), "Configuration loaded");
    Ok(document)
}

// ==================== config check ====================

#[derive(Serialize)]
pub struct ConfigCheck {
    pub path: String,
    pub valid: bool,
    pub version: i64,
    pub keys: Vec<String>,
    pub admin_configured: bool,
}

impl Output for ConfigCheck {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Configuration OK: {}", self.path)];
        lines.push(format!("  version: {}", self.version));
        lines.push(format!(
            "  admin: {}",
            if self.admin_configured { "configured" } else { "none" }
        ));
        lines.push(format!("  keys ({}):", self.keys.len()));
        for key in &self.keys {
            lines.push(format!("    {}", key));
        }
        lines.join("\n")
    }
}

pub fn config_check(path: &Path) -> Result<ConfigCheck> {
    let document = load_config(path)?;
    Ok(ConfigCheck {
        path: path.display().to_string(),
        valid: true,
        version: document.version(),
        keys: document.entries().map(|(key, _)| key.to_string()).collect(),
        admin_configured: document
            .get_text(ADMIN_NAME)
            .is_some_and(|name| !name.is_empty()),
    })
}

// ==================== config resolve ====================

#[derive(Serialize)]
pub struct ResolvedPair {
    pub privileged_key: &'static str,
    pub standard_key: &'static str,
    /// `None` when the pair is unset for this caller
    pub source: Option<ValueSource>,
    pub value: Option<ConfigValue>,
}

#[derive(Serialize)]
pub struct ConfigResolution {
    pub identity: Option<String>,
    pub tier: PrivilegeTier,
    pub app_title: Option<String>,
    pub pairs: Vec<ResolvedPair>,
    /// Forms the caller can reach, in route order.
    pub reachable: Vec<String>,
}

impl Output for ConfigResolution {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Identity: {} ({})",
            self.identity.as_deref().unwrap_or("<anonymous>"),
            self.tier
        )];
        for pair in &self.pairs {
            let shown = match (&pair.source, &pair.value) {
                (Some(source), Some(value)) => format!(
                    "{} [{}]",
                    serde_json::to_string(value).unwrap_or_default(),
                    source
                ),
                _ => "disabled".to_string(),
            };
            lines.push(format!("  {}: {}", pair.standard_key, shown));
        }
        if self.reachable.is_empty() {
            lines.push("Reachable: nothing".to_string());
        } else {
            lines.push(format!("Reachable: {}", self.reachable.join(", ")));
        }
        lines.join("\n")
    }
}

pub fn config_resolve(path: &Path, identity: Option<String>) -> Result<ConfigResolution> {
    let document = load_config(path)?;
    let identity = identity.map(Identity::new).unwrap_or_default();

    let pairs = ALL_PAIRS
        .iter()
        .map(|pair| {
            let resolved = resolve(&document, &identity, *pair);
            ResolvedPair {
                privileged_key: pair.privileged,
                standard_key: pair.standard,
                source: resolved.as_ref().map(|r| r.source),
                value: resolved.map(|r| r.value.clone()),
            }
        })
        .collect();

    let mut reachable = Vec::new();
    if RenderContext::system_mode(&document, &identity).is_ok() {
        reachable.push("/".to_string());
    }
    for kind in EntityKind::ALL {
        if let Ok(context) = RenderContext::entity(&document, &identity, kind) {
            reachable.extend(context.visible().iter().map(|e| format!("/{}", e.path())));
        }
    }

    Ok(ConfigResolution {
        identity: identity.name().map(str::to_string),
        tier: PrivilegeTier::of(&document, &identity),
        app_title: document.get_text(APP_TITLE).map(str::to_string),
        pairs,
        reachable,
    })
}

// ==================== serve ====================

/// Build the service state and listen options from `serve` arguments.
pub fn prepare_serve(args: &ServeArgs) -> Result<(AppState, ServerOptions)> {
    let path = config_path(args.config.clone())?;
    let document = load_config(&path)?;

    let gateway: Arc<dyn EntityGateway> = match (&args.gateway_url, args.simulate) {
        (_, true) => {
            tracing::info!("Using simulated plant");
            Arc::new(MemoryGateway::demo())
        }
        (Some(url), false) => {
            tracing::info!(url = %url, "Using control bridge");
            Arc::new(HttpGateway::new(
                url,
                Duration::from_millis(args.gateway_timeout_ms),
            ))
        }
        (None, false) => {
            return Err(Error::InvalidInput(
                "either --gateway-url or --simulate is required".to_string(),
            ));
        }
    };

    let notifier = match &args.notify_url {
        Some(url) => Notifier::new(Arc::new(WebhookSink::new(
            url,
            Duration::from_millis(args.notify_timeout_ms),
        ))),
        None => Notifier::log_only(),
    };

    let state = AppState::new(Arc::new(document), gateway, notifier)
        .with_identity_header(&args.identity_header);
    let options = ServerOptions {
        host: args.host.clone(),
        port: args.port,
        announce: true,
    };
    Ok((state, options))
}
