//! Gateway adapter speaking JSON to an HTTP bridge in front of the daemon.
//!
//! Property reads are `GET {base}/{path}` returning a bare JSON value;
//! writes are `PUT` with a bare JSON body; clearing an override is a
//! `DELETE`. Every request shares one agent whose timeout bounds the round
//! trip.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{
    EntityGateway, FailureKind, GatewayError, GatewayResult, GatewayTarget, Setpoints,
};
use crate::entity::EntityRef;

/// Blocking client for the control bridge.
#[derive(Clone)]
pub struct HttpGateway {
    agent: ureq::Agent,
    base_url: String,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpGateway {
    /// Create a client for `base_url` with a per-call timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        target: GatewayTarget,
        path: &str,
    ) -> GatewayResult<T> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| GatewayError::new(operation, target, classify(e)))?;
        response.into_json::<T>().map_err(|e| {
            GatewayError::new(operation, target, FailureKind::Protocol(e.to_string()))
        })
    }

    fn put<B: Serialize>(
        &self,
        operation: &'static str,
        target: GatewayTarget,
        path: &str,
        body: B,
    ) -> GatewayResult<()> {
        let url = self.url(path);
        tracing::debug!("PUT {}", url);
        self.agent
            .put(&url)
            .send_json(body)
            .map(|_| ())
            .map_err(|e| GatewayError::new(operation, target, classify(e)))
    }

    fn delete(
        &self,
        operation: &'static str,
        target: GatewayTarget,
        path: &str,
    ) -> GatewayResult<()> {
        let url = self.url(path);
        tracing::debug!("DELETE {}", url);
        self.agent
            .delete(&url)
            .call()
            .map(|_| ())
            .map_err(|e| GatewayError::new(operation, target, classify(e)))
    }

    fn entity_get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        entity: EntityRef,
        property: &str,
    ) -> GatewayResult<T> {
        self.get(
            operation,
            GatewayTarget::Entity(entity),
            &format!("{}/{}", entity.path(), property),
        )
    }
}

/// Map a ureq failure onto the gateway taxonomy.
///
/// 4xx means the bridge refused the call; 5xx and transport errors
/// (including timeouts) mean the service is unavailable.
fn classify(error: ureq::Error) -> FailureKind {
    match error {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let detail = if body.is_empty() {
                format!("HTTP {}", code)
            } else {
                format!("HTTP {}: {}", code, body.trim())
            };
            if code >= 500 {
                FailureKind::Unavailable(detail)
            } else {
                FailureKind::Rejected(detail)
            }
        }
        ureq::Error::Transport(transport) => FailureKind::Unavailable(transport.to_string()),
    }
}

impl EntityGateway for HttpGateway {
    fn name(&self, entity: EntityRef) -> GatewayResult<String> {
        self.entity_get("name", entity, "name")
    }

    fn standing_mode(&self, entity: EntityRef) -> GatewayResult<i64> {
        self.entity_get("standing_mode", entity, "runmode_orig")
    }

    fn current_mode(&self, entity: EntityRef) -> GatewayResult<i64> {
        self.entity_get("current_mode", entity, "runmode")
    }

    fn override_active(&self, entity: EntityRef) -> GatewayResult<bool> {
        self.entity_get("override_active", entity, "override")
    }

    fn set_override(&self, entity: EntityRef, mode: i64) -> GatewayResult<()> {
        self.put(
            "set_override",
            GatewayTarget::Entity(entity),
            &format!("{}/override", entity.path()),
            mode,
        )
    }

    fn clear_override(&self, entity: EntityRef) -> GatewayResult<()> {
        self.delete(
            "clear_override",
            GatewayTarget::Entity(entity),
            &format!("{}/override", entity.path()),
        )
    }

    fn offset(&self, entity: EntityRef) -> GatewayResult<f64> {
        self.entity_get("offset", entity, "offset")
    }

    fn set_offset(&self, entity: EntityRef, offset: f64) -> GatewayResult<()> {
        self.put(
            "set_offset",
            GatewayTarget::Entity(entity),
            &format!("{}/offset", entity.path()),
            offset,
        )
    }

    fn setpoints(&self, entity: EntityRef) -> GatewayResult<Setpoints> {
        self.entity_get("setpoints", entity, "setpoints")
    }

    fn has_ambient_sensor(&self, entity: EntityRef) -> GatewayResult<bool> {
        self.entity_get("has_ambient_sensor", entity, "ambient")
    }

    fn system_mode(&self) -> GatewayResult<u8> {
        self.get("system_mode", GatewayTarget::Runtime, "runtime/system_mode")
    }

    fn set_system_mode(&self, primary: u8) -> GatewayResult<()> {
        self.put(
            "set_system_mode",
            GatewayTarget::Runtime,
            "runtime/system_mode",
            primary,
        )
    }

    fn suppress_flag(&self) -> GatewayResult<bool> {
        self.get("suppress_flag", GatewayTarget::Runtime, "runtime/suppress")
    }

    fn set_suppress_flag(&self, suppress: bool) -> GatewayResult<()> {
        self.put(
            "set_suppress_flag",
            GatewayTarget::Runtime,
            "runtime/suppress",
            suppress,
        )
    }

    fn temperature(&self, sensor: i64) -> GatewayResult<f64> {
        self.get(
            "temperature",
            GatewayTarget::Sensor(sensor),
            &format!("temperatures/{}", sensor),
        )
    }
}
