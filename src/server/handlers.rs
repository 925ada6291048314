//! Request handlers.
//!
//! Every handler resolves the caller's context first, so a caller never sees
//! or touches anything outside their tier. Gateway access runs on the
//! blocking pool; nothing read from the gateway outlives the request.

use axum::Form as Urlencoded;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;
use serde_json::json;

use super::AppState;
use crate::config::resolver::resolve_ids;
use crate::config::{
    APP_TITLE, ConfigDocument, INDOOR_SENSORS, Identity, OUTDOOR_SENSORS, PrivilegeTier,
    RenderContext,
};
use crate::entity::{EntityKind, EntityRef, EntitySnapshot};
use crate::forms::{
    self, Form, FormModel, OVERRIDE, RUNMODE, RawValues, SUPPRESS, SYSMODE, entity_values,
    system_values,
};
use crate::gateway::EntityGateway;
use crate::reconcile::{MutationPlan, OverrideRequest, SystemModeRequest, read_system_mode};
use crate::{Error, Result};

/// Read the caller's identity from the configured header.
pub fn identity(headers: &HeaderMap, header: &str) -> Identity {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(Identity::new)
        .unwrap_or_default()
}

/// Run gateway work on the blocking pool.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn EntityGateway) -> Result<T> + Send + 'static,
{
    let gateway = state.gateway.clone();
    tokio::task::spawn_blocking(move || f(gateway.as_ref()))
        .await
        .map_err(|e| Error::Other(format!("gateway task failed: {}", e)))?
}

// ==================== System Mode ====================

#[derive(Debug, Serialize)]
struct SensorReading {
    location: &'static str,
    id: i64,
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SystemPage {
    identity: Option<String>,
    tier: PrivilegeTier,
    system_mode: Option<u8>,
    form: FormModel,
    sensors: Vec<SensorReading>,
}

fn sensor_ids(
    config: &ConfigDocument,
    identity: &Identity,
) -> Result<Vec<(&'static str, i64)>> {
    let mut ids = Vec::new();
    for (location, pair) in [("outdoor", OUTDOOR_SENSORS), ("indoor", INDOOR_SENSORS)] {
        for id in resolve_ids(config, identity, pair)?.unwrap_or_default() {
            ids.push((location, id));
        }
    }
    Ok(ids)
}

/// Live composite mode and sensor temperatures. Sensor failures are
/// reported as missing readings.
async fn read_system_state(
    state: &AppState,
    sensors: Vec<(&'static str, i64)>,
) -> Result<(u8, Vec<SensorReading>)> {
    blocking(state, move |gateway| {
        let composite = read_system_mode(gateway)?;
        let readings = sensors
            .into_iter()
            .map(|(location, id)| {
                let temperature = gateway
                    .temperature(id)
                    .inspect_err(|e| tracing::warn!("Sensor read failed: {}", e))
                    .ok();
                SensorReading {
                    location,
                    id,
                    temperature,
                }
            })
            .collect();
        Ok((composite, readings))
    })
    .await
}

pub async fn show_system(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let identity = identity(&headers, &state.identity_header);
    let context = RenderContext::system_mode(&state.config, &identity)?;
    let form = Form::from_context(&context);
    let sensors = sensor_ids(&state.config, &identity)?;

    let (composite, sensors) = read_system_state(&state, sensors).await?;
    let page = SystemPage {
        identity: identity.name().map(str::to_string),
        tier: PrivilegeTier::of(&state.config, &identity),
        system_mode: Some(composite),
        form: form.render(&system_values(composite), None),
        sensors,
    };
    Ok(Json(page).into_response())
}

pub async fn submit_system(
    State(state): State<AppState>,
    headers: HeaderMap,
    Urlencoded(submission): Urlencoded<RawValues>,
) -> Result<Response> {
    let identity = identity(&headers, &state.identity_header);
    let context = RenderContext::system_mode(&state.config, &identity)?;
    let form = Form::from_context(&context);

    let values = match form.validate(&submission) {
        Ok(values) => values,
        Err(Error::Validation(errors)) => {
            let live = blocking(&state, |gateway| Ok(read_system_mode(gateway)?))
                .await
                .inspect_err(|e| tracing::warn!("Live system mode unavailable for re-render: {}", e))
                .ok();
            let shown = form.attempted(&live.map(system_values).unwrap_or_default(), &submission);
            let page = SystemPage {
                identity: identity.name().map(str::to_string),
                tier: PrivilegeTier::of(&state.config, &identity),
                system_mode: live,
                form: form.render(&shown, Some(&errors)),
                sensors: Vec::new(),
            };
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(page)).into_response());
        }
        Err(e) => return Err(e),
    };

    let code = values
        .choice(SYSMODE)
        .ok_or_else(|| Error::Other("validated form lacks a mode".to_string()))?;
    let request = SystemModeRequest::new(code, values.checked(SUPPRESS))?;
    let composite = blocking(&state, move |gateway| request.apply(gateway)).await?;

    tracing::info!(
        identity = %identity,
        system_mode = composite,
        "System mode changed"
    );
    state.notifier.after_commit(composite).await;

    Ok(Redirect::to("/").into_response())
}

// ==================== Entities ====================

#[derive(Debug, Serialize)]
struct EntityListing {
    id: i64,
    name: String,
    path: String,
}

#[derive(Debug, Serialize)]
struct EntityList {
    kind: EntityKind,
    tier: PrivilegeTier,
    entities: Vec<EntityListing>,
}

#[derive(Debug, Serialize)]
struct EntityPage {
    tier: PrivilegeTier,
    #[serde(flatten)]
    entity: EntityRef,
    form: FormModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<EntitySnapshot>,
}

pub async fn list_entities(
    kind: EntityKind,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let identity = identity(&headers, &state.identity_header);
    let context = RenderContext::entity(&state.config, &identity, kind)?;
    let visible = context.visible();

    let entities = blocking(&state, move |gateway| {
        visible
            .into_iter()
            .map(|entity| -> Result<EntityListing> {
                Ok(EntityListing {
                    id: entity.id,
                    name: gateway.name(entity)?,
                    path: format!("/{}", entity.path()),
                })
            })
            .collect::<Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(EntityList {
        kind,
        tier: PrivilegeTier::of(&state.config, &identity),
        entities,
    })
    .into_response())
}

pub async fn show_entity(
    kind: EntityKind,
    State(state): State<AppState>,
    headers: HeaderMap,
    raw_id: String,
) -> Result<Response> {
    let identity = identity(&headers, &state.identity_header);
    let context = RenderContext::entity(&state.config, &identity, kind)?;
    let entity = context.address(&raw_id)?;
    let form = Form::from_context(&context);

    let snapshot =
        blocking(&state, move |gateway| Ok(EntitySnapshot::fetch(gateway, entity)?)).await?;

    Ok(Json(EntityPage {
        tier: PrivilegeTier::of(&state.config, &identity),
        entity,
        form: form.render(&entity_values(&snapshot), None),
        state: Some(snapshot),
    })
    .into_response())
}

pub async fn submit_entity(
    kind: EntityKind,
    State(state): State<AppState>,
    headers: HeaderMap,
    raw_id: String,
    submission: RawValues,
) -> Result<Response> {
    let identity = identity(&headers, &state.identity_header);
    let context = RenderContext::entity(&state.config, &identity, kind)?;
    let entity = context.address(&raw_id)?;
    let form = Form::from_context(&context);

    let values = match form.validate(&submission) {
        Ok(values) => values,
        Err(Error::Validation(errors)) => {
            let snapshot =
                blocking(&state, move |gateway| Ok(EntitySnapshot::fetch(gateway, entity)?))
                    .await
                    .inspect_err(|e| tracing::warn!("Live state unavailable for re-render: {}", e))
                    .ok();
            let live = snapshot.as_ref().map(entity_values).unwrap_or_default();
            let page = EntityPage {
                tier: PrivilegeTier::of(&state.config, &identity),
                entity,
                form: form.render(&form.attempted(&live, &submission), Some(&errors)),
                state: snapshot,
            };
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(page)).into_response());
        }
        Err(e) => return Err(e),
    };

    let offset = values.decimal(forms::OFFSET);
    let request = values.choice(RUNMODE).map(|requested_mode| OverrideRequest {
        requested_mode,
        override_requested: values.checked(OVERRIDE),
    });

    let plan = blocking(&state, move |gateway| {
        let plan = MutationPlan::build(gateway, entity, offset, request)?;
        plan.apply(gateway)?;
        Ok(plan)
    })
    .await?;

    tracing::info!(
        identity = %identity,
        entity = %entity,
        offset = ?plan.offset,
        override_plan = ?plan.override_plan,
        "Entity updated"
    );

    Ok(Redirect::to(&format!("/{}", entity.path())).into_response())
}

// ==================== Misc ====================

pub async fn manifest(State(state): State<AppState>) -> Result<Response> {
    let title = state
        .config
        .get_text(APP_TITLE)
        .filter(|title| !title.is_empty())
        .ok_or_else(|| Error::ConfigurationDisabled(APP_TITLE.to_string()))?;

    Ok(Json(json!({
        "name": title,
        "short_name": title,
        "start_url": "/",
        "display": "standalone",
    }))
    .into_response())
}

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let system_mode = blocking(&state, |gateway| Ok(read_system_mode(gateway)?))
        .await
        .ok();
    let gateway = if system_mode.is_some() {
        "reachable"
    } else {
        "unreachable"
    };

    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("TG_GIT_COMMIT"),
        "built_at": env!("TG_BUILD_TIMESTAMP"),
        "gateway": gateway,
        "system_mode": system_mode,
    }))
}
