//! End-to-end tests of the HTTP surface against the in-memory gateway.

mod common;

use std::sync::Arc;

use common::{SAMPLE_CONFIG, spawn_app};
use reqwest::StatusCode;
use serde_json::Value;
use thermogate::config::ConfigDocument;
use thermogate::entity::{EntityKind, EntityRef};
use thermogate::gateway::{Call, EntityGateway, MemoryGateway};
use thermogate::notify::{Notifier, RecordingSink};
use thermogate::server::{AppState, build_router};

struct Harness {
    base: String,
    client: reqwest::Client,
    gateway: Arc<MemoryGateway>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    async fn start() -> Self {
        Self::with_gateway(MemoryGateway::demo()).await
    }

    async fn with_gateway(gateway: MemoryGateway) -> Self {
        let config: ConfigDocument = SAMPLE_CONFIG.parse().unwrap();
        let gateway = Arc::new(gateway);
        let sink = Arc::new(RecordingSink::new());
        let state = AppState::new(
            Arc::new(config),
            gateway.clone(),
            Notifier::new(sink.clone()),
        );
        let base = spawn_app(build_router(state)).await;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        Self {
            base,
            client,
            gateway,
            sink,
        }
    }

    async fn get(&self, path: &str, user: Option<&str>) -> (StatusCode, Value) {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if let Some(user) = user {
            request = request.header("x-remote-user", user);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn post(
        &self,
        path: &str,
        user: Option<&str>,
        form: &[(&str, &str)],
    ) -> reqwest::Response {
        let mut request = self.client.post(format!("{}{}", self.base, path)).form(form);
        if let Some(user) = user {
            request = request.header("x-remote-user", user);
        }
        request.send().await.unwrap()
    }
}

fn circuit(id: i64) -> EntityRef {
    EntityRef::new(EntityKind::Circuit, id)
}

static NULL: Value = Value::Null;

fn field<'a>(page: &'a Value, key: &str) -> &'a Value {
    page["form"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["key"] == key)
        .unwrap_or(&NULL)
}

// ==================== System Mode Tests ====================

#[tokio::test]
async fn test_system_page_for_standard_caller() {
    let h = Harness::start().await;
    let (status, page) = h.get("/", Some("bob")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["tier"], "standard");
    assert_eq!(field(&page, "sysmode")["choices"].as_array().unwrap().len(), 2);
    assert_eq!(page["sensors"].as_array().unwrap().len(), 1);
    assert_eq!(page["sensors"][0]["location"], "outdoor");
    assert_eq!(page["sensors"][0]["temperature"], 7.5);
}

#[tokio::test]
async fn test_system_page_for_admin() {
    let h = Harness::start().await;
    let (_, page) = h.get("/", Some("admin")).await;

    assert_eq!(page["tier"], "privileged");
    assert_eq!(field(&page, "sysmode")["choices"].as_array().unwrap().len(), 3);
    // no privileged outdoor list, so the standard one applies
    let locations: Vec<&str> = page["sensors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["location"].as_str().unwrap())
        .collect();
    assert_eq!(locations, vec!["outdoor", "indoor"]);
}

#[tokio::test]
async fn test_system_submit_applies_and_publishes() {
    let h = Harness::start().await;
    let response = h.post("/", Some("bob"), &[("sysmode", "2"), ("suppress", "on")]).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/");
    assert_eq!(
        h.gateway.calls(),
        vec![Call::SetSystemMode(2), Call::SetSuppressFlag(true)]
    );
    assert_eq!(h.sink.published(), vec![130]);

    let (_, page) = h.get("/", Some("bob")).await;
    assert_eq!(page["system_mode"], 130);
    assert_eq!(field(&page, "suppress")["value"], true);
}

#[tokio::test]
async fn test_system_submit_mode_outside_tier_rejected() {
    let h = Harness::start().await;
    let response = h.post("/", Some("bob"), &[("sysmode", "5")]).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page: Value = response.json().await.unwrap();
    assert_eq!(field(&page, "sysmode")["error"], "not an allowed choice");
    assert_eq!(field(&page, "sysmode")["value"], 5);
    assert!(h.gateway.calls().is_empty());
    assert!(h.sink.published().is_empty());
}

#[tokio::test]
async fn test_admin_may_use_privileged_mode() {
    let h = Harness::start().await;
    let response = h.post("/", Some("admin"), &[("sysmode", "5")]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(h.sink.published(), vec![5]);
}

#[tokio::test]
async fn test_system_partial_failure_is_distinct() {
    let h = Harness::start().await;
    h.gateway.fail_on("set_suppress_flag");
    let response = h.post("/", None, &[("sysmode", "2")]).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "partial_mutation_failure");
    assert!(h.sink.published().is_empty());
}

#[tokio::test]
async fn test_gateway_down_is_bad_gateway() {
    let h = Harness::start().await;
    h.gateway.fail_on("system_mode");
    let (status, body) = h.get("/", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "gateway_error");
}

// ==================== Entity Tests ====================

#[tokio::test]
async fn test_circuit_list_follows_tier() {
    let h = Harness::start().await;

    let (_, standard) = h.get("/circuits", Some("bob")).await;
    assert_eq!(standard["entities"].as_array().unwrap().len(), 1);
    assert_eq!(standard["entities"][0]["name"], "Ground floor");
    assert_eq!(standard["entities"][0]["path"], "/circuits/0");

    let (_, admin) = h.get("/circuits", Some("admin")).await;
    assert_eq!(admin["entities"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_tanks_disabled_for_standard_tier() {
    let h = Harness::start().await;
    let (status, body) = h.get("/tanks", Some("bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "configuration_disabled");

    let (status, _) = h.get("/tanks/0", Some("admin")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_entity_addressing_errors() {
    let h = Harness::start().await;

    let (status, body) = h.get("/circuits/1", Some("bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unknown_entity");

    let (status, body) = h.get("/circuits/abc", Some("bob")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed_identifier");
}

#[tokio::test]
async fn test_circuit_form_has_override_fields() {
    let h = Harness::start().await;
    let (status, page) = h.get("/circuits/0", Some("bob")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["kind"], "circuit");
    assert_eq!(page["id"], 0);
    assert_eq!(field(&page, "name")["value"], "Ground floor");
    assert_eq!(field(&page, "name")["editable"], false);
    assert_eq!(field(&page, "runmode")["choices"].as_array().unwrap().len(), 2);
    assert_eq!(field(&page, "override")["value"], false);
    assert_eq!(page["state"]["standing_mode"], 1);
}

#[tokio::test]
async fn test_tank_form_without_run_modes_is_offset_only() {
    let h = Harness::start().await;
    let (_, page) = h.get("/tanks/0", Some("admin")).await;

    assert_eq!(field(&page, "offset")["editable"], true);
    assert_eq!(field(&page, "runmode"), &Value::Null);
    assert_eq!(field(&page, "override"), &Value::Null);
    assert_eq!(field(&page, "comfort")["value"], "55.0");
}

#[tokio::test]
async fn test_override_set_then_collapsed() {
    let h = Harness::start().await;

    let response = h
        .post(
            "/circuits/0",
            Some("bob"),
            &[("offset", "-1.5"), ("runmode", "3"), ("override", "on")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/circuits/0");
    assert_eq!(
        h.gateway.calls(),
        vec![
            Call::SetOffset(circuit(0), -1.5),
            Call::SetOverride(circuit(0), 3),
        ]
    );
    assert!(h.gateway.override_active(circuit(0)).unwrap());

    // Requesting the standing mode clears instead of setting it.
    h.gateway.clear_calls();
    h.post(
        "/circuits/0",
        Some("bob"),
        &[("offset", "-1.5"), ("runmode", "1"), ("override", "on")],
    )
    .await;
    assert_eq!(
        h.gateway.calls(),
        vec![
            Call::SetOffset(circuit(0), -1.5),
            Call::ClearOverride(circuit(0)),
        ]
    );
    assert!(!h.gateway.override_active(circuit(0)).unwrap());
}

#[tokio::test]
async fn test_unchecked_override_clears() {
    let h = Harness::start().await;
    h.gateway.set_override(circuit(0), 3).unwrap();
    h.gateway.clear_calls();

    let response = h
        .post("/circuits/0", None, &[("offset", "0"), ("runmode", "3")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        h.gateway.calls(),
        vec![Call::SetOffset(circuit(0), 0.0), Call::ClearOverride(circuit(0))]
    );
}

#[tokio::test]
async fn test_invalid_entity_submission_rerenders() {
    let h = Harness::start().await;
    let response = h
        .post(
            "/circuits/0",
            Some("bob"),
            &[("offset", "warm"), ("runmode", "9"), ("name", "Hacked")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page: Value = response.json().await.unwrap();
    assert_eq!(field(&page, "offset")["error"], "not a decimal number");
    assert_eq!(field(&page, "offset")["value"], "warm");
    assert_eq!(field(&page, "runmode")["error"], "not an allowed choice");
    assert_eq!(field(&page, "name")["value"], "Ground floor");
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_overflowing_offset_is_a_field_error() {
    let h = Harness::start().await;
    let huge = "9".repeat(400);
    let response = h
        .post(
            "/circuits/0",
            None,
            &[("offset", huge.as_str()), ("runmode", "3"), ("override", "on")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page: Value = response.json().await.unwrap();
    assert_eq!(field(&page, "offset")["error"], "not a decimal number");
    assert!(h.gateway.calls().is_empty());
    assert_eq!(h.gateway.offset(circuit(0)).unwrap(), 0.0);
}

#[tokio::test]
async fn test_entity_partial_failure() {
    let h = Harness::start().await;
    h.gateway.fail_on("set_override");
    let response = h
        .post(
            "/circuits/0",
            None,
            &[("offset", "1"), ("runmode", "3"), ("override", "on")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "partial_mutation_failure");
    assert_eq!(h.gateway.calls(), vec![Call::SetOffset(circuit(0), 1.0)]);
}

#[tokio::test]
async fn test_hidden_entity_cannot_be_mutated() {
    let h = Harness::start().await;
    let response = h
        .post("/circuits/1", Some("bob"), &[("offset", "1")])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(h.gateway.calls().is_empty());
}

// ==================== Misc Tests ====================

#[tokio::test]
async fn test_manifest_uses_app_title() {
    let h = Harness::start().await;
    let (status, manifest) = h.get("/manifest.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(manifest["name"], "Boiler room");
    assert_eq!(manifest["start_url"], "/");
}

#[tokio::test]
async fn test_status_reports_gateway() {
    let h = Harness::start().await;
    let (status, body) = h.get("/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "thermogate");
    assert_eq!(body["gateway"], "reachable");
    assert_eq!(body["system_mode"], 1);

    h.gateway.fail_on("system_mode");
    let (_, body) = h.get("/api/status", None).await;
    assert_eq!(body["gateway"], "unreachable");
    assert_eq!(body["system_mode"], Value::Null);
}
