//! HTTP boundary: routes, shared state and server startup.
//!
//! Responses are JSON form models; submissions are urlencoded forms. A
//! successful submission redirects (`303`) back to the page it came from.

mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Form as Urlencoded;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::config::ConfigDocument;
use crate::entity::EntityKind;
use crate::forms::RawValues;
use crate::gateway::EntityGateway;
use crate::notify::{self, Notifier};
use crate::{Error, Result};

/// Header carrying the authenticated user when none is configured.
pub const DEFAULT_IDENTITY_HEADER: &str = "x-remote-user";

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Configuration, immutable for the life of the process
    pub config: Arc<ConfigDocument>,
    /// Control service adapter
    pub gateway: Arc<dyn EntityGateway>,
    /// Post-commit notification hook
    pub notifier: Notifier,
    /// Request header holding the caller identity (lowercase)
    pub identity_header: String,
}

impl AppState {
    pub fn new(
        config: Arc<ConfigDocument>,
        gateway: Arc<dyn EntityGateway>,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            gateway,
            notifier,
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
        }
    }

    pub fn with_identity_header(mut self, header: &str) -> Self {
        self.identity_header = header.to_ascii_lowercase();
        self
    }
}

/// Build the router. Circuits and tanks share one set of handlers.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::show_system).post(handlers::submit_system))
        .route("/manifest.json", get(handlers::manifest))
        .route("/api/status", get(handlers::status));

    for kind in EntityKind::ALL {
        let collection = format!("/{}", kind.collection());
        let item = format!("{}/:id", collection);
        router = router
            .route(
                &collection,
                get(move |state: State<AppState>, headers: HeaderMap| {
                    handlers::list_entities(kind, state, headers)
                }),
            )
            .route(
                &item,
                get(
                    move |state: State<AppState>, headers: HeaderMap, Path(id): Path<String>| {
                        handlers::show_entity(kind, state, headers, id)
                    },
                )
                .post(
                    move |state: State<AppState>,
                          headers: HeaderMap,
                          Path(id): Path<String>,
                          Urlencoded(submission): Urlencoded<RawValues>| {
                        handlers::submit_entity(kind, state, headers, id, submission)
                    },
                ),
            );
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Where and how to listen.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    /// Publish the system mode once the gateway answers
    pub announce: bool,
}

/// Start the web server and run until interrupted.
pub async fn start_server(state: AppState, options: &ServerOptions) -> Result<()> {
    let host_addr: std::net::IpAddr = options
        .host
        .parse()
        .map_err(|e| Error::InvalidInput(format!("Invalid host address '{}': {}", options.host, e)))?;
    let addr = SocketAddr::from((host_addr, options.port));

    if options.announce {
        let gateway = Arc::clone(&state.gateway);
        let notifier = state.notifier.clone();
        tokio::spawn(async move {
            notify::announce_startup(gateway, notifier, notify::calculate_backoff).await;
        });
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
