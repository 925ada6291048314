//! Best-effort publication of the composite system mode.
//!
//! Listeners outside this process (dashboards, home automation) learn about
//! system-mode changes from a publish after each successful mutation, and
//! once at startup. A failed publish never fails the request that caused it;
//! it is logged and dropped.

mod backoff;

pub use backoff::{MAX_BACKOFF_SECS, calculate_backoff, no_backoff};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gateway::EntityGateway;
use crate::reconcile::{decompose, read_system_mode};

/// Payload published for a system-mode value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Composite value: primary mode plus suppression bit.
    pub system_mode: u8,
    pub primary: u8,
    pub suppress: bool,
    pub published_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(composite: u8) -> Self {
        let (primary, suppress) = decompose(composite);
        Self {
            system_mode: composite,
            primary,
            suppress,
            published_at: Utc::now(),
        }
    }
}

/// Why a publish failed.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish target unreachable: {0}")]
    Transport(String),

    #[error("publish target answered HTTP {0}")]
    Status(u16),
}

/// Destination for notifications. Implementations block for at most their
/// own timeout.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: &Notification) -> Result<(), PublishError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// POSTs each notification as JSON to a fixed URL.
pub struct WebhookSink {
    agent: ureq::Agent,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self {
            agent,
            url: url.to_string(),
        }
    }
}

impl NotificationSink for WebhookSink {
    fn publish(&self, notification: &Notification) -> Result<(), PublishError> {
        match self.agent.post(&self.url).send_json(notification) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => Err(PublishError::Status(code)),
            Err(ureq::Error::Transport(e)) => Err(PublishError::Transport(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        format!("webhook {}", self.url)
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn publish(&self, notification: &Notification) -> Result<(), PublishError> {
        tracing::info!(
            system_mode = notification.system_mode,
            primary = notification.primary,
            suppress = notification.suppress,
            "System mode published"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        "log".to_string()
    }
}

/// Keeps every notification in memory. Used by tests and `serve --simulate`.
#[derive(Debug, Default)]
pub struct RecordingSink {
    published: Mutex<Vec<Notification>>,
    failing: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|p| p.into_inner()) = failing;
    }

    /// Composite values published so far, oldest first.
    pub fn published(&self) -> Vec<u8> {
        self.published
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|n| n.system_mode)
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, notification: &Notification) -> Result<(), PublishError> {
        if *self.failing.lock().unwrap_or_else(|p| p.into_inner()) {
            return Err(PublishError::Transport("recording sink set to fail".to_string()));
        }
        self.published
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(notification.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

/// Post-commit hook shared by the request handlers.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("sink", &self.sink.describe())
            .finish()
    }
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Notifier that only logs.
    pub fn log_only() -> Self {
        Self::new(Arc::new(LogSink))
    }

    /// Publish `composite` after a committed mutation. Never fails.
    pub async fn after_commit(&self, composite: u8) {
        let sink = Arc::clone(&self.sink);
        let notification = Notification::new(composite);
        match tokio::task::spawn_blocking(move || sink.publish(&notification)).await {
            Ok(Ok(())) => {
                tracing::debug!(system_mode = composite, sink = %self.sink.describe(), "Notification sent");
            }
            Ok(Err(e)) => {
                tracing::warn!(system_mode = composite, sink = %self.sink.describe(), "Notification dropped: {}", e);
            }
            Err(e) => {
                tracing::warn!(system_mode = composite, "Notification task failed: {}", e);
            }
        }
    }
}

/// Read the system mode until the gateway answers, then publish it once.
///
/// `backoff` gives the delay before each attempt. Returns the published
/// composite.
pub async fn announce_startup<F>(
    gateway: Arc<dyn EntityGateway>,
    notifier: Notifier,
    backoff: F,
) -> u8
where
    F: Fn(u32) -> Duration,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let delay = backoff(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let gw = Arc::clone(&gateway);
        match tokio::task::spawn_blocking(move || read_system_mode(gw.as_ref())).await {
            Ok(Ok(composite)) => {
                tracing::info!(attempt, system_mode = composite, "Gateway reachable, announcing system mode");
                notifier.after_commit(composite).await;
                return composite;
            }
            Ok(Err(e)) => {
                tracing::warn!(attempt, "Gateway not reachable yet: {}", e);
            }
            Err(e) => {
                tracing::warn!(attempt, "System mode read task failed: {}", e);
            }
        }
    }
}
