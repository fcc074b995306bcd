//! Notifier — human-readable alerts over Discord-style webhooks
//!
//! Delivery is best-effort and fire-and-forget: a failed or skipped send is
//! logged and never affects controller state, so the alerting path can
//! never cause an alert storm of its own.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Alert severity, mapped to embed color and target webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Success,
    /// Final human-attention escalation — automated remediation is done.
    FatalEscalation,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Success => "SUCCESS",
            Severity::FatalEscalation => "FINAL_STOP",
        }
    }

    fn color(self) -> u32 {
        match self {
            Severity::Info => 3_447_003,           // blue
            Severity::Warning => 16_776_960,       // yellow
            Severity::Critical => 15_158_332,      // orange
            Severity::Success => 3_066_993,        // green
            Severity::FatalEscalation => 15_158_332,
        }
    }

    fn emoji(self) -> &'static str {
        match self {
            Severity::Info => "ℹ️",
            Severity::Warning => "⚠️",
            Severity::Critical => "🚨",
            Severity::Success => "✅",
            Severity::FatalEscalation => "🔴",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Notification delivery errors — logged by callers, never propagated
/// into a state transition.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    ServerError(reqwest::StatusCode),
}

/// Outbound alert contract.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, severity: Severity, message: &str) -> Result<(), NotifyError>;
}

/// Posts formatted embeds to Discord webhooks.
///
/// Two URLs, following the deployment's channel split: routine alerts
/// (warnings, counters, recoveries) and final escalations that ping the
/// on-call channel. An empty URL means that channel is unconfigured and
/// the send is skipped with a log line.
pub struct DiscordNotifier {
    http: reqwest::Client,
    url_routine: String,
    url_final: String,
}

impl DiscordNotifier {
    pub fn new(url_routine: impl Into<String>, url_final: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            url_routine: url_routine.into(),
            url_final: url_final.into(),
        }
    }

    fn url_for(&self, severity: Severity) -> &str {
        match severity {
            Severity::FatalEscalation => &self.url_final,
            _ => &self.url_routine,
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, severity: Severity, message: &str) -> Result<(), NotifyError> {
        let url = self.url_for(severity);
        if url.is_empty() {
            debug!(%severity, "Alert not sent: webhook URL unconfigured");
            return Ok(());
        }

        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
        let payload = serde_json::json!({
            "username": "Autoheal Watchdog",
            "embeds": [{
                "title": format!("{} Autoheal Monitoring — {}", severity.emoji(), severity.label()),
                "description": message,
                "color": severity.color(),
                "timestamp": Utc::now().to_rfc3339(),
                "footer": { "text": format!("Autoheal Controller — host {hostname}") },
            }],
        });

        let resp = self.http.post(url).json(&payload).send().await?;
        if resp.status().is_success() {
            info!(%severity, "Alert delivered");
            Ok(())
        } else {
            Err(NotifyError::ServerError(resp.status()))
        }
    }
}

/// No-op notifier for tests and notification-less deployments.
#[derive(Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, severity: Severity, message: &str) -> Result<(), NotifyError> {
        debug!(%severity, message, "NullNotifier: dropping alert");
        Ok(())
    }
}

/// Deliver an alert, logging delivery failures instead of surfacing them.
pub async fn notify_best_effort(notifier: &dyn Notifier, severity: Severity, message: &str) {
    if let Err(e) = notifier.send(severity, message).await {
        warn!(%severity, error = %e, "Alert delivery failed");
    }
}
