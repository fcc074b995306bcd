//! Controller configuration
//!
//! All tunables come from environment variables with production defaults,
//! matching the deployment contract of the original listener. Call
//! [`AppConfig::from_env`] once at startup and share via `Arc`.

use std::time::Duration;

use tracing::{info, warn};

/// Runtime configuration for the autoheal controller.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// The single workload name this controller acts on.
    pub critical_service: String,
    /// Consecutive failures before the restart sequence triggers.
    pub fail_threshold: u32,
    /// Minimum silence before a PAUSED/SURVEILLANCE service auto-resolves.
    pub quiet_period: Duration,
    /// Shared secret for the `X-Webhook-Token` header. Empty disables
    /// authentication entirely (development mode).
    pub webhook_secret: String,
    /// Optional peer-address prefix that bypasses authentication. Disabled
    /// unless explicitly configured — a deliberate, named policy knob
    /// rather than a hard-coded address check.
    pub trusted_network_prefix: Option<String>,
    /// Compose file handed to the remediation executor.
    pub compose_file: String,
    /// Webhook URL for routine alerts (info/warning/critical/success).
    pub webhook_url_critical: String,
    /// Webhook URL for final human-attention escalations.
    pub webhook_url_final: String,
    /// Wake interval of the resolution sweeper.
    pub sweep_interval: Duration,
    /// Hard ceiling for each restart step (stop, start).
    pub restart_step_timeout: Duration,
    /// Pause between the stop and start steps.
    pub restart_settle_delay: Duration,
    /// Maximum retained recovery-history entries.
    pub history_limit: usize,
    /// Directory for the sled state database.
    pub state_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            critical_service: "searchpy-app-prod".to_string(),
            fail_threshold: 3,
            quiet_period: Duration::from_secs(300),
            webhook_secret: String::new(),
            trusted_network_prefix: None,
            compose_file: "/host/docker-compose.yml".to_string(),
            webhook_url_critical: String::new(),
            webhook_url_final: String::new(),
            sweep_interval: Duration::from_secs(60),
            restart_step_timeout: Duration::from_secs(120),
            restart_settle_delay: Duration::from_secs(5),
            history_limit: 1000,
            state_path: "./data/autoheal".to_string(),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Unparseable numeric env var, using default");
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            critical_service: env_string("CRITICAL_SERVICE_NAME", &defaults.critical_service),
            fail_threshold: u32::try_from(env_u64("CRITICAL_FAIL_COUNT", 3)).unwrap_or(3),
            quiet_period: Duration::from_secs(env_u64("COOLDOWN_PERIOD", 300)),
            webhook_secret: env_string("WEBHOOK_SECRET", ""),
            trusted_network_prefix: std::env::var("TRUSTED_NETWORK_PREFIX")
                .ok()
                .filter(|p| !p.is_empty()),
            compose_file: env_string("COMPOSE_FILE_PATH", &defaults.compose_file),
            webhook_url_critical: env_string("WEBHOOK_URL_CRITICAL", ""),
            webhook_url_final: env_string("WEBHOOK_URL_FINAL", ""),
            sweep_interval: Duration::from_secs(env_u64("SWEEP_INTERVAL", 60)),
            restart_step_timeout: Duration::from_secs(env_u64("RESTART_STEP_TIMEOUT", 120)),
            restart_settle_delay: Duration::from_secs(env_u64("RESTART_SETTLE_DELAY", 5)),
            history_limit: usize::try_from(env_u64("HISTORY_LIMIT", 1000)).unwrap_or(1000),
            state_path: env_string("STATE_PATH", &defaults.state_path),
        }
    }

    /// Whether request authentication is enforced.
    pub fn auth_enabled(&self) -> bool {
        !self.webhook_secret.is_empty()
    }

    /// Log the effective configuration at startup.
    pub fn log_summary(&self) {
        info!(service = %self.critical_service, "Critical service");
        info!(
            threshold = self.fail_threshold,
            quiet_period_secs = self.quiet_period.as_secs(),
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "Remediation policy"
        );
        if self.auth_enabled() {
            info!("Webhook authentication: enabled");
        } else {
            warn!("WEBHOOK_SECRET not set — authentication DISABLED (dev mode only)");
        }
        if let Some(prefix) = &self.trusted_network_prefix {
            warn!(%prefix, "Trusted-network auth bypass enabled");
        }
    }
}
