//! Resolution sweeper — quiet-period auto-resolution
//!
//! A single long-lived loop, independent of request traffic, that demotes
//! PAUSED and SURVEILLANCE services back to NORMAL once the quiet period
//! elapses without new failure events. Mutations go through the same
//! [`StateStore`] exclusion scope as the event path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::notifier::{notify_best_effort, Notifier, Severity};
use crate::store::StateStore;
use crate::types::{HistoryEventKind, RecoveryHistoryEntry, ServiceStatus};

pub struct ResolutionSweeper {
    store: Arc<StateStore>,
    notifier: Arc<dyn Notifier>,
    config: Arc<AppConfig>,
}

impl ResolutionSweeper {
    pub fn new(
        store: Arc<StateStore>,
        notifier: Arc<dyn Notifier>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Run the sweep loop until cancelled (call from `tokio::spawn`).
    pub async fn run(self, cancel_token: CancellationToken) {
        info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            quiet_period_secs = self.config.quiet_period.as_secs(),
            "Resolution sweeper started"
        );

        let mut interval = tokio::time::interval(self.config.sweep_interval);
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Resolution sweeper received shutdown signal");
                    return;
                }
                _ = interval.tick() => {
                    self.sweep_once(Utc::now()).await;
                }
            }
        }
    }

    /// One sweep pass. Returns how many services were resolved.
    /// `now` is injected so tests can drive the clock.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> usize {
        let quiet = match chrono::Duration::from_std(self.config.quiet_period) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Quiet period out of range, skipping sweep");
                return 0;
            }
        };
        let history_limit = self.store.history_limit();

        let resolved = self
            .store
            .mutate(|doc| {
                let eligible: Vec<(String, HistoryEventKind)> = doc
                    .services
                    .iter()
                    .filter_map(|(name, rec)| {
                        // Admin-paused services may never have seen an event;
                        // fall back to the pause timestamp.
                        let reference = rec
                            .last_message_time
                            .or_else(|| rec.pause_info.as_ref().map(|p| p.paused_at));
                        let quiet_elapsed =
                            reference.map_or(true, |t| now.signed_duration_since(t) >= quiet);
                        if !quiet_elapsed {
                            return None;
                        }
                        match rec.status {
                            ServiceStatus::Paused => {
                                Some((name.clone(), HistoryEventKind::ResolvedManually))
                            }
                            ServiceStatus::SurveillancePostRestart => {
                                Some((name.clone(), HistoryEventKind::ResolvedAutomatically))
                            }
                            ServiceStatus::Normal => None,
                        }
                    })
                    .collect();

                for (name, kind) in &eligible {
                    doc.record_mut(name).mark_normal();
                    doc.push_history(
                        RecoveryHistoryEntry {
                            service: name.clone(),
                            timestamp: now,
                            event_kind: *kind,
                            details: format!(
                                "no failure events for {}s, back to normal",
                                quiet.num_seconds()
                            ),
                        },
                        history_limit,
                    );
                }
                eligible
            })
            .await;

        for (service, kind) in &resolved {
            info!(%service, resolution = %kind, "Quiet period elapsed, service resolved");
            let how = match kind {
                HistoryEventKind::ResolvedManually => "resolved (no events since pause)",
                _ => "stabilized after restart",
            };
            notify_best_effort(
                self.notifier.as_ref(),
                Severity::Success,
                &format!(
                    "**Service**: `{service}`\n\
                     **Status**: {how} — monitoring resumed"
                ),
            )
            .await;
        }

        resolved.len()
    }
}
