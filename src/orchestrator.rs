//! Recovery orchestrator — the decision core
//!
//! Given a classified health event and the current service record, decides
//! whether to count, ignore, trigger the two-step restart, or escalate to
//! PAUSED, and performs the transition.
//!
//! Locking discipline: decisions and commits run inside the store's
//! exclusion scope, but the restart itself (up to two command timeouts plus
//! the settle delay) does not — holding the lock across it would stall the
//! sweeper for minutes. The persisted `recovery_pending` marker covers that
//! window: duplicate events arriving mid-restart are acknowledged without
//! re-triggering, and a crash mid-sequence is recovered as PAUSED at the
//! next startup.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::classifier::{ClassifiedEvent, EventKind};
use crate::config::AppConfig;
use crate::executor::RemediationExecutor;
use crate::notifier::{notify_best_effort, Notifier, Severity};
use crate::store::StateStore;
use crate::types::{EventOutcome, HistoryEventKind, RecoveryHistoryEntry, ServiceStatus};

/// What the decision phase (under the store lock) resolved to do.
enum Decision {
    PausedAck,
    SurveillanceEscalated,
    Counted { current: u32, first_warning: bool },
    TriggerRestart { current: u32, first_warning: bool },
}

pub struct RecoveryOrchestrator {
    store: Arc<StateStore>,
    executor: Arc<dyn RemediationExecutor>,
    notifier: Arc<dyn Notifier>,
    config: Arc<AppConfig>,
}

impl RecoveryOrchestrator {
    pub fn new(
        store: Arc<StateStore>,
        executor: Arc<dyn RemediationExecutor>,
        notifier: Arc<dyn Notifier>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            executor,
            notifier,
            config,
        }
    }

    /// Handle one classified inbound event.
    pub async fn handle_event(&self, event: &ClassifiedEvent) -> EventOutcome {
        if let EventKind::Other(kind) = &event.kind {
            info!(service = %event.service, kind, "Ignoring non-restart event");
            return EventOutcome::Ignored {
                reason: "not_restart_event",
            };
        }
        if event.service != self.config.critical_service {
            return EventOutcome::Ignored {
                reason: "not_critical_service",
            };
        }

        let service = event.service.clone();
        let now = Utc::now();
        let threshold = self.config.fail_threshold;
        let history_limit = self.store.history_limit();

        let decision = self
            .store
            .mutate(|doc| {
                let rec = doc.record_mut(&service);
                // Keeps the quiet-period timer accurate even while paused.
                rec.last_message_time = Some(now);

                match rec.status {
                    ServiceStatus::Paused => Decision::PausedAck,
                    ServiceStatus::SurveillancePostRestart => {
                        // The restart did not fix the issue.
                        rec.mark_paused(now, "still unhealthy after restart");
                        doc.push_history(
                            RecoveryHistoryEntry {
                                service: service.clone(),
                                timestamp: now,
                                event_kind: HistoryEventKind::Paused,
                                details: "failure during post-restart surveillance".to_string(),
                            },
                            history_limit,
                        );
                        Decision::SurveillanceEscalated
                    }
                    ServiceStatus::Normal if rec.recovery_pending => {
                        // Restart sequence is mid-flight; never double-trigger.
                        Decision::PausedAck
                    }
                    ServiceStatus::Normal => {
                        rec.fail_count += 1;
                        let current = rec.fail_count;
                        let first_warning = current == 1 && !rec.warning_sent;
                        if first_warning {
                            rec.warning_sent = true;
                        }
                        if current >= threshold {
                            // Persisted intent marker, written before the
                            // first restart command is issued.
                            rec.recovery_pending = true;
                            Decision::TriggerRestart {
                                current,
                                first_warning,
                            }
                        } else {
                            Decision::Counted {
                                current,
                                first_warning,
                            }
                        }
                    }
                }
            })
            .await;

        match decision {
            Decision::PausedAck => {
                info!(%service, "Event acknowledged while paused/mid-recovery");
                EventOutcome::PausedAck
            }
            Decision::SurveillanceEscalated => {
                error!(%service, "Failure during surveillance — pausing for human attention");
                notify_best_effort(
                    self.notifier.as_ref(),
                    Severity::FatalEscalation,
                    &format!(
                        "**Service**: `{service}`\n\
                         **Problem**: still unhealthy after automated restart\n\
                         **Action required**: manual intervention"
                    ),
                )
                .await;
                EventOutcome::PausedAfterFailedRecovery
            }
            Decision::Counted {
                current,
                first_warning,
            } => {
                info!(%service, current, threshold, "Failure counted");
                if first_warning {
                    notify_best_effort(
                        self.notifier.as_ref(),
                        Severity::Warning,
                        &format!(
                            "**Service**: `{service}`\n\
                             First failure of a new streak ({current}/{threshold})"
                        ),
                    )
                    .await;
                }
                EventOutcome::Counted { current, threshold }
            }
            Decision::TriggerRestart {
                current,
                first_warning,
            } => {
                if first_warning {
                    notify_best_effort(
                        self.notifier.as_ref(),
                        Severity::Warning,
                        &format!("**Service**: `{service}`\nFirst failure of a new streak"),
                    )
                    .await;
                }
                notify_best_effort(
                    self.notifier.as_ref(),
                    Severity::Critical,
                    &format!(
                        "**Service**: `{service}`\n\
                         **Consecutive failures**: {current}\n\
                         **Action**: starting automated restart (stop, settle, start)"
                    ),
                )
                .await;
                self.run_restart_sequence(&service, current).await
            }
        }
    }

    /// Execute stop → settle delay → start, then commit the outcome.
    async fn run_restart_sequence(&self, service: &str, fail_count: u32) -> EventOutcome {
        warn!(service, fail_count, "Failure threshold reached — restarting");

        let result = self.restart(service).await;
        let now = Utc::now();
        let history_limit = self.store.history_limit();

        match result {
            Ok(()) => {
                // An admin reset arriving while the restart was in flight
                // clears the pending marker; its state wins over ours.
                let committed = self
                    .store
                    .mutate(|doc| {
                        let rec = doc.record_mut(service);
                        if !rec.recovery_pending {
                            return false;
                        }
                        rec.mark_surveillance();
                        doc.push_history(
                            RecoveryHistoryEntry {
                                service: service.to_string(),
                                timestamp: now,
                                event_kind: HistoryEventKind::RecoveryStarted,
                                details: format!("restart triggered after {fail_count} failures"),
                            },
                            history_limit,
                        );
                        true
                    })
                    .await;
                if committed {
                    info!(service, "Restart complete, entering surveillance");
                } else {
                    info!(service, "State reset while restart was in flight, keeping it");
                }
                EventOutcome::RecoveryInitiated
            }
            Err(reason) => {
                let committed = self
                    .store
                    .mutate(|doc| {
                        let rec = doc.record_mut(service);
                        if !rec.recovery_pending {
                            return false;
                        }
                        rec.mark_paused(now, reason.clone());
                        doc.push_history(
                            RecoveryHistoryEntry {
                                service: service.to_string(),
                                timestamp: now,
                                event_kind: HistoryEventKind::RecoveryFailed,
                                details: reason.clone(),
                            },
                            history_limit,
                        );
                        true
                    })
                    .await;
                if !committed {
                    warn!(service, %reason, "Restart failed but state was reset mid-flight");
                    return EventOutcome::RecoveryFailed { reason };
                }
                error!(service, %reason, "Restart failed — pausing for human attention");
                notify_best_effort(
                    self.notifier.as_ref(),
                    Severity::FatalEscalation,
                    &format!(
                        "**Service**: `{service}`\n\
                         **Failed attempts**: {fail_count}\n\
                         **Problem**: {reason}\n\
                         **Action required**: check system logs and restart manually"
                    ),
                )
                .await;
                EventOutcome::RecoveryFailed { reason }
            }
        }
    }

    /// The two-step restart. Errors name the step that failed so the pause
    /// reason and escalation text are actionable.
    async fn restart(&self, service: &str) -> Result<(), String> {
        self.executor
            .stop(service)
            .await
            .map_err(|e| format!("stop step failed: {e}"))?;

        tokio::time::sleep(self.config.restart_settle_delay).await;

        self.executor
            .start(service)
            .await
            .map_err(|e| format!("start step failed: {e}"))?;
        Ok(())
    }

    /// Administrative pause.
    pub async fn pause(&self, service: &str, reason: &str) {
        let now = Utc::now();
        let history_limit = self.store.history_limit();
        self.store
            .mutate(|doc| {
                doc.record_mut(service).mark_paused(now, reason);
                doc.push_history(
                    RecoveryHistoryEntry {
                        service: service.to_string(),
                        timestamp: now,
                        event_kind: HistoryEventKind::Paused,
                        details: reason.to_string(),
                    },
                    history_limit,
                );
            })
            .await;
        info!(service, reason, "Service paused by operator");
    }

    /// Administrative unpause: status, counter, warning flag, and pause
    /// info cleared as one transition.
    pub async fn unpause(&self, service: &str) {
        self.store
            .mutate(|doc| doc.record_mut(service).mark_normal())
            .await;
        info!(service, "Service unpaused");
    }

    /// Total reset, idempotent from any state.
    pub async fn reset(&self, service: &str) {
        let now = Utc::now();
        let history_limit = self.store.history_limit();
        self.store
            .mutate(|doc| {
                doc.record_mut(service).mark_normal();
                doc.push_history(
                    RecoveryHistoryEntry {
                        service: service.to_string(),
                        timestamp: now,
                        event_kind: HistoryEventKind::Reset,
                        details: "state reset via admin endpoint".to_string(),
                    },
                    history_limit,
                );
            })
            .await;
        info!(service, "Service state reset");
    }

    /// Startup recovery: a record still carrying the `recovery_pending`
    /// marker means the process died between the stop and start steps.
    /// Surface it as PAUSED rather than a silently stale NORMAL record.
    pub async fn recover_interrupted(&self) {
        let now = Utc::now();
        let history_limit = self.store.history_limit();
        let interrupted: Vec<String> = self
            .store
            .mutate(|doc| {
                let names: Vec<String> = doc
                    .services
                    .iter()
                    .filter(|(_, rec)| rec.recovery_pending)
                    .map(|(name, _)| name.clone())
                    .collect();
                for name in &names {
                    doc.record_mut(name)
                        .mark_paused(now, "process interrupted during restart sequence");
                    doc.push_history(
                        RecoveryHistoryEntry {
                            service: name.clone(),
                            timestamp: now,
                            event_kind: HistoryEventKind::RecoveryFailed,
                            details: "restart sequence interrupted by process crash".to_string(),
                        },
                        history_limit,
                    );
                }
                names
            })
            .await;

        for service in interrupted {
            error!(%service, "Found interrupted restart at startup — paused");
            notify_best_effort(
                self.notifier.as_ref(),
                Severity::FatalEscalation,
                &format!(
                    "**Service**: `{service}`\n\
                     **Problem**: controller restarted mid-remediation, outcome unknown\n\
                     **Action required**: verify the stack and reset"
                ),
            )
            .await;
        }
    }
}
