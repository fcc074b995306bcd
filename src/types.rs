//! Core data model for the autoheal controller
//!
//! The durable state is a single [`StateDocument`]: a map of per-service
//! [`ServiceRecord`]s plus a bounded recovery history log. Records are
//! created lazily on first sight of a service name and never deleted.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Counting failures, no remediation in flight.
    #[default]
    Normal,
    /// A restart completed; watching for the service to stabilize.
    /// Any failure in this phase escalates directly to `Paused`.
    SurveillancePostRestart,
    /// Automated remediation exhausted — waiting for a human or for the
    /// quiet-period sweeper to resolve.
    Paused,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Normal => write!(f, "NORMAL"),
            ServiceStatus::SurveillancePostRestart => write!(f, "SURVEILLANCE_POST_RESTART"),
            ServiceStatus::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Why and when a service was paused. Present iff status is `Paused`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseInfo {
    pub paused_at: DateTime<Utc>,
    pub reason: String,
}

/// Controller state for one monitored service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceRecord {
    /// Consecutive unresolved failure events since the last reset.
    pub fail_count: u32,
    /// Time of the most recent inbound event for this service.
    /// Updated even while paused so the quiet-period timer stays accurate.
    pub last_message_time: Option<DateTime<Utc>>,
    pub status: ServiceStatus,
    pub pause_info: Option<PauseInfo>,
    /// True once the first-failure warning fired for the current streak.
    pub warning_sent: bool,
    /// Persisted intent marker: set before the two-step restart issues its
    /// first command, cleared when the outcome is committed. A record found
    /// with this flag at startup means the process died mid-restart.
    pub recovery_pending: bool,
}

impl ServiceRecord {
    /// Transition to `Normal`, clearing the counter, warning flag, pause
    /// info, and pending-recovery marker as one atomic mutation.
    pub fn mark_normal(&mut self) {
        self.status = ServiceStatus::Normal;
        self.pause_info = None;
        self.fail_count = 0;
        self.warning_sent = false;
        self.recovery_pending = false;
    }

    /// Transition to `Paused` with the given reason. The failure counter is
    /// left untouched so `/status` still shows how deep the streak went.
    pub fn mark_paused(&mut self, at: DateTime<Utc>, reason: impl Into<String>) {
        self.status = ServiceStatus::Paused;
        self.pause_info = Some(PauseInfo {
            paused_at: at,
            reason: reason.into(),
        });
        self.recovery_pending = false;
    }

    /// Transition to post-restart surveillance.
    pub fn mark_surveillance(&mut self) {
        self.status = ServiceStatus::SurveillancePostRestart;
        self.pause_info = None;
        self.recovery_pending = false;
    }
}

/// Kind of entry in the recovery history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventKind {
    RecoveryStarted,
    RecoveryFailed,
    ResolvedManually,
    ResolvedAutomatically,
    Reset,
    Paused,
}

impl std::fmt::Display for HistoryEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryEventKind::RecoveryStarted => write!(f, "recovery_started"),
            HistoryEventKind::RecoveryFailed => write!(f, "recovery_failed"),
            HistoryEventKind::ResolvedManually => write!(f, "resolved_manually"),
            HistoryEventKind::ResolvedAutomatically => write!(f, "resolved_automatically"),
            HistoryEventKind::Reset => write!(f, "reset"),
            HistoryEventKind::Paused => write!(f, "paused"),
        }
    }
}

/// One entry in the recovery audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryHistoryEntry {
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub event_kind: HistoryEventKind,
    pub details: String,
}

/// The full persisted state: one record per service ever observed plus the
/// bounded history log. Re-creatable from nothing on cold start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDocument {
    pub services: BTreeMap<String, ServiceRecord>,
    pub history: VecDeque<RecoveryHistoryEntry>,
}

impl StateDocument {
    /// Get or lazily create the record for a service name.
    pub fn record_mut(&mut self, service: &str) -> &mut ServiceRecord {
        self.services.entry(service.to_string()).or_default()
    }

    /// Append a history entry, evicting the oldest beyond `limit`.
    pub fn push_history(&mut self, entry: RecoveryHistoryEntry, limit: usize) {
        self.history.push_back(entry);
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }
}

/// Outcome of handling one inbound health event, mapped by the API layer to
/// a response code so upstream monitoring can tell "nothing happened" from
/// "remediation in flight" from "needs a human".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Event accepted but not acted on (wrong service, wrong event type).
    Ignored { reason: &'static str },
    /// Service is paused (or a restart is mid-flight) — acknowledged
    /// silently, no counting.
    PausedAck,
    /// Failure arrived during post-restart surveillance; escalated to
    /// paused without touching the counter.
    PausedAfterFailedRecovery,
    /// Failure counted, threshold not yet reached.
    Counted { current: u32, threshold: u32 },
    /// Threshold reached and both restart steps succeeded.
    RecoveryInitiated,
    /// Threshold reached but a restart step failed or timed out.
    RecoveryFailed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_info_follows_status() {
        let mut rec = ServiceRecord::default();
        assert_eq!(rec.status, ServiceStatus::Normal);
        assert!(rec.pause_info.is_none());

        rec.mark_paused(Utc::now(), "still unhealthy after restart");
        assert_eq!(rec.status, ServiceStatus::Paused);
        assert!(rec.pause_info.is_some());

        rec.mark_normal();
        assert_eq!(rec.status, ServiceStatus::Normal);
        assert!(rec.pause_info.is_none());
        assert_eq!(rec.fail_count, 0);
        assert!(!rec.warning_sent);
    }

    #[test]
    fn mark_normal_clears_counters() {
        let mut rec = ServiceRecord {
            fail_count: 7,
            warning_sent: true,
            recovery_pending: true,
            ..ServiceRecord::default()
        };
        rec.mark_normal();
        assert_eq!(rec.fail_count, 0);
        assert!(!rec.warning_sent);
        assert!(!rec.recovery_pending);
    }

    #[test]
    fn history_is_bounded() {
        let mut doc = StateDocument::default();
        for i in 0..10 {
            doc.push_history(
                RecoveryHistoryEntry {
                    service: "svc".to_string(),
                    timestamp: Utc::now(),
                    event_kind: HistoryEventKind::Reset,
                    details: format!("entry {i}"),
                },
                4,
            );
        }
        assert_eq!(doc.history.len(), 4);
        assert_eq!(
            doc.history.front().map(|e| e.details.as_str()),
            Some("entry 6")
        );
    }

    #[test]
    fn status_serializes_snake_case() {
        let json =
            serde_json::to_string(&ServiceStatus::SurveillancePostRestart).expect("serialize");
        assert_eq!(json, "\"surveillance_post_restart\"");
    }

    #[test]
    fn record_mut_creates_default() {
        let mut doc = StateDocument::default();
        let rec = doc.record_mut("fresh");
        assert_eq!(rec.fail_count, 0);
        assert_eq!(rec.status, ServiceStatus::Normal);
        assert!(!rec.warning_sent);
    }
}
