//! Event classifier
//!
//! Turns an arbitrary inbound JSON payload into a `(service, kind)` pair.
//! Two shapes are understood, tried in order:
//!
//! 1. Narrative: a free-text `content` field containing the literal word
//!    `Container` followed by an optional leading slash and the service
//!    token (the shape emitted by the upstream autoheal notifier).
//! 2. Structured: explicit `container_name` / `type` fields.
//!
//! The extraction order lives behind [`ClassifierStrategy`] so the
//! structured path can be promoted to primary without touching callers.

use regex::Regex;
use serde_json::Value;

/// Classification failures — client-input faults, handled at the boundary.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("no resolvable service name in payload")]
    NoServiceName,
}

/// Kind of health event carried by the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The upstream watchdog attempted (or is about to attempt) a restart.
    RestartAttempt,
    /// Anything else — accepted but ignored by the orchestrator.
    Other(String),
}

/// A successfully classified event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub service: String,
    pub kind: EventKind,
}

/// Pluggable classification strategy.
pub trait ClassifierStrategy: Send + Sync {
    fn classify(&self, payload: &Value) -> Result<ClassifiedEvent, ClassificationError>;
}

/// Default strategy: narrative `content` first, structured fields second.
pub struct NarrativeFirst {
    container_pattern: Regex,
}

impl NarrativeFirst {
    pub fn new() -> Self {
        Self {
            // "Container /my-app-1 found to be unhealthy" -> "my-app-1"
            container_pattern: Regex::new(r"Container\s+/?([A-Za-z0-9_-]+)")
                .expect("container pattern is a valid regex"),
        }
    }
}

impl Default for NarrativeFirst {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierStrategy for NarrativeFirst {
    fn classify(&self, payload: &Value) -> Result<ClassifiedEvent, ClassificationError> {
        let obj = payload.as_object().ok_or(ClassificationError::NotAnObject)?;

        if let Some(content) = obj.get("content").and_then(Value::as_str) {
            if let Some(caps) = self.container_pattern.captures(content) {
                return Ok(ClassifiedEvent {
                    service: caps[1].to_string(),
                    kind: EventKind::RestartAttempt,
                });
            }
        }

        if let Some(name) = obj.get("container_name").and_then(Value::as_str) {
            if name.is_empty() {
                return Err(ClassificationError::NoServiceName);
            }
            let kind = match obj.get("type").and_then(Value::as_str) {
                None | Some("restart_attempt") => EventKind::RestartAttempt,
                Some(other) => EventKind::Other(other.to_string()),
            };
            return Ok(ClassifiedEvent {
                service: name.to_string(),
                kind,
            });
        }

        Err(ClassificationError::NoServiceName)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(payload: Value) -> Result<ClassifiedEvent, ClassificationError> {
        NarrativeFirst::new().classify(&payload)
    }

    #[test]
    fn narrative_with_leading_slash() {
        let event = classify(json!({
            "content": "Container /my-app-1 found to be unhealthy"
        }))
        .unwrap();
        assert_eq!(event.service, "my-app-1");
        assert_eq!(event.kind, EventKind::RestartAttempt);
    }

    #[test]
    fn narrative_without_slash() {
        let event = classify(json!({"content": "Container searchpy-app-prod restarting"})).unwrap();
        assert_eq!(event.service, "searchpy-app-prod");
    }

    #[test]
    fn structured_fallback() {
        let event = classify(json!({
            "container_name": "searchpy-app-prod",
            "type": "restart_attempt"
        }))
        .unwrap();
        assert_eq!(event.service, "searchpy-app-prod");
        assert_eq!(event.kind, EventKind::RestartAttempt);
    }

    #[test]
    fn structured_type_defaults_to_restart_attempt() {
        let event = classify(json!({"container_name": "svc"})).unwrap();
        assert_eq!(event.kind, EventKind::RestartAttempt);
    }

    #[test]
    fn structured_other_type_is_preserved() {
        let event = classify(json!({"container_name": "svc", "type": "oom_kill"})).unwrap();
        assert_eq!(event.kind, EventKind::Other("oom_kill".to_string()));
    }

    #[test]
    fn narrative_miss_falls_back_to_structured() {
        let event = classify(json!({
            "content": "unrelated chatter",
            "container_name": "svc"
        }))
        .unwrap();
        assert_eq!(event.service, "svc");
    }

    #[test]
    fn no_name_is_rejected() {
        assert_eq!(
            classify(json!({"content": "nothing to see"})).unwrap_err(),
            ClassificationError::NoServiceName
        );
        assert_eq!(
            classify(json!({})).unwrap_err(),
            ClassificationError::NoServiceName
        );
    }

    #[test]
    fn non_object_is_rejected() {
        assert_eq!(
            classify(json!("just a string")).unwrap_err(),
            ClassificationError::NotAnObject
        );
    }

    #[test]
    fn empty_structured_name_is_rejected() {
        assert_eq!(
            classify(json!({"container_name": ""})).unwrap_err(),
            ClassificationError::NoServiceName
        );
    }
}
