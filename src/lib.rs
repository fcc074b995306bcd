//! Autoheal Controller
//!
//! Auto-remediation controller for a single critical containerized
//! workload. Watches health events pushed over HTTP, counts consecutive
//! failures, triggers a bounded two-step restart at a threshold, tracks
//! the workload through a post-restart surveillance phase, and escalates
//! to a paused human-attention state when automation cannot proceed.
//!
//! ## Architecture
//!
//! - **Event Classifier**: extracts a service name and event kind from an
//!   arbitrary inbound payload (narrative or structured)
//! - **Recovery Orchestrator**: the decision core — count, ignore,
//!   trigger recovery, or pause
//! - **Persistent State Store**: serialized-access durable state (sled)
//! - **Resolution Sweeper**: background quiet-period auto-resolution
//! - **Remediation Executor / Notifier**: external collaborators behind
//!   trait seams

pub mod api;
pub mod classifier;
pub mod config;
pub mod executor;
pub mod notifier;
pub mod orchestrator;
pub mod store;
pub mod sweeper;
pub mod types;

// Re-export the pieces a deployment binary needs
pub use api::{create_app, ControllerState};
pub use classifier::{ClassifiedEvent, ClassifierStrategy, EventKind, NarrativeFirst};
pub use config::AppConfig;
pub use executor::{DockerComposeExecutor, ExecutorError, RemediationExecutor};
pub use notifier::{DiscordNotifier, Notifier, NullNotifier, Severity};
pub use orchestrator::RecoveryOrchestrator;
pub use store::{MemoryBackend, SledBackend, StateStore};
pub use sweeper::ResolutionSweeper;
pub use types::{
    EventOutcome, HistoryEventKind, RecoveryHistoryEntry, ServiceRecord, ServiceStatus,
    StateDocument,
};
