//! Remediation executor
//!
//! Performs the actual restart action for the critical workload. The
//! controller only cares about per-step success, failure, or timeout — the
//! concrete mechanism (docker compose) is behind [`RemediationExecutor`] so
//! tests can script outcomes.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

/// Executor failures. Timeout is a distinct variant — it must never be
/// mistaken for success or collapsed into a generic failure string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("failed to spawn command: {0}")]
    Spawn(String),
}

/// The two-step restart contract: `stop`, then (after a settle delay the
/// orchestrator owns) `start`. Each step enforces its own hard timeout.
#[async_trait]
pub trait RemediationExecutor: Send + Sync {
    async fn stop(&self, service: &str) -> Result<(), ExecutorError>;
    async fn start(&self, service: &str) -> Result<(), ExecutorError>;
}

/// Run a prepared command under a hard timeout, mapping a non-zero exit to
/// `CommandFailed` carrying stderr.
async fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<(), ExecutorError> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| ExecutorError::Timeout(timeout))?
        .map_err(|e| ExecutorError::Spawn(e.to_string()))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(ExecutorError::CommandFailed(stderr))
    }
}

/// Restarts the stack via `docker compose -f <file> down` / `up -d`.
pub struct DockerComposeExecutor {
    compose_file: String,
    step_timeout: Duration,
}

impl DockerComposeExecutor {
    pub fn new(compose_file: impl Into<String>, step_timeout: Duration) -> Self {
        Self {
            compose_file: compose_file.into(),
            step_timeout,
        }
    }

    async fn compose(&self, service: &str, args: &[&str]) -> Result<(), ExecutorError> {
        let mut cmd = Command::new("docker");
        cmd.arg("compose").arg("-f").arg(&self.compose_file).args(args);
        info!(service, compose_file = %self.compose_file, ?args, "Running docker compose");

        match run_with_timeout(cmd, self.step_timeout).await {
            Ok(()) => {
                info!(service, ?args, "docker compose step succeeded");
                Ok(())
            }
            Err(e) => {
                warn!(service, ?args, error = %e, "docker compose step failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl RemediationExecutor for DockerComposeExecutor {
    async fn stop(&self, service: &str) -> Result<(), ExecutorError> {
        self.compose(service, &["down"]).await
    }

    async fn start(&self, service: &str) -> Result<(), ExecutorError> {
        self.compose(service, &["up", "-d"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn successful_command() {
        let result = run_with_timeout(sh("exit 0"), Duration::from_secs(5)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn failing_command_carries_stderr() {
        let result = run_with_timeout(sh("echo boom >&2; exit 1"), Duration::from_secs(5)).await;
        match result {
            Err(ExecutorError::CommandFailed(stderr)) => assert_eq!(stderr, "boom"),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_distinct_from_failure() {
        let result = run_with_timeout(sh("sleep 5"), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ExecutorError::Timeout(_))));
    }
}
