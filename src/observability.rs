//! Correlation ids and structured flow logging

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Install a formatted `tracing` subscriber for hosts that do not bring
/// their own. `RUST_LOG` overrides the default filter. Fails if a global
/// subscriber is already set.
pub fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default_filter = if verbose {
        "hypercert_engine=debug,info"
    } else {
        "hypercert_engine=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// Correlation ID for tracking one flow invocation across components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution context for one mutation flow
///
/// Carries the flow name and correlation id; all step-level events are
/// logged through this so a single user action can be traced end to end.
#[derive(Debug, Clone)]
pub struct FlowContext {
    /// Flow name, e.g. "buy-fraction" or "create-allowlist"
    pub operation: String,

    pub correlation_id: CorrelationId,

    /// Creation timestamp (unix seconds)
    pub started_at: i64,
}

impl FlowContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            correlation_id: CorrelationId::new(),
            started_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn log_started(&self) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            "flow started"
        );
    }

    pub fn log_step(&self, step: &str) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            step = %step,
            "step started"
        );
    }

    pub fn log_step_failed(&self, step: &str, error: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            step = %step,
            error = %error,
            "step failed"
        );
    }

    pub fn log_completed(&self, detail: &str) {
        let elapsed = chrono::Utc::now().timestamp() - self.started_at;
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            detail = %detail,
            elapsed_secs = %elapsed,
            "flow completed"
        );
    }
}
