//! Analysis orchestration and policy decisions for SessionGuard.
//!
//! Wires the store and detection crates into the full pipeline: the
//! [`AnalysisDispatcher`] ingests events and spawns background analyses,
//! the [`SessionRiskAggregator`] owns per-session risk state, the two
//! analyzers drive the threat model at session and trace granularity, and
//! the [`PolicyEngine`] turns the resulting context into a
//! [`sessionguard_core::Decision`].

use sessionguard_core::{Result, SessionGuardError};
use std::future::Future;
use std::time::Duration;

pub mod aggregator;
pub mod config;
pub mod dispatcher;
pub mod policy;
pub mod session_analyzer;
pub mod trace_analyzer;

pub use aggregator::SessionRiskAggregator;
pub use config::load_config;
pub use dispatcher::{AnalysisDispatcher, AnalysisHandles};
pub use policy::{EvaluationContext, PolicyEngine};
pub use session_analyzer::SessionAnalyzer;
pub use trace_analyzer::TraceAnalyzer;

/// Run a threat-model invocation under a bounded timeout. Elapsing the
/// timeout is a recoverable detection-backend failure, not a retry.
pub(crate) async fn bounded<F, T>(timeout_ms: u64, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(SessionGuardError::DetectionBackend(format!(
            "{what} timed out after {timeout_ms}ms"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_through_fast_futures() {
        let result = bounded(1_000, "fast op", async { Ok(42) }).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn bounded_times_out_slow_futures() {
        let result: Result<()> = bounded(10, "slow op", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(SessionGuardError::DetectionBackend(_))
        ));
    }
}
