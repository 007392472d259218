//! Detection backends for SessionGuard.
//!
//! Two [`ThreatModel`] implementations: a deterministic keyword-based
//! heuristic (no network, used in tests and degraded mode) and a remote
//! chat-completions backend for OpenAI-compatible endpoints.

use sessionguard_core::{DetectionConfig, Result, SessionGuardError, ThreatModel};
use std::sync::Arc;

pub mod heuristic;
pub mod inference;

pub use heuristic::HeuristicThreatModel;
pub use inference::InferenceThreatModel;

/// Build the configured [`ThreatModel`] backend.
pub fn build_threat_model(config: &DetectionConfig) -> Result<Arc<dyn ThreatModel>> {
    match config.provider.as_str() {
        "heuristic" => Ok(Arc::new(HeuristicThreatModel::new())),
        "inference" => Ok(Arc::new(InferenceThreatModel::new(config)?)),
        other => Err(SessionGuardError::Config(format!(
            "unknown detection provider: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_selects_backend() {
        let heuristic = DetectionConfig::default();
        assert_eq!(build_threat_model(&heuristic).unwrap().name(), "heuristic");

        let inference = DetectionConfig {
            provider: "inference".to_string(),
            api_key: Some("sk-test".to_string()),
            ..DetectionConfig::default()
        };
        assert_eq!(build_threat_model(&inference).unwrap().name(), "inference");

        let bad = DetectionConfig {
            provider: "quantum".to_string(),
            ..DetectionConfig::default()
        };
        assert!(build_threat_model(&bad).is_err());
    }

    #[test]
    fn inference_requires_api_key() {
        let config = DetectionConfig {
            provider: "inference".to_string(),
            api_key: None,
            ..DetectionConfig::default()
        };
        assert!(build_threat_model(&config).is_err());
    }
}
