//! Whole-session risk analysis.
//!
//! Loads a bounded recent window of events, asks the threat model for an
//! assessment, then commits the result and its risk snapshot together
//! through the aggregator. A commit the aggregator discards as stale
//! writes neither, so the current score never disagrees with the latest
//! snapshot.

use crate::aggregator::SessionRiskAggregator;
use crate::bounded;
use chrono::Utc;
use sessionguard_core::{
    clamp_risk_score, dedup_patterns, AnalysisConfig, EventStore, ProjectId, Result, RiskSnapshot,
    SessionAssessment, SessionId, ThreatModel,
};
use std::sync::Arc;
use uuid::Uuid;

/// Orchestrates whole-session risk assessments.
pub struct SessionAnalyzer {
    events: Arc<dyn EventStore>,
    aggregator: Arc<SessionRiskAggregator>,
    threat_model: Arc<dyn ThreatModel>,
    max_events: usize,
    timeout_ms: u64,
}

impl SessionAnalyzer {
    pub fn new(
        events: Arc<dyn EventStore>,
        aggregator: Arc<SessionRiskAggregator>,
        threat_model: Arc<dyn ThreatModel>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            events,
            aggregator,
            threat_model,
            max_events: config.max_events_to_analyze,
            timeout_ms: config.detection_timeout_ms,
        }
    }

    /// Run one analysis pass for a session.
    ///
    /// Returns `None` without touching any state when the session has no
    /// events. On success the returned assessment is already clamped and
    /// deduplicated. A result that lost the commit race is still returned;
    /// it simply leaves no trace in the aggregate state or snapshot history.
    pub async fn analyze(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
        trigger_event_id: Option<Uuid>,
    ) -> Result<Option<SessionAssessment>> {
        let events = self
            .events
            .fetch_recent_events(session_id, self.max_events)
            .await?;
        if events.is_empty() {
            return Ok(None);
        }

        let seq = self.aggregator.begin_analysis(project_id, session_id).await;

        let raw = match bounded(
            self.timeout_ms,
            "session analysis",
            self.threat_model
                .analyze_session(project_id, session_id, &events),
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                self.aggregator
                    .abort_analysis(project_id, session_id, seq)
                    .await;
                return Err(e);
            }
        };

        let mut patterns = raw.patterns;
        dedup_patterns(&mut patterns);
        let assessment = SessionAssessment {
            risk_score: clamp_risk_score(raw.risk_score),
            patterns,
            explanation: raw.explanation,
        };

        let snapshot = RiskSnapshot {
            id: Uuid::new_v4(),
            session_id: session_id.clone(),
            project_id,
            event_id: trigger_event_id.or_else(|| events.last().map(|e| e.id)),
            risk_score: assessment.risk_score,
            patterns: assessment.patterns.clone(),
            explanation: assessment.explanation.clone(),
            created_at: Utc::now(),
        };
        self.aggregator
            .commit_analysis(project_id, session_id, seq, &snapshot)
            .await?;

        Ok(Some(assessment))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
