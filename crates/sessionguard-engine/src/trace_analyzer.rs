//! Per-reasoning-trace analysis.
//!
//! Analyzes a single reasoning-trace event in isolation and merges the
//! result into that event's metadata. Session aggregate state is never
//! written here; the session analyzer picks trace labels up on its next
//! pass through the event window.

use crate::bounded;
use chrono::Utc;
use sessionguard_core::{
    clamp_risk_score, AnalysisConfig, Event, EventStore, EventType, Result, SessionGuardError,
    ThreatModel, TraceAnalysis, TraceAssessment, TraceContext,
};
use serde_json::json;
use std::sync::Arc;

/// Orchestrates analysis of individual reasoning traces.
pub struct TraceAnalyzer {
    events: Arc<dyn EventStore>,
    threat_model: Arc<dyn ThreatModel>,
    max_events: usize,
    timeout_ms: u64,
}

impl TraceAnalyzer {
    pub fn new(
        events: Arc<dyn EventStore>,
        threat_model: Arc<dyn ThreatModel>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            events,
            threat_model,
            max_events: config.max_events_to_analyze,
            timeout_ms: config.detection_timeout_ms,
        }
    }

    /// Analyze one reasoning-trace event and attach the result to its
    /// metadata. Re-analysis overwrites the previous result.
    pub async fn analyze(&self, event: &Event) -> Result<TraceAssessment> {
        if event.event_type != EventType::ReasoningTrace {
            return Err(SessionGuardError::Validation(format!(
                "cannot trace-analyze a {} event",
                event.event_type
            )));
        }
        let raw_trace = event.content.as_deref().ok_or_else(|| {
            SessionGuardError::Validation("reasoning trace event has no content".to_string())
        })?;

        let context = self.surrounding_context(event).await?;

        let raw = bounded(
            self.timeout_ms,
            "trace analysis",
            self.threat_model.analyze_reasoning_trace(
                event.project_id,
                &event.session_id,
                event.id,
                raw_trace,
                context.as_ref(),
            ),
        )
        .await?;

        let assessment = TraceAssessment {
            risk_score: clamp_risk_score(raw.risk_score),
            labels: raw.labels,
            indicators: raw.indicators,
            summary: raw.summary,
        };

        let analysis = TraceAnalysis {
            risk_score: assessment.risk_score,
            labels: assessment.labels.clone(),
            indicators: assessment.indicators.clone(),
            summary: assessment.summary.clone(),
            analyzed_at: Utc::now(),
        };
        self.events
            .merge_event_metadata(event.id, json!({ "trace_analysis": analysis }))
            .await?;

        Ok(assessment)
    }

    /// Derive the surrounding context for a trace: the closest user message
    /// before it and the closest assistant answer after it, within the
    /// recent window. `None` when the trace is not in the window.
    async fn surrounding_context(&self, event: &Event) -> Result<Option<TraceContext>> {
        let window = self
            .events
            .fetch_recent_events(&event.session_id, self.max_events)
            .await?;

        let Some(position) = window.iter().position(|e| e.id == event.id) else {
            return Ok(None);
        };

        let last_user_message = window[..position]
            .iter()
            .rev()
            .find(|e| e.event_type == EventType::UserMessage)
            .and_then(|e| e.content.clone());
        let answer = window[position + 1..]
            .iter()
            .find(|e| e.event_type == EventType::AssistantMessage)
            .and_then(|e| e.content.clone());

        if last_user_message.is_none() && answer.is_none() {
            return Ok(None);
        }
        Ok(Some(TraceContext {
            last_user_message,
            answer,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
