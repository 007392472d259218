//! Analysis dispatcher.
//!
//! Front door of the pipeline. The ingest path is synchronous and short:
//! persist the raw event and touch the session. Analysis runs as spawned
//! background tasks behind a global concurrency cap so a slow or failing
//! detection backend never blocks ingestion. Completion is observable by
//! polling session state, or through the returned join handles in tests.

use crate::aggregator::SessionRiskAggregator;
use crate::policy::{EvaluationContext, PolicyEngine};
use crate::session_analyzer::SessionAnalyzer;
use crate::trace_analyzer::TraceAnalyzer;
use sessionguard_core::{
    AnalysisConfig, Decision, Event, EventMetadata, EventType, ProjectId, Result,
    SessionGuardError, SessionId, ThreatModel,
};
use sessionguard_storage::Storage;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Join handles for the background analyses spawned by one ingested event.
///
/// The ingest path never awaits these; they exist so tests (and shutdown
/// paths) can observe completion.
#[derive(Default)]
pub struct AnalysisHandles {
    /// Whole-session analysis task, when spawned.
    pub session: Option<JoinHandle<()>>,
    /// Reasoning-trace analysis task, when spawned.
    pub trace: Option<JoinHandle<()>>,
}

impl AnalysisHandles {
    /// Await whichever analyses were spawned.
    pub async fn join(self) {
        if let Some(handle) = self.session {
            let _ = handle.await;
        }
        if let Some(handle) = self.trace {
            let _ = handle.await;
        }
    }
}

/// Orchestrates ingest, background analysis, and policy evaluation.
pub struct AnalysisDispatcher {
    storage: Storage,
    aggregator: Arc<SessionRiskAggregator>,
    session_analyzer: Arc<SessionAnalyzer>,
    trace_analyzer: Arc<TraceAnalyzer>,
    policy_engine: PolicyEngine,
    config: AnalysisConfig,
    analysis_permits: Arc<Semaphore>,
}

impl AnalysisDispatcher {
    pub fn new(
        storage: Storage,
        threat_model: Arc<dyn ThreatModel>,
        config: AnalysisConfig,
    ) -> Self {
        let aggregator = Arc::new(SessionRiskAggregator::new(storage.sessions.clone()));
        let session_analyzer = Arc::new(SessionAnalyzer::new(
            storage.events.clone(),
            aggregator.clone(),
            threat_model.clone(),
            &config,
        ));
        let trace_analyzer = Arc::new(TraceAnalyzer::new(
            storage.events.clone(),
            threat_model,
            &config,
        ));
        let policy_engine = PolicyEngine::new(storage.policies.clone());
        let analysis_permits = Arc::new(Semaphore::new(config.max_concurrent_analyses.max(1)));

        Self {
            storage,
            aggregator,
            session_analyzer,
            trace_analyzer,
            policy_engine,
            config,
            analysis_permits,
        }
    }

    /// The aggregator owning session risk state.
    pub fn aggregator(&self) -> &SessionRiskAggregator {
        &self.aggregator
    }

    /// Ingest one event: persist it, refresh session liveness, and spawn
    /// the applicable background analyses.
    pub async fn ingest_event(&self, event: Event) -> Result<AnalysisHandles> {
        if event.session_id.as_str().is_empty() {
            return Err(SessionGuardError::Validation(
                "session id must not be empty".to_string(),
            ));
        }

        self.storage.events.insert_event(&event).await?;
        self.aggregator
            .touch(event.project_id, &event.session_id)
            .await?;

        let mut handles = AnalysisHandles::default();

        if self.config.enable_session_analysis {
            let analyzer = self.session_analyzer.clone();
            let permits = self.analysis_permits.clone();
            let project_id = event.project_id;
            let session_id = event.session_id.clone();
            let event_id = event.id;

            handles.session = Some(tokio::spawn(async move {
                let Ok(_permit) = permits.acquire().await else {
                    return;
                };
                if let Err(e) = analyzer
                    .analyze(project_id, &session_id, Some(event_id))
                    .await
                {
                    warn!(%project_id, %session_id, %event_id, error = %e, "session analysis failed");
                }
            }));
        }

        if self.config.enable_trace_analysis && event.event_type == EventType::ReasoningTrace {
            let analyzer = self.trace_analyzer.clone();
            let permits = self.analysis_permits.clone();
            let project_id = event.project_id;
            let session_id = event.session_id.clone();
            let event_id = event.id;

            handles.trace = Some(tokio::spawn(async move {
                let Ok(_permit) = permits.acquire().await else {
                    return;
                };
                if let Err(e) = analyzer.analyze(&event).await {
                    warn!(%project_id, %session_id, %event_id, error = %e, "trace analysis failed");
                }
            }));
        }

        Ok(handles)
    }

    /// On-demand evaluation of a session's current risk against its
    /// project's policies.
    ///
    /// A fresh analysis runs first when `force` is set, when the newest
    /// event is a message, or when no risk has been committed yet;
    /// otherwise the committed state is used as-is. If the fresh analysis
    /// fails the evaluation proceeds against the committed (possibly
    /// stale) state rather than erroring out.
    pub async fn evaluate_session(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
        force: bool,
    ) -> Result<Decision> {
        let events = self
            .storage
            .events
            .fetch_recent_events(session_id, self.config.max_events_to_analyze)
            .await?;

        if events.is_empty() {
            return Ok(Decision {
                action: sessionguard_core::PolicyAction::Allow,
                reasons: vec!["No events in session".to_string()],
                triggered_policy_ids: Vec::new(),
                risk_score: 0.0,
                patterns: Vec::new(),
            });
        }

        let committed = self.aggregator.read(project_id, session_id).await?;
        let newest_is_message = events.last().is_some_and(|e| {
            matches!(
                e.event_type,
                EventType::UserMessage | EventType::AssistantMessage
            )
        });
        let risk_is_zero = committed
            .as_ref()
            .map_or(true, |s| s.current_risk_score == 0.0);

        if self.config.enable_session_analysis && (force || newest_is_message || risk_is_zero) {
            if let Err(e) = self
                .session_analyzer
                .analyze(project_id, session_id, None)
                .await
            {
                warn!(%project_id, %session_id, error = %e, "on-demand analysis failed, evaluating committed state");
            }
        } else {
            debug!(%project_id, %session_id, "skipping re-analysis, committed state is fresh");
        }

        let session = self.aggregator.read(project_id, session_id).await?;
        let (risk_score, patterns) = session
            .map(|s| (s.current_risk_score, s.current_patterns))
            .unwrap_or((0.0, Vec::new()));

        let trace_labels = collect_trace_labels(&events);
        let event_count = self.storage.events.count_events(session_id).await?;

        let ctx = EvaluationContext {
            risk_score,
            patterns,
            trace_labels,
            event_count: Some(event_count),
        };
        self.policy_engine.evaluate(project_id, &ctx).await
    }

    /// Persist a decision as a synthetic `policy_decision` event and
    /// return it.
    pub async fn record_decision_event(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
        decision: &Decision,
    ) -> Result<Event> {
        let mut metadata = EventMetadata::default();
        metadata.action = Some(decision.action);
        metadata
            .extra
            .insert("reasons".to_string(), json!(decision.reasons));
        metadata.extra.insert(
            "triggered_policy_ids".to_string(),
            json!(decision.triggered_policy_ids),
        );

        let event = Event::new(project_id, session_id.clone(), EventType::PolicyDecision)
            .with_metadata(metadata);
        self.storage.events.insert_event(&event).await?;
        Ok(event)
    }
}

/// Union of trace labels across analyzed trace events in the window, in
/// first-seen order. `None` when no event in the window carries a trace
/// analysis.
fn collect_trace_labels(events: &[Event]) -> Option<Vec<String>> {
    let mut labels: Vec<String> = Vec::new();
    let mut any_analysis = false;

    for event in events {
        let Some(analysis) = &event.metadata.trace_analysis else {
            continue;
        };
        any_analysis = true;
        for label in &analysis.labels {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
    }

    any_analysis.then_some(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sessionguard_core::TraceAnalysis;

    fn trace_event(labels: &[&str]) -> Event {
        let mut metadata = EventMetadata::default();
        metadata.trace_analysis = Some(TraceAnalysis {
            risk_score: 0.5,
            labels: labels.iter().map(|s| s.to_string()).collect(),
            indicators: vec![],
            summary: String::new(),
            analyzed_at: Utc::now(),
        });
        Event::new(
            ProjectId::new(),
            SessionId::from("s1"),
            EventType::ReasoningTrace,
        )
        .with_metadata(metadata)
    }

    #[test]
    fn trace_labels_absent_without_analysis() {
        let plain = Event::new(
            ProjectId::new(),
            SessionId::from("s1"),
            EventType::UserMessage,
        );
        assert_eq!(collect_trace_labels(&[plain]), None);
    }

    #[test]
    fn trace_labels_union_preserves_order() {
        let events = vec![
            trace_event(&["deception", "hidden_agenda"]),
            trace_event(&["deception", "misalignment"]),
        ];
        assert_eq!(
            collect_trace_labels(&events),
            Some(vec![
                "deception".to_string(),
                "hidden_agenda".to_string(),
                "misalignment".to_string(),
            ])
        );
    }

    #[test]
    fn analyzed_trace_with_no_labels_still_supplies_labels() {
        // An analyzed-but-clean trace yields Some(empty), so label
        // predicates evaluate against an empty set instead of failing for
        // lack of analysis.
        assert_eq!(collect_trace_labels(&[trace_event(&[])]), Some(vec![]));
    }
}
