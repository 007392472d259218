//! In-memory store backends for testing.
//!
//! Stores all data in memory. Not intended for production use.

use async_trait::async_trait;
use chrono::Utc;
use sessionguard_core::{
    clamp_risk_score, dedup_patterns, Event, EventStore, Policy, PolicyStore, ProjectId, Result,
    RiskSnapshot, Session, SessionGuardError, SessionId, SessionStore,
};
use tokio::sync::RwLock;
use uuid::Uuid;

// ===========================================================================
// InMemoryEventStore
// ===========================================================================

/// In-memory event store.
///
/// Data is lost when the struct is dropped. All queries are `O(n)` linear
/// scans over the insertion-ordered event log.
pub struct InMemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventStore {
    /// Create a new, empty in-memory event store.
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert_event(&self, event: &Event) -> Result<()> {
        let mut events = self.events.write().await;
        events.retain(|e| e.id != event.id);
        events.push(event.clone());
        Ok(())
    }

    async fn fetch_recent_events(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        let matching: Vec<Event> = events
            .iter()
            .filter(|e| &e.session_id == session_id)
            .cloned()
            .collect();

        // The log is insertion-ordered (oldest first); keep the last `limit`.
        let start = matching.len().saturating_sub(limit);
        Ok(matching[start..].to_vec())
    }

    async fn merge_event_metadata(
        &self,
        event_id: Uuid,
        partial: serde_json::Value,
    ) -> Result<()> {
        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| SessionGuardError::NotFound {
                resource: format!("event {event_id}"),
            })?;

        let mut merged = serde_json::to_value(&event.metadata)?;
        if let (Some(target), Some(source)) = (merged.as_object_mut(), partial.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        event.metadata = serde_json::from_value(merged)?;
        Ok(())
    }

    async fn count_events(&self, session_id: &SessionId) -> Result<u64> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|e| &e.session_id == session_id).count() as u64)
    }
}

// ===========================================================================
// InMemorySessionStore
// ===========================================================================

/// In-memory session and risk-snapshot store.
pub struct InMemorySessionStore {
    sessions: RwLock<Vec<Session>>,
    snapshots: RwLock<Vec<RiskSnapshot>>,
}

impl InMemorySessionStore {
    /// Create a new, empty in-memory session store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(Vec::new()),
            snapshots: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn upsert_session_activity(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions
            .iter_mut()
            .find(|s| s.project_id == project_id && &s.id == session_id)
        {
            Some(session) => session.last_activity_at = Utc::now(),
            None => sessions.push(Session::new(project_id, session_id.clone())),
        }
        Ok(())
    }

    async fn update_session_risk(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
        risk_score: f64,
        patterns: &[String],
    ) -> Result<()> {
        let mut deduped = patterns.to_vec();
        dedup_patterns(&mut deduped);
        let score = clamp_risk_score(risk_score);

        let mut sessions = self.sessions.write().await;
        match sessions
            .iter_mut()
            .find(|s| s.project_id == project_id && &s.id == session_id)
        {
            Some(session) => {
                session.current_risk_score = score;
                session.current_patterns = deduped;
                session.last_activity_at = Utc::now();
            }
            None => {
                let mut session = Session::new(project_id, session_id.clone());
                session.current_risk_score = score;
                session.current_patterns = deduped;
                sessions.push(session);
            }
        }
        Ok(())
    }

    async fn read_session(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
    ) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .iter()
            .find(|s| s.project_id == project_id && &s.id == session_id)
            .cloned())
    }

    async fn append_risk_snapshot(&self, snapshot: &RiskSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn read_latest_risk_snapshot(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<RiskSnapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .iter()
            .filter(|s| &s.session_id == session_id)
            .last()
            .cloned())
    }

    async fn list_risk_snapshots(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<RiskSnapshot>> {
        let snapshots = self.snapshots.read().await;
        let mut matching: Vec<RiskSnapshot> = snapshots
            .iter()
            .filter(|s| &s.session_id == session_id)
            .cloned()
            .collect();
        matching.reverse();
        matching.truncate(limit);
        Ok(matching)
    }
}

// ===========================================================================
// InMemoryPolicyStore
// ===========================================================================

/// In-memory policy configuration store.
pub struct InMemoryPolicyStore {
    policies: RwLock<Vec<Policy>>,
}

impl InMemoryPolicyStore {
    /// Create a new, empty in-memory policy store.
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace a policy (test/configuration helper; the pipeline
    /// itself never writes policies).
    pub async fn insert_policy(&self, policy: Policy) {
        let mut policies = self.policies.write().await;
        policies.retain(|p| p.id != policy.id);
        policies.push(policy);
    }
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn list_enabled_policies(&self, project_id: ProjectId) -> Result<Vec<Policy>> {
        let policies = self.policies.read().await;
        let mut enabled: Vec<Policy> = policies
            .iter()
            .filter(|p| p.project_id == project_id && p.enabled)
            .cloned()
            .collect();
        enabled.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(enabled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sessionguard_core::{EventType, PolicyAction, PolicyConditions, Role};
    use serde_json::json;

    fn make_event(project: ProjectId, session: &str, content: &str) -> Event {
        Event::new(project, SessionId::from(session), EventType::UserMessage)
            .with_role(Role::User)
            .with_content(content)
    }

    // -- Event store --

    #[tokio::test]
    async fn fetch_recent_events_window_is_oldest_first() {
        let store = InMemoryEventStore::new();
        let project = ProjectId::new();

        for i in 0..5 {
            store
                .insert_event(&make_event(project, "s1", &format!("msg {i}")))
                .await
                .unwrap();
        }

        let window = store
            .fetch_recent_events(&SessionId::from("s1"), 3)
            .await
            .unwrap();

        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content.as_deref(), Some("msg 2"));
        assert_eq!(window[2].content.as_deref(), Some("msg 4"));
    }

    #[tokio::test]
    async fn fetch_recent_events_scoped_to_session() {
        let store = InMemoryEventStore::new();
        let project = ProjectId::new();

        store
            .insert_event(&make_event(project, "s1", "a"))
            .await
            .unwrap();
        store
            .insert_event(&make_event(project, "s2", "b"))
            .await
            .unwrap();

        let window = store
            .fetch_recent_events(&SessionId::from("s1"), 50)
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content.as_deref(), Some("a"));

        assert_eq!(store.count_events(&SessionId::from("s2")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn merge_event_metadata_preserves_existing_fields() {
        let store = InMemoryEventStore::new();
        let project = ProjectId::new();

        let mut event = make_event(project, "s1", "trace");
        event.metadata.tool_name = Some("search".to_string());
        store.insert_event(&event).await.unwrap();

        store
            .merge_event_metadata(event.id, json!({ "custom": "value" }))
            .await
            .unwrap();

        let window = store
            .fetch_recent_events(&SessionId::from("s1"), 1)
            .await
            .unwrap();
        assert_eq!(window[0].metadata.tool_name.as_deref(), Some("search"));
        assert_eq!(window[0].metadata.extra.get("custom").unwrap(), "value");
    }

    #[tokio::test]
    async fn merge_event_metadata_missing_event_is_not_found() {
        let store = InMemoryEventStore::new();
        let result = store
            .merge_event_metadata(Uuid::new_v4(), json!({ "x": 1 }))
            .await;
        assert!(matches!(result, Err(SessionGuardError::NotFound { .. })));
    }

    // -- Session store --

    #[tokio::test]
    async fn upsert_creates_then_refreshes() {
        let store = InMemorySessionStore::new();
        let project = ProjectId::new();
        let session_id = SessionId::from("s1");

        store
            .upsert_session_activity(project, &session_id)
            .await
            .unwrap();
        let first = store
            .read_session(project, &session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.current_risk_score, 0.0);

        store
            .upsert_session_activity(project, &session_id)
            .await
            .unwrap();
        let second = store
            .read_session(project, &session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(second.last_activity_at >= first.last_activity_at);
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn sessions_scoped_per_project() {
        let store = InMemorySessionStore::new();
        let project_a = ProjectId::new();
        let project_b = ProjectId::new();
        let session_id = SessionId::from("shared-id");

        store
            .upsert_session_activity(project_a, &session_id)
            .await
            .unwrap();
        store
            .update_session_risk(project_a, &session_id, 0.9, &["x".to_string()])
            .await
            .unwrap();

        assert!(store
            .read_session(project_b, &session_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_session_risk_clamps_and_dedups() {
        let store = InMemorySessionStore::new();
        let project = ProjectId::new();
        let session_id = SessionId::from("s1");

        store
            .update_session_risk(
                project,
                &session_id,
                1.7,
                &["a".to_string(), "b".to_string(), "a".to_string()],
            )
            .await
            .unwrap();

        let session = store
            .read_session(project, &session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.current_risk_score, 1.0);
        assert_eq!(session.current_patterns, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn read_missing_session_is_none_not_error() {
        let store = InMemorySessionStore::new();
        let result = store
            .read_session(ProjectId::new(), &SessionId::from("nope"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn latest_snapshot_is_last_appended() {
        let store = InMemorySessionStore::new();
        let project = ProjectId::new();
        let session_id = SessionId::from("s1");

        for score in [0.1, 0.5, 0.9] {
            store
                .append_risk_snapshot(&RiskSnapshot {
                    id: Uuid::new_v4(),
                    session_id: session_id.clone(),
                    project_id: project,
                    event_id: None,
                    risk_score: score,
                    patterns: vec![],
                    explanation: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let latest = store
            .read_latest_risk_snapshot(&session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.risk_score, 0.9);

        let history = store.list_risk_snapshots(&session_id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].risk_score, 0.9);
        assert_eq!(history[1].risk_score, 0.5);
    }

    // -- Policy store --

    #[tokio::test]
    async fn disabled_policies_excluded() {
        let store = InMemoryPolicyStore::new();
        let project = ProjectId::new();

        let enabled = Policy::new(
            project,
            "enabled",
            PolicyConditions::default(),
            PolicyAction::Flag,
        );
        let mut disabled = Policy::new(
            project,
            "disabled",
            PolicyConditions::default(),
            PolicyAction::Block,
        );
        disabled.enabled = false;

        store.insert_policy(enabled).await;
        store.insert_policy(disabled).await;

        let listed = store.list_enabled_policies(project).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "enabled");
    }

    #[tokio::test]
    async fn policies_listed_in_creation_order() {
        let store = InMemoryPolicyStore::new();
        let project = ProjectId::new();

        for name in ["first", "second", "third"] {
            store
                .insert_policy(Policy::new(
                    project,
                    name,
                    PolicyConditions::default(),
                    PolicyAction::Notify,
                ))
                .await;
        }

        let listed = store.list_enabled_policies(project).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }
}
