//! SQLite storage backend.
//!
//! Provides [`SqliteStore`], a single pool-backed store implementing all
//! three store traits for the "lite" single-node profile.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sessionguard_core::{
    clamp_risk_score, dedup_patterns, Event, EventMetadata, EventStore, EventType, Policy,
    PolicyActions, PolicyConditions, PolicyStore, ProjectId, Result, RiskSnapshot, Role, Session,
    SessionGuardError, SessionId, SessionStore,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Row, Sqlite, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Schema migrations
// ---------------------------------------------------------------------------

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS events (
        id TEXT NOT NULL PRIMARY KEY,
        project_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        role TEXT,
        content TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id, created_at)",
    "CREATE TABLE IF NOT EXISTS sessions (
        id TEXT NOT NULL,
        project_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        last_activity_at TEXT NOT NULL,
        current_risk_score REAL NOT NULL DEFAULT 0,
        current_patterns TEXT NOT NULL DEFAULT '[]',
        PRIMARY KEY (project_id, id)
    )",
    "CREATE TABLE IF NOT EXISTS risk_snapshots (
        id TEXT NOT NULL PRIMARY KEY,
        session_id TEXT NOT NULL,
        project_id TEXT NOT NULL,
        event_id TEXT,
        risk_score REAL NOT NULL,
        patterns TEXT NOT NULL DEFAULT '[]',
        explanation TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_session ON risk_snapshots(session_id, created_at)",
    "CREATE TABLE IF NOT EXISTS policies (
        id TEXT NOT NULL PRIMARY KEY,
        project_id TEXT NOT NULL,
        name TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1,
        conditions TEXT NOT NULL DEFAULT '{}',
        actions TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_policies_project ON policies(project_id, enabled)",
];

// ---------------------------------------------------------------------------
// Pool builder
// ---------------------------------------------------------------------------

/// Open (or create) a SQLite connection pool.
async fn open_pool(database_url: &str) -> Result<SqlitePool> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| SessionGuardError::Storage(format!("Invalid database URL: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    // For in-memory databases every connection gets its own database, so
    // restrict the pool to a single connection to keep a consistent view.
    let max_conns: u32 = if database_url.contains(":memory:") {
        1
    } else {
        10
    };

    sqlx::pool::PoolOptions::<Sqlite>::new()
        .max_connections(max_conns)
        .connect_with(connect_opts)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to connect to SQLite: {e}")))
}

/// Run the schema migrations against the given pool.
async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for statement in MIGRATIONS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| SessionGuardError::Storage(format!("Migration failed: {e}")))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse a [`Uuid`] from a TEXT column value.
fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| SessionGuardError::Storage(format!("Invalid UUID '{s}': {e}")))
}

/// Parse a [`DateTime<Utc>`] from an RFC 3339 TEXT column value.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SessionGuardError::Storage(format!("Invalid datetime '{s}': {e}")))
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| SessionGuardError::Storage(format!("Invalid {what} JSON: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| SessionGuardError::Storage(format!("serialize {what}: {e}")))
}

// ---------------------------------------------------------------------------
// Row conversions
// ---------------------------------------------------------------------------

fn event_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Event> {
    let event_type: EventType = row
        .get::<String, _>("event_type")
        .parse()
        .map_err(SessionGuardError::Storage)?;
    let role: Option<Role> = row
        .get::<Option<String>, _>("role")
        .map(|s| parse_json(&format!("\"{s}\""), "role"))
        .transpose()?;
    let metadata: EventMetadata = parse_json(&row.get::<String, _>("metadata"), "metadata")?;

    Ok(Event {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        project_id: ProjectId(parse_uuid(&row.get::<String, _>("project_id"))?),
        session_id: SessionId::new(row.get::<String, _>("session_id")),
        event_type,
        role,
        content: row.get("content"),
        metadata,
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
    })
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    Ok(Session {
        id: SessionId::new(row.get::<String, _>("id")),
        project_id: ProjectId(parse_uuid(&row.get::<String, _>("project_id"))?),
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        last_activity_at: parse_datetime(&row.get::<String, _>("last_activity_at"))?,
        current_risk_score: row.get("current_risk_score"),
        current_patterns: parse_json(&row.get::<String, _>("current_patterns"), "patterns")?,
    })
}

fn snapshot_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RiskSnapshot> {
    Ok(RiskSnapshot {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        session_id: SessionId::new(row.get::<String, _>("session_id")),
        project_id: ProjectId(parse_uuid(&row.get::<String, _>("project_id"))?),
        event_id: row
            .get::<Option<String>, _>("event_id")
            .map(|s| parse_uuid(&s))
            .transpose()?,
        risk_score: row.get("risk_score"),
        patterns: parse_json(&row.get::<String, _>("patterns"), "patterns")?,
        explanation: row.get("explanation"),
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
    })
}

fn policy_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Policy> {
    let conditions: PolicyConditions = parse_json(&row.get::<String, _>("conditions"), "conditions")?;
    let actions: PolicyActions = parse_json(&row.get::<String, _>("actions"), "actions")?;

    Ok(Policy {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        project_id: ProjectId(parse_uuid(&row.get::<String, _>("project_id"))?),
        name: row.get("name"),
        enabled: row.get::<i64, _>("enabled") != 0,
        conditions,
        actions,
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
    })
}

// ===========================================================================
// SqliteStore
// ===========================================================================

/// SQLite-backed store implementing all three store traits over one
/// shared connection pool.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database and run schema migrations.
    ///
    /// Accepts a plain file path or a `sqlite:` URL (including
    /// `sqlite::memory:`).
    pub async fn connect(database_path: &str) -> Result<Self> {
        let url = if database_path.starts_with("sqlite:") {
            database_path.to_string()
        } else {
            format!("sqlite:{database_path}")
        };
        let pool = open_pool(&url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert or replace a policy (configuration-side write; the pipeline
    /// itself only reads policies).
    pub async fn insert_policy(&self, policy: &Policy) -> Result<()> {
        let conditions_json = to_json(&policy.conditions, "conditions")?;
        let actions_json = to_json(&policy.actions, "actions")?;

        sqlx::query(
            "INSERT OR REPLACE INTO policies (
                id, project_id, name, enabled, conditions, actions, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(policy.id.to_string())
        .bind(policy.project_id.to_string())
        .bind(&policy.name)
        .bind(policy.enabled as i64)
        .bind(&conditions_json)
        .bind(&actions_json)
        .bind(policy.created_at.to_rfc3339())
        .bind(policy.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to insert policy: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn insert_event(&self, event: &Event) -> Result<()> {
        let metadata_json = to_json(&event.metadata, "metadata")?;
        let role_str = event
            .role
            .map(|r| to_json(&r, "role").map(|s| s.trim_matches('"').to_string()))
            .transpose()?;

        sqlx::query(
            "INSERT OR REPLACE INTO events (
                id, project_id, session_id, event_type, role, content, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(event.id.to_string())
        .bind(event.project_id.to_string())
        .bind(event.session_id.as_str())
        .bind(event.event_type.to_string())
        .bind(role_str)
        .bind(event.content.as_deref())
        .bind(&metadata_json)
        .bind(event.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to insert event: {e}")))?;

        Ok(())
    }

    async fn fetch_recent_events(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Event>> {
        // rowid as tiebreaker keeps the order deterministic when several
        // events share a created_at value.
        let rows = sqlx::query(
            "SELECT * FROM events WHERE session_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )
        .bind(session_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to fetch events: {e}")))?;

        let mut events: Vec<Event> = rows.iter().map(event_from_row).collect::<Result<_>>()?;
        events.reverse();
        Ok(events)
    }

    async fn merge_event_metadata(
        &self,
        event_id: Uuid,
        partial: serde_json::Value,
    ) -> Result<()> {
        let row = sqlx::query("SELECT metadata FROM events WHERE id = ?1")
            .bind(event_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SessionGuardError::Storage(format!("Failed to read metadata: {e}")))?
            .ok_or_else(|| SessionGuardError::NotFound {
                resource: format!("event {event_id}"),
            })?;

        let mut merged: serde_json::Value = parse_json(&row.get::<String, _>("metadata"), "metadata")?;
        if let (Some(target), Some(source)) = (merged.as_object_mut(), partial.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }

        sqlx::query("UPDATE events SET metadata = ?1 WHERE id = ?2")
            .bind(merged.to_string())
            .bind(event_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| SessionGuardError::Storage(format!("Failed to update metadata: {e}")))?;

        Ok(())
    }

    async fn count_events(&self, session_id: &SessionId) -> Result<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as cnt FROM events WHERE session_id = ?1")
            .bind(session_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SessionGuardError::Storage(format!("Failed to count events: {e}")))?
            .get("cnt");
        Ok(count as u64)
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn upsert_session_activity(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO sessions (id, project_id, created_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(project_id, id) DO UPDATE SET
                last_activity_at = excluded.last_activity_at",
        )
        .bind(session_id.as_str())
        .bind(project_id.to_string())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to upsert session: {e}")))?;

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
        let patterns_json = to_json(&deduped, "patterns")?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO sessions
                (id, project_id, created_at, last_activity_at, current_risk_score, current_patterns)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5)
             ON CONFLICT(project_id, id) DO UPDATE SET
                last_activity_at = excluded.last_activity_at,
                current_risk_score = excluded.current_risk_score,
                current_patterns = excluded.current_patterns",
        )
        .bind(session_id.as_str())
        .bind(project_id.to_string())
        .bind(&now)
        .bind(clamp_risk_score(risk_score))
        .bind(&patterns_json)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to update session risk: {e}")))?;

        Ok(())
    }

    async fn read_session(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
    ) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE project_id = ?1 AND id = ?2")
            .bind(project_id.to_string())
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SessionGuardError::Storage(format!("Failed to read session: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(session_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn append_risk_snapshot(&self, snapshot: &RiskSnapshot) -> Result<()> {
        let patterns_json = to_json(&snapshot.patterns, "patterns")?;

        sqlx::query(
            "INSERT INTO risk_snapshots (
                id, session_id, project_id, event_id, risk_score, patterns, explanation, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(snapshot.id.to_string())
        .bind(snapshot.session_id.as_str())
        .bind(snapshot.project_id.to_string())
        .bind(snapshot.event_id.map(|id| id.to_string()))
        .bind(snapshot.risk_score)
        .bind(&patterns_json)
        .bind(snapshot.explanation.as_deref())
        .bind(snapshot.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to append snapshot: {e}")))?;

        Ok(())
    }

    async fn read_latest_risk_snapshot(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<RiskSnapshot>> {
        let row = sqlx::query(
            "SELECT * FROM risk_snapshots WHERE session_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to read snapshot: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(snapshot_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_risk_snapshots(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<RiskSnapshot>> {
        let rows = sqlx::query(
            "SELECT * FROM risk_snapshots WHERE session_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )
        .bind(session_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to list snapshots: {e}")))?;

        rows.iter().map(snapshot_from_row).collect()
    }
}

#[async_trait]
impl PolicyStore for SqliteStore {
    async fn list_enabled_policies(&self, project_id: ProjectId) -> Result<Vec<Policy>> {
        let rows = sqlx::query(
            "SELECT * FROM policies WHERE project_id = ?1 AND enabled = 1
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionGuardError::Storage(format!("Failed to list policies: {e}")))?;

        rows.iter().map(policy_from_row).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sessionguard_core::{PolicyAction, TraceAnalysis};
    use serde_json::json;

    async fn test_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn make_event(project: ProjectId, session: &str, content: &str) -> Event {
        Event::new(project, SessionId::from(session), EventType::UserMessage)
            .with_role(Role::User)
            .with_content(content)
    }

    // -- events ------------------------------------------------------------

    #[tokio::test]
    async fn event_roundtrip() {
        let store = test_store().await;
        let project = ProjectId::new();

        let mut event = make_event(project, "s1", "hello");
        event.metadata.tool_name = Some("search".to_string());
        store.insert_event(&event).await.unwrap();

        let fetched = store
            .fetch_recent_events(&SessionId::from("s1"), 10)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, event.id);
        assert_eq!(fetched[0].event_type, EventType::UserMessage);
        assert_eq!(fetched[0].role, Some(Role::User));
        assert_eq!(fetched[0].content.as_deref(), Some("hello"));
        assert_eq!(fetched[0].metadata.tool_name.as_deref(), Some("search"));
    }

    #[tokio::test]
    async fn recent_events_window_oldest_first() {
        let store = test_store().await;
        let project = ProjectId::new();

        let base = Utc::now();
        for i in 0..5 {
            let mut event = make_event(project, "s1", &format!("msg {i}"));
            event.created_at = base + chrono::Duration::milliseconds(i);
            store.insert_event(&event).await.unwrap();
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
    async fn count_events_scoped_to_session() {
        let store = test_store().await;
        let project = ProjectId::new();

        store
            .insert_event(&make_event(project, "s1", "a"))
            .await
            .unwrap();
        store
            .insert_event(&make_event(project, "s1", "b"))
            .await
            .unwrap();
        store
            .insert_event(&make_event(project, "s2", "c"))
            .await
            .unwrap();

        assert_eq!(store.count_events(&SessionId::from("s1")).await.unwrap(), 2);
        assert_eq!(store.count_events(&SessionId::from("s2")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn metadata_merge_preserves_other_keys() {
        let store = test_store().await;
        let project = ProjectId::new();

        let mut event =
            Event::new(project, SessionId::from("s1"), EventType::ReasoningTrace).with_content("t");
        event
            .metadata
            .extra
            .insert("origin".to_string(), json!("ingest"));
        store.insert_event(&event).await.unwrap();

        let analysis = TraceAnalysis {
            risk_score: 0.6,
            labels: vec!["deception".to_string()],
            indicators: vec!["pretend".to_string()],
            summary: "1 concern".to_string(),
            analyzed_at: Utc::now(),
        };
        store
            .merge_event_metadata(event.id, json!({ "trace_analysis": analysis }))
            .await
            .unwrap();

        let fetched = store
            .fetch_recent_events(&SessionId::from("s1"), 1)
            .await
            .unwrap();
        let metadata = &fetched[0].metadata;
        assert_eq!(metadata.extra.get("origin").unwrap(), "ingest");
        let stored = metadata.trace_analysis.as_ref().unwrap();
        assert_eq!(stored.risk_score, 0.6);
        assert_eq!(stored.labels, vec!["deception"]);
    }

    #[tokio::test]
    async fn metadata_merge_missing_event_is_not_found() {
        let store = test_store().await;
        let result = store
            .merge_event_metadata(Uuid::new_v4(), json!({ "x": 1 }))
            .await;
        assert!(matches!(result, Err(SessionGuardError::NotFound { .. })));
    }

    // -- sessions ----------------------------------------------------------

    #[tokio::test]
    async fn session_upsert_and_risk_update() {
        let store = test_store().await;
        let project = ProjectId::new();
        let session_id = SessionId::from("s1");

        store
            .upsert_session_activity(project, &session_id)
            .await
            .unwrap();
        let created = store
            .read_session(project, &session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.current_risk_score, 0.0);

        store
            .update_session_risk(
                project,
                &session_id,
                0.7,
                &["jailbreak_attempt".to_string()],
            )
            .await
            .unwrap();
        let updated = store
            .read_session(project, &session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.current_risk_score, 0.7);
        assert_eq!(updated.current_patterns, vec!["jailbreak_attempt"]);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn sessions_scoped_per_project() {
        let store = test_store().await;
        let project_a = ProjectId::new();
        let project_b = ProjectId::new();
        let session_id = SessionId::from("shared");

        store
            .upsert_session_activity(project_a, &session_id)
            .await
            .unwrap();

        assert!(store
            .read_session(project_b, &session_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn snapshot_history_newest_first() {
        let store = test_store().await;
        let project = ProjectId::new();
        let session_id = SessionId::from("s1");
        let base = Utc::now();

        for (i, score) in [0.1, 0.5, 0.9].into_iter().enumerate() {
            store
                .append_risk_snapshot(&RiskSnapshot {
                    id: Uuid::new_v4(),
                    session_id: session_id.clone(),
                    project_id: project,
                    event_id: None,
                    risk_score: score,
                    patterns: vec![],
                    explanation: Some(format!("snapshot {i}")),
                    created_at: base + chrono::Duration::milliseconds(i as i64),
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

    // -- policies ----------------------------------------------------------

    #[tokio::test]
    async fn policy_roundtrip_and_enabled_filter() {
        let store = test_store().await;
        let project = ProjectId::new();

        let conditions = PolicyConditions {
            min_risk_score: Some(0.8),
            patterns_any: Some(vec!["jailbreak_attempt".to_string()]),
            ..PolicyConditions::default()
        };
        let policy = Policy::new(project, "block-high-risk", conditions, PolicyAction::Block);
        store.insert_policy(&policy).await.unwrap();

        let mut disabled = Policy::new(
            project,
            "disabled",
            PolicyConditions::default(),
            PolicyAction::Flag,
        );
        disabled.enabled = false;
        store.insert_policy(&disabled).await.unwrap();

        let listed = store.list_enabled_policies(project).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "block-high-risk");
        assert_eq!(listed[0].conditions.min_risk_score, Some(0.8));
        assert_eq!(listed[0].actions.action, PolicyAction::Block);
    }

    #[tokio::test]
    async fn file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guard.db");
        let path_str = path.to_str().unwrap();
        let project = ProjectId::new();

        {
            let store = SqliteStore::connect(path_str).await.unwrap();
            store
                .insert_event(&make_event(project, "s1", "persisted"))
                .await
                .unwrap();
        }

        let reopened = SqliteStore::connect(path_str).await.unwrap();
        let events = reopened
            .fetch_recent_events(&SessionId::from("s1"), 10)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content.as_deref(), Some("persisted"));
    }
}
