//! Core types, traits, and errors for SessionGuard
//!
//! This crate contains the foundational data model shared across all
//! SessionGuard components: events, sessions, risk snapshots, policies,
//! decisions, the collaborator store traits, and the swappable
//! [`ThreatModel`] detection interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Unique identifier for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    /// Create a new random project ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied session identifier.
///
/// Sessions are scoped to a project: the same `SessionId` under two
/// different projects names two independent sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Wrap a caller-supplied identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Kind of interaction event recorded in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A message sent by the end user.
    #[serde(rename = "message.user")]
    UserMessage,
    /// A message produced by the assistant.
    #[serde(rename = "message.assistant")]
    AssistantMessage,
    /// Model-internal reasoning text preceding a final answer.
    #[serde(rename = "reasoning_trace")]
    ReasoningTrace,
    /// A tool or function invocation.
    #[serde(rename = "tool_call")]
    ToolCall,
    /// A persisted policy decision (synthetic, written by callers).
    #[serde(rename = "policy_decision")]
    PolicyDecision,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserMessage => write!(f, "message.user"),
            Self::AssistantMessage => write!(f, "message.assistant"),
            Self::ReasoningTrace => write!(f, "reasoning_trace"),
            Self::ToolCall => write!(f, "tool_call"),
            Self::PolicyDecision => write!(f, "policy_decision"),
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "message.user" => Ok(Self::UserMessage),
            "message.assistant" => Ok(Self::AssistantMessage),
            "reasoning_trace" => Ok(Self::ReasoningTrace),
            "tool_call" => Ok(Self::ToolCall),
            "policy_decision" => Ok(Self::PolicyDecision),
            _ => Err(format!("unknown event type: {s}")),
        }
    }
}

/// Conversational role attached to message events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Result of analyzing a single reasoning trace.
///
/// Written once per trace event; re-analysis overwrites it idempotently.
/// Labels are open-ended opaque strings (e.g. `"deception"`,
/// `"harmful_intent"`, `"safety_bypass"`) — new labels require no schema
/// change anywhere downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceAnalysis {
    /// Risk score in [0, 1].
    pub risk_score: f64,
    /// Behavioral labels detected in the trace.
    pub labels: Vec<String>,
    /// Specific concerning phrases or patterns, in detection order.
    pub indicators: Vec<String>,
    /// Brief human-readable summary of the analysis.
    pub summary: String,
    /// When the analysis ran.
    pub analyzed_at: DateTime<Utc>,
}

/// Typed event metadata.
///
/// Only the fields the pipeline reads are typed; everything else is
/// preserved in `extra` so unknown fields round-trip untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Reasoning-trace analysis attached by the trace analyzer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_analysis: Option<TraceAnalysis>,
    /// Tool name (for `tool_call` events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Resolved action (for `policy_decision` events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<PolicyAction>,
    /// Unrecognized fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl EventMetadata {
    /// True when no metadata at all is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trace_analysis.is_none()
            && self.tool_name.is_none()
            && self.action.is_none()
            && self.extra.is_empty()
    }
}

/// An immutable record of a single occurrence within a session.
///
/// Events are created by the ingest collaborator and never deleted by the
/// pipeline; the only permitted mutation is merging analysis annotations
/// into `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// Project this event belongs to.
    pub project_id: ProjectId,
    /// Session this event belongs to.
    pub session_id: SessionId,
    /// Kind of event.
    pub event_type: EventType,
    /// Conversational role, for message events.
    pub role: Option<Role>,
    /// Raw text content (message body, trace text, …).
    pub content: Option<String>,
    /// Typed metadata plus preserved unknown fields.
    #[serde(default)]
    pub metadata: EventMetadata,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Create a new event with a fresh id and the current timestamp.
    pub fn new(project_id: ProjectId, session_id: SessionId, event_type: EventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            session_id,
            event_type,
            role: None,
            content: None,
            metadata: EventMetadata::default(),
            created_at: Utc::now(),
        }
    }

    /// Set the text content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the conversational role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Set the metadata.
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// ---------------------------------------------------------------------------
// Session & risk snapshot types
// ---------------------------------------------------------------------------

/// A bounded sequence of events sharing a session identifier, with one
/// mutable aggregate risk state.
///
/// `last_activity_at` and the two risk fields are the only mutable
/// attributes, and they are written exclusively by the session risk
/// aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Caller-supplied session identifier.
    pub id: SessionId,
    /// Project that owns this session.
    pub project_id: ProjectId,
    /// When the session was first seen.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent event or analysis commit.
    pub last_activity_at: DateTime<Utc>,
    /// Current aggregate risk score in [0, 1].
    pub current_risk_score: f64,
    /// Currently detected behavioral patterns (no duplicates).
    pub current_patterns: Vec<String>,
}

impl Session {
    /// Create a fresh zero-risk session.
    pub fn new(project_id: ProjectId, id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            created_at: now,
            last_activity_at: now,
            current_risk_score: 0.0,
            current_patterns: Vec::new(),
        }
    }
}

/// An immutable, timestamped record of a session's risk state at one point
/// in its history. Append-only; written exactly once per completed session
/// analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    /// Unique snapshot identifier.
    pub id: Uuid,
    /// Session this snapshot belongs to.
    pub session_id: SessionId,
    /// Project that owns the session.
    pub project_id: ProjectId,
    /// Event that triggered the analysis, if known.
    pub event_id: Option<Uuid>,
    /// Risk score in [0, 1] at snapshot time.
    pub risk_score: f64,
    /// Patterns detected at snapshot time.
    pub patterns: Vec<String>,
    /// Optional explanation from the threat model.
    pub explanation: Option<String>,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Policy types
// ---------------------------------------------------------------------------

/// Enforcement action resolved by the policy engine.
///
/// Variants are declared in ascending priority so the derived `Ord` gives
/// the fixed total order `block > flag > notify > allow`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    /// Let the interaction proceed (default).
    #[default]
    Allow,
    /// Proceed, but emit a notification.
    Notify,
    /// Proceed, but mark the session for review.
    Flag,
    /// Reject the interaction.
    Block,
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Notify => write!(f, "notify"),
            Self::Flag => write!(f, "flag"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// Inclusive event-count range for the `event_count` condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    /// Minimum event count (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    /// Maximum event count (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

/// Conjunction of independent predicates a policy matches against.
///
/// Every configured predicate must hold for the policy to match. A policy
/// with no predicates configured at all always matches ("default policy").
/// Unknown fields are ignored on deserialize for forward compatibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConditions {
    /// Match requires risk score >= this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_risk_score: Option<f64>,
    /// Match requires risk score <= this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_risk_score: Option<f64>,
    /// Match requires at least one of these patterns in the context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns_any: Option<Vec<String>>,
    /// Match requires all of these patterns in the context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns_all: Option<Vec<String>>,
    /// Match requires at least one of these reasoning-trace labels.
    /// Fails (does not skip) when the context carries no labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_labels_any: Option<Vec<String>>,
    /// Match requires all of these reasoning-trace labels.
    /// Fails (does not skip) when the context carries no labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_labels_all: Option<Vec<String>>,
    /// Match requires the context's event count to fall in this range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_count: Option<CountRange>,
}

impl PolicyConditions {
    /// True when no predicate is configured at all.
    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        self.min_risk_score.is_none()
            && self.max_risk_score.is_none()
            && self.patterns_any.as_ref().map_or(true, |v| v.is_empty())
            && self.patterns_all.as_ref().map_or(true, |v| v.is_empty())
            && self.trace_labels_any.as_ref().map_or(true, |v| v.is_empty())
            && self.trace_labels_all.as_ref().map_or(true, |v| v.is_empty())
            && self.event_count.is_none()
    }
}

/// Action configuration attached to a policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyActions {
    /// The enforcement action this policy contributes when it matches.
    #[serde(default)]
    pub action: PolicyAction,
}

/// A named, enabled/disabled rule whose conditions, if all satisfied,
/// contribute an action to the decision.
///
/// Policies are externally managed configuration; the pipeline only reads
/// the enabled set for a project and must never mutate a returned policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Unique policy identifier.
    pub id: Uuid,
    /// Project this policy applies to.
    pub project_id: ProjectId,
    /// Human-readable policy name (used in decision reasons).
    pub name: String,
    /// Disabled policies are excluded before matching.
    pub enabled: bool,
    /// Conjunction of predicates.
    #[serde(default)]
    pub conditions: PolicyConditions,
    /// Action contributed on match.
    #[serde(default)]
    pub actions: PolicyActions,
    /// When the policy was created (stable iteration order only).
    pub created_at: DateTime<Utc>,
    /// When the policy was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Create an enabled policy with the given conditions and action.
    pub fn new(
        project_id: ProjectId,
        name: impl Into<String>,
        conditions: PolicyConditions,
        action: PolicyAction,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            enabled: true,
            conditions,
            actions: PolicyActions { action },
            created_at: now,
            updated_at: now,
        }
    }
}

/// The resolved enforcement action plus supporting reasons for a single
/// evaluation of a session's context against its project's policies.
///
/// A pure computation result — not persisted by the pipeline itself, though
/// callers may record it as a `policy_decision` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Highest-priority action among all matched policies.
    pub action: PolicyAction,
    /// Human-readable reasons from every matched policy, in policy order.
    pub reasons: Vec<String>,
    /// Ids of every policy that matched, in policy order.
    pub triggered_policy_ids: Vec<Uuid>,
    /// Risk score the evaluation ran against.
    pub risk_score: f64,
    /// Patterns the evaluation ran against.
    pub patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Risk score helpers
// ---------------------------------------------------------------------------

/// Clamp a risk score into [0, 1]. Non-finite values become 0.
#[must_use]
pub fn clamp_risk_score(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

/// Deduplicate patterns in place, preserving first-occurrence order.
pub fn dedup_patterns(patterns: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    patterns.retain(|p| seen.insert(p.clone()));
}

// ---------------------------------------------------------------------------
// Threat model interface
// ---------------------------------------------------------------------------

/// Output of a whole-session risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAssessment {
    /// Risk score in [0, 1].
    pub risk_score: f64,
    /// Detected behavioral pattern tags.
    pub patterns: Vec<String>,
    /// Optional explanation of the findings.
    pub explanation: Option<String>,
}

/// Output of a single-reasoning-trace assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceAssessment {
    /// Risk score in [0, 1].
    pub risk_score: f64,
    /// Behavioral labels (open-ended taxonomy).
    pub labels: Vec<String>,
    /// Specific concerning phrases or patterns, in detection order.
    pub indicators: Vec<String>,
    /// Brief summary of the findings.
    pub summary: String,
}

/// Optional surrounding context for a trace assessment.
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    /// The user input immediately preceding the trace.
    pub last_user_message: Option<String>,
    /// The final answer the trace led to.
    pub answer: Option<String>,
}

/// Swappable detection backend.
///
/// Both operations are pure from the caller's perspective: no side effects
/// visible to the rest of the system. Callers wrap every invocation in a
/// bounded timeout; implementations must propagate transport and parse
/// failures as [`SessionGuardError::DetectionBackend`] rather than
/// swallowing them.
#[async_trait::async_trait]
pub trait ThreatModel: Send + Sync {
    /// Assess a whole-session conversation window (oldest-first).
    async fn analyze_session(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
        events: &[Event],
    ) -> Result<SessionAssessment>;

    /// Assess a single reasoning trace with optional surrounding context.
    async fn analyze_reasoning_trace(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
        trace_event_id: Uuid,
        raw_trace: &str,
        context: Option<&TraceContext>,
    ) -> Result<TraceAssessment>;

    /// Backend name, for logging.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Store traits (collaborator boundaries)
// ---------------------------------------------------------------------------

/// Event persistence collaborator.
///
/// The pipeline never issues schema DDL or manages connections through
/// this trait; those are implementation concerns.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a new event.
    async fn insert_event(&self, event: &Event) -> Result<()>;

    /// Fetch the most recent `limit` events for a session, returned in
    /// chronological (oldest-first) order.
    async fn fetch_recent_events(&self, session_id: &SessionId, limit: usize)
        -> Result<Vec<Event>>;

    /// Merge a partial JSON object into an event's metadata. Existing keys
    /// not present in `partial` are preserved.
    async fn merge_event_metadata(
        &self,
        event_id: Uuid,
        partial: serde_json::Value,
    ) -> Result<()>;

    /// Total number of events recorded for a session.
    async fn count_events(&self, session_id: &SessionId) -> Result<u64>;
}

/// Session-state persistence collaborator.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Create the session row if absent, else refresh `last_activity_at`.
    async fn upsert_session_activity(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
    ) -> Result<()>;

    /// Overwrite a session's current risk score and patterns and refresh
    /// `last_activity_at`.
    async fn update_session_risk(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
        risk_score: f64,
        patterns: &[String],
    ) -> Result<()>;

    /// Read a session. `None` when the session does not exist — callers
    /// treat absence as an empty/zero-risk default, not an error.
    async fn read_session(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
    ) -> Result<Option<Session>>;

    /// Append an immutable risk snapshot.
    async fn append_risk_snapshot(&self, snapshot: &RiskSnapshot) -> Result<()>;

    /// Most recent snapshot for a session, if any.
    async fn read_latest_risk_snapshot(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<RiskSnapshot>>;

    /// Risk history for a session, newest-first, up to `limit` entries.
    async fn list_risk_snapshots(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<RiskSnapshot>>;
}

/// Policy configuration collaborator (read-only from the pipeline's side).
#[async_trait::async_trait]
pub trait PolicyStore: Send + Sync {
    /// Enabled policies for a project in creation-time order. The order is
    /// a stable iteration order only — priority comes from actions.
    async fn list_enabled_policies(&self, project_id: ProjectId) -> Result<Vec<Policy>>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Analysis pipeline tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Run whole-session analysis on ingested events.
    #[serde(default = "default_enabled")]
    pub enable_session_analysis: bool,
    /// Run per-trace analysis on reasoning-trace events.
    #[serde(default = "default_enabled")]
    pub enable_trace_analysis: bool,
    /// Most recent events included in a session analysis window.
    #[serde(default = "default_max_events")]
    pub max_events_to_analyze: usize,
    /// Global cap on concurrently running analyses.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrent_analyses: usize,
    /// Bounded timeout around every threat-model invocation.
    #[serde(default = "default_detection_timeout_ms")]
    pub detection_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_events() -> usize {
    50
}

fn default_max_concurrency() -> usize {
    8
}

fn default_detection_timeout_ms() -> u64 {
    30_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enable_session_analysis: default_enabled(),
            enable_trace_analysis: default_enabled(),
            max_events_to_analyze: default_max_events(),
            max_concurrent_analyses: default_max_concurrency(),
            detection_timeout_ms: default_detection_timeout_ms(),
        }
    }
}

/// Detection backend selection and remote-inference settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Backend: `"heuristic"` (deterministic, no network) or
    /// `"inference"` (remote chat-completions endpoint).
    #[serde(default = "default_detection_provider")]
    pub provider: String,
    /// Chat-completions base URL (inference backend).
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,
    /// API key for the inference endpoint.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name for the inference endpoint.
    #[serde(default = "default_inference_model")]
    pub model: String,
    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_detection_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_detection_provider() -> String {
    "heuristic".to_string()
}

fn default_inference_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_inference_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            provider: default_detection_provider(),
            endpoint: default_inference_endpoint(),
            api_key: None,
            model: default_inference_model(),
            timeout_ms: default_detection_timeout_ms(),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage profile: `"memory"` (in-memory) or `"lite"` (SQLite).
    #[serde(default = "default_storage_profile")]
    pub profile: String,
    /// Database file path (used by the `"lite"` profile).
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_storage_profile() -> String {
    "lite".to_string()
}

fn default_database_path() -> String {
    "sessionguard.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profile: default_storage_profile(),
            database_path: default_database_path(),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Analysis tunables.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Detection backend settings.
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error taxonomy.
#[derive(thiserror::Error, Debug)]
pub enum SessionGuardError {
    /// Malformed input to an operation — rejected locally, never corrupts
    /// state.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Threat-model timeout, transport failure, or unparseable response.
    /// Recoverable: surfaced to the caller for logging, never crashes the
    /// ingest path.
    #[error("Detection backend error: {0}")]
    DetectionBackend(String),

    /// Lookup miss where absence is not an acceptable default.
    #[error("Not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// Storage layer error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `std::result::Result<T, SessionGuardError>`.
pub type Result<T> = std::result::Result<T, SessionGuardError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
