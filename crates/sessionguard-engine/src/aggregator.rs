//! Session risk aggregator.
//!
//! Single authoritative owner of session liveness and current risk state.
//! Analyzers never write session risk directly; they go through
//! [`SessionRiskAggregator::commit_analysis`], which serializes commits per
//! session with a last-write-wins discipline keyed by a monotonically
//! increasing sequence number handed out at analysis start. A commit
//! carrying a sequence number older than the last applied one is discarded,
//! so a slow analysis can never overwrite a newer result. The current risk
//! state and the risk snapshot are written together under the same
//! per-session lock, so the latest snapshot always agrees with the current
//! score.

use sessionguard_core::{ProjectId, Result, RiskSnapshot, Session, SessionId, SessionStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Sweep idle per-session sequence state once the map grows past this.
const STATES_HIGH_WATER: usize = 1024;

#[derive(Default)]
struct SeqState {
    next_seq: u64,
    last_committed: u64,
}

impl SeqState {
    /// No analysis outstanding: every handed-out sequence number has been
    /// committed, discarded, or released.
    fn idle(&self) -> bool {
        self.next_seq == self.last_committed
    }
}

/// Owns session liveness and the current aggregate risk state.
pub struct SessionRiskAggregator {
    sessions: Arc<dyn SessionStore>,
    // Per-session commit serialization. The outer lock only guards map
    // access; the per-session lock is held across the store writes.
    states: Mutex<HashMap<(ProjectId, SessionId), Arc<tokio::sync::Mutex<SeqState>>>>,
}

impl SessionRiskAggregator {
    /// Create an aggregator over the given session store.
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn state_for(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
    ) -> Arc<tokio::sync::Mutex<SeqState>> {
        let mut states = self.states.lock().expect("aggregator state lock poisoned");
        if states.len() >= STATES_HIGH_WATER {
            // Drop idle sessions; anything with an analysis outstanding or
            // a holder elsewhere is kept.
            states.retain(|_, state| {
                Arc::strong_count(state) > 1 || state.try_lock().map_or(true, |s| !s.idle())
            });
        }
        states
            .entry((project_id, session_id.clone()))
            .or_default()
            .clone()
    }

    /// Create the session if absent, else refresh its activity timestamp.
    /// Idempotent; safe to call on every ingested event.
    pub async fn touch(&self, project_id: ProjectId, session_id: &SessionId) -> Result<()> {
        self.sessions
            .upsert_session_activity(project_id, session_id)
            .await
    }

    /// Reserve a sequence number for an analysis run that is about to start.
    pub async fn begin_analysis(&self, project_id: ProjectId, session_id: &SessionId) -> u64 {
        let state = self.state_for(project_id, session_id);
        let mut state = state.lock().await;
        state.next_seq += 1;
        state.next_seq
    }

    /// Release a reservation for an analysis that failed before commit.
    /// Only the newest reservation can be released; an older one is left to
    /// the stale-commit discard.
    pub async fn abort_analysis(&self, project_id: ProjectId, session_id: &SessionId, seq: u64) {
        let state = self.state_for(project_id, session_id);
        let mut state = state.lock().await;
        if state.next_seq == seq && state.last_committed < seq {
            state.next_seq -= 1;
        }
    }

    /// Commit an analysis result. The session's current risk state and the
    /// snapshot are written together while the per-session lock is held.
    /// Returns `true` if the commit was applied, `false` if it was
    /// discarded as stale (a newer analysis already committed); a discarded
    /// commit writes nothing, snapshot included.
    pub async fn commit_analysis(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
        seq: u64,
        snapshot: &RiskSnapshot,
    ) -> Result<bool> {
        let state = self.state_for(project_id, session_id);
        let mut state = state.lock().await;

        if seq <= state.last_committed {
            debug!(
                %project_id,
                %session_id,
                seq,
                last_committed = state.last_committed,
                "discarding stale analysis commit"
            );
            return Ok(false);
        }

        self.sessions
            .update_session_risk(
                project_id,
                session_id,
                snapshot.risk_score,
                &snapshot.patterns,
            )
            .await?;
        self.sessions.append_risk_snapshot(snapshot).await?;
        state.last_committed = seq;
        Ok(true)
    }

    /// Read a session's current state. Absence is not an error.
    pub async fn read(
        &self,
        project_id: ProjectId,
        session_id: &SessionId,
    ) -> Result<Option<Session>> {
        self.sessions.read_session(project_id, session_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
