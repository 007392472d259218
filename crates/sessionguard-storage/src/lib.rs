//! Store implementations for SessionGuard.
//!
//! Two backends implement the core store traits: in-memory (tests,
//! degraded mode) and SQLite (the "lite" single-node profile). The
//! pipeline only ever sees the trait objects bundled in [`Storage`].

use sessionguard_core::{EventStore, PolicyStore, Result, SessionGuardError, SessionStore};
use std::sync::Arc;

pub mod memory;
pub mod sqlite;

pub use memory::{InMemoryEventStore, InMemoryPolicyStore, InMemorySessionStore};
pub use sqlite::SqliteStore;

// ---------------------------------------------------------------------------
// Composite Storage
// ---------------------------------------------------------------------------

/// Composite handle bundling the three store concerns.
///
/// Consumers receive a single `Storage` value instead of managing three
/// separate `Arc<dyn …>` handles.
#[derive(Clone)]
pub struct Storage {
    /// Event persistence.
    pub events: Arc<dyn EventStore>,
    /// Session state and risk snapshot persistence.
    pub sessions: Arc<dyn SessionStore>,
    /// Enabled-policy configuration (read-only for the pipeline).
    pub policies: Arc<dyn PolicyStore>,
}

// ---------------------------------------------------------------------------
// StorageProfile
// ---------------------------------------------------------------------------

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProfile {
    /// In-memory stores; data is lost on drop.
    Memory,
    /// SQLite-backed stores at the given database path.
    Lite {
        /// Database file path (or `sqlite::memory:`).
        database_path: String,
    },
}

impl StorageProfile {
    /// Parse a profile from a [`sessionguard_core::StorageConfig`].
    pub fn from_config(config: &sessionguard_core::StorageConfig) -> Result<Self> {
        match config.profile.as_str() {
            "memory" => Ok(Self::Memory),
            "lite" => Ok(Self::Lite {
                database_path: config.database_path.clone(),
            }),
            other => Err(SessionGuardError::Config(format!(
                "unknown storage profile: {other}"
            ))),
        }
    }

    /// Build the composite [`Storage`] for this profile.
    pub async fn build(&self) -> Result<Storage> {
        match self {
            Self::Memory => Ok(Storage {
                events: Arc::new(InMemoryEventStore::new()),
                sessions: Arc::new(InMemorySessionStore::new()),
                policies: Arc::new(InMemoryPolicyStore::new()),
            }),
            Self::Lite { database_path } => {
                let store = Arc::new(SqliteStore::connect(database_path).await?);
                Ok(Storage {
                    events: store.clone(),
                    sessions: store.clone(),
                    policies: store,
                })
            }
        }
    }
}
