//! Context records and the store trait — the read side of the external
//! fact/memory store.
//!
//! The store itself (durable persistence, indexing) is an external
//! collaborator; the core only reads ranked copies of its records. The one
//! hard requirement on implementations is a per-scope version counter that
//! advances on every write, which the summary cache uses for lazy
//! invalidation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::ContextError;
use crate::utterance::ScopeId;

/// What kind of fact a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    /// A durable fact about the user (name, birthday, preferences)
    PersonalFact,
    /// A dated note about something that happened
    EpisodicNote,
    /// A calendar entry
    CalendarItem,
    /// An item on a named list
    ListItem,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PersonalFact => "personal-fact",
            Self::EpisodicNote => "episodic-note",
            Self::CalendarItem => "calendar-item",
            Self::ListItem => "list-item",
        };
        write!(f, "{s}")
    }
}

/// A typed fact, owned by the external store. The core only reads and
/// ranks copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Unique record ID
    pub id: String,

    /// Fact type
    pub kind: RecordKind,

    /// Fact key (e.g., "name", "shopping list")
    pub key: String,

    /// Fact value (e.g., "Alex", "milk")
    pub value: String,

    /// Where this record came from (conversation ID, import, device)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Relevance score set by the store's ranking (0.0–1.0)
    #[serde(default)]
    pub relevance: f32,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl ContextRecord {
    pub fn new(kind: RecordKind, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            key: key.into(),
            value: value.into(),
            source: None,
            relevance: 0.0,
            updated_at: Utc::now(),
        }
    }
}

/// A query against the context store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextQuery {
    /// The search text
    pub text: String,

    /// Restrict to these record kinds; empty means all kinds
    #[serde(default)]
    pub kinds: Vec<RecordKind>,

    /// Maximum number of candidates to return
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    16
}

impl ContextQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kinds: Vec::new(),
            limit: default_limit(),
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<RecordKind>) -> Self {
        self.kinds = kinds;
        self
    }
}

/// The context store adapter trait.
///
/// Implementations: the in-process reference store (confab-context), or an
/// adapter to whatever durable store a deployment runs.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// The adapter name (e.g., "in-memory").
    fn name(&self) -> &str;

    /// Fetch candidate records for a query, ranked by relevance descending.
    async fn fetch(
        &self,
        scope: &ScopeId,
        query: &ContextQuery,
    ) -> std::result::Result<Vec<ContextRecord>, ContextError>;

    /// The scope's monotonically increasing version counter. Advances on
    /// every write to the scope; embedded in cache fingerprints.
    async fn version(&self, scope: &ScopeId) -> std::result::Result<u64, ContextError>;

    /// Write a record into the scope, advancing its version counter.
    async fn write(
        &self,
        scope: &ScopeId,
        record: ContextRecord,
    ) -> std::result::Result<String, ContextError>;
}
