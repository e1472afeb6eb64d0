//! In-process reference context store.
//!
//! Backs tests and the CLI harness. Keeps records per scope with a
//! monotonically increasing version counter, advanced on every write —
//! the contract the summary cache's lazy invalidation relies on.

use async_trait::async_trait;
use confab_core::error::ContextError;
use confab_core::record::{ContextQuery, ContextRecord, ContextStore};
use confab_core::utterance::ScopeId;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct ScopeData {
    records: Vec<ContextRecord>,
    version: u64,
}

/// An in-memory store keyed by scope.
#[derive(Default)]
pub struct InMemoryContextStore {
    scopes: RwLock<HashMap<ScopeId, ScopeData>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without going through `write` (test setup helper);
    /// still advances the version counter.
    pub async fn seed(&self, scope: &ScopeId, record: ContextRecord) {
        let mut scopes = self.scopes.write().await;
        let data = scopes.entry(scope.clone()).or_default();
        data.records.push(record);
        data.version += 1;
    }
}

/// Simple keyword relevance: term occurrences normalized by record length.
fn relevance(record: &ContextRecord, query: &str) -> f32 {
    let haystack = format!("{} {}", record.key, record.value).to_lowercase();
    let mut score = 0.0f32;
    for term in query.to_lowercase().split_whitespace() {
        if term.len() < 3 {
            continue;
        }
        let occurrences = haystack.matches(term).count();
        score += occurrences as f32 / (haystack.len() as f32 / 24.0).max(1.0);
    }
    // Personal facts get a mild boost: they answer "my X" questions.
    if record.kind == confab_core::record::RecordKind::PersonalFact {
        score += 0.05;
    }
    score.min(1.0)
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn fetch(
        &self,
        scope: &ScopeId,
        query: &ContextQuery,
    ) -> std::result::Result<Vec<ContextRecord>, ContextError> {
        let scopes = self.scopes.read().await;
        let Some(data) = scopes.get(scope) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<ContextRecord> = data
            .records
            .iter()
            .filter(|r| query.kinds.is_empty() || query.kinds.contains(&r.kind))
            .cloned()
            .map(|mut r| {
                r.relevance = relevance(&r, &query.text);
                r
            })
            .collect();

        results.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(query.limit);
        Ok(results)
    }

    async fn version(&self, scope: &ScopeId) -> std::result::Result<u64, ContextError> {
        let scopes = self.scopes.read().await;
        Ok(scopes.get(scope).map(|d| d.version).unwrap_or(0))
    }

    async fn write(
        &self,
        scope: &ScopeId,
        mut record: ContextRecord,
    ) -> std::result::Result<String, ContextError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();

        let mut scopes = self.scopes.write().await;
        let data = scopes.entry(scope.clone()).or_default();
        // A write to an existing (kind, key) replaces the record wholesale.
        data.records
            .retain(|r| !(r.kind == record.kind && r.key == record.key));
        data.records.push(record);
        data.version += 1;
        Ok(id)
    }
}
