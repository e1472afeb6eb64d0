//! Context assembly — fetch, rank, truncate, and (sometimes) summarize.
//!
//! The assembler queries the store for candidate records, keeps the
//! highest-relevance ones within a character budget, and guarantees that a
//! personal fact, when fetched, is never evicted by sheer volume of less
//! important records. The summarization step is the only thing the cache
//! wraps, and only when it was expensive enough to be worth caching —
//! trivially cheap lookups are not cached at all.

use confab_core::error::ContextError;
use confab_core::record::{ContextQuery, ContextRecord, ContextStore, RecordKind};
use confab_core::utterance::ScopeId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::cache::{self, SummaryCache};
use crate::clock::Clock;

/// The output of one assembly: bounded records plus an optional cached
/// summary, and the store version they were read at.
#[derive(Debug, Clone)]
pub struct ContextAssembly {
    /// Records that made the budget, relevance-descending
    pub records: Vec<ContextRecord>,

    /// A condensed rendering, present when summarization ran
    pub summary: Option<Arc<str>>,

    /// The scope's store version at fetch time
    pub store_version: u64,
}

impl ContextAssembly {
    /// Render the assembly for inclusion in a completion prompt.
    pub fn render(&self) -> String {
        match &self.summary {
            Some(summary) => summary.to_string(),
            None => format_records(&self.records),
        }
    }
}

/// Assembles bounded context for one query.
pub struct Assembler {
    store: Arc<dyn ContextStore>,
    cache: Arc<SummaryCache>,
    budget_chars: usize,
    summarize_threshold: Duration,
    clock: Arc<dyn Clock>,
}

impl Assembler {
    pub fn new(
        store: Arc<dyn ContextStore>,
        cache: Arc<SummaryCache>,
        budget_chars: usize,
        summarize_threshold: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            budget_chars,
            summarize_threshold,
            clock,
        }
    }

    /// Fetch, rank, and truncate records for a query.
    ///
    /// When the fetch+rank+format pass took longer than the configured
    /// threshold, the formatted summary is computed through the cache
    /// (single-flight, version-fingerprinted); otherwise the records are
    /// returned unsummarized and nothing is cached.
    pub async fn assemble(
        &self,
        scope: &ScopeId,
        query: &ContextQuery,
    ) -> Result<ContextAssembly, ContextError> {
        let started = self.clock.now();

        let store_version = self.store.version(scope).await?;
        let candidates = self.store.fetch(scope, query).await?;
        let records = truncate_to_budget(candidates, self.budget_chars);

        let elapsed = self.clock.now().duration_since(started);
        trace!(
            scope = %scope,
            records = records.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "context assembled"
        );

        let summary = if elapsed >= self.summarize_threshold && !records.is_empty() {
            let key = cache::fingerprint(scope.as_str(), &query.text, store_version);
            let rendered = format_records(&records);
            let summary = self
                .cache
                .get_or_compute(&key, move || async move { rendered })
                .await;
            debug!(scope = %scope, version = store_version, "summary served through cache");
            Some(summary)
        } else {
            None
        };

        Ok(ContextAssembly {
            records,
            summary,
            store_version,
        })
    }
}

/// Keep the highest-relevance records within `budget` characters of
/// formatted output, with the personal-fact floor: if any personal fact was
/// fetched, at least one is retained.
fn truncate_to_budget(candidates: Vec<ContextRecord>, budget: usize) -> Vec<ContextRecord> {
    let mut included: Vec<ContextRecord> = Vec::new();
    let mut used = 0usize;

    // Reserve the best personal fact first so volume can never evict it.
    let best_personal = candidates
        .iter()
        .filter(|r| r.kind == RecordKind::PersonalFact)
        .max_by(|a, b| {
            a.relevance
                .partial_cmp(&b.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|r| r.id.clone());

    if let Some(id) = &best_personal {
        if let Some(record) = candidates.iter().find(|r| &r.id == id) {
            used += record_line(record).len();
            included.push(record.clone());
        }
    }

    for record in candidates {
        if Some(&record.id) == best_personal.as_ref() {
            continue;
        }
        let cost = record_line(&record).len();
        if used + cost > budget {
            continue;
        }
        used += cost;
        included.push(record.clone());
    }

    included.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    included
}

fn record_line(record: &ContextRecord) -> String {
    format!("- [{}] {}: {}\n", record.kind, record.key, record.value)
}

/// Condense records into the prompt-ready block.
fn format_records(records: &[ContextRecord]) -> String {
    if records.is_empty() {
        return String::new();
    }
    let mut out = String::from("Known facts about the user:\n");
    for record in records {
        out.push_str(&record_line(record));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::InMemoryContextStore;

    fn record(kind: RecordKind, key: &str, value: &str, relevance: f32) -> ContextRecord {
        let mut r = ContextRecord::new(kind, key, value);
        r.relevance = relevance;
        r
    }

    fn assembler_with(
        store: Arc<InMemoryContextStore>,
        budget: usize,
        threshold_ms: u64,
    ) -> (Assembler, Arc<SummaryCache>) {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(SummaryCache::new(Duration::from_secs(300), clock.clone()));
        (
            Assembler::new(
                store,
                cache.clone(),
                budget,
                Duration::from_millis(threshold_ms),
                clock,
            ),
            cache,
        )
    }

    #[test]
    fn truncation_keeps_highest_relevance() {
        let records = vec![
            record(RecordKind::EpisodicNote, "note-a", "low value note", 0.2),
            record(RecordKind::EpisodicNote, "note-b", "high value note", 0.9),
        ];
        // Budget fits roughly one line.
        let kept = truncate_to_budget(records, 40);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].key, "note-b");
    }

    #[test]
    fn personal_fact_survives_truncation() {
        let mut records: Vec<ContextRecord> = (0..20)
            .map(|i| {
                record(
                    RecordKind::EpisodicNote,
                    &format!("note-{i}"),
                    "a fairly long episodic note that eats budget",
                    0.9,
                )
            })
            .collect();
        records.push(record(RecordKind::PersonalFact, "name", "Alex", 0.1));

        let kept = truncate_to_budget(records, 200);
        assert!(
            kept.iter()
                .any(|r| r.kind == RecordKind::PersonalFact && r.value == "Alex"),
            "personal fact must not be evicted by volume"
        );
    }

    #[test]
    fn no_personal_fact_no_reservation() {
        let records = vec![record(RecordKind::ListItem, "shopping", "milk", 0.5)];
        let kept = truncate_to_budget(records, 1024);
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn cheap_assembly_is_not_cached() {
        let store = Arc::new(InMemoryContextStore::new());
        let scope = ScopeId::new("alex");
        store
            .seed(&scope, ContextRecord::new(RecordKind::PersonalFact, "name", "Alex"))
            .await;

        // Threshold far above anything the in-memory store can take.
        let (assembler, cache) = assembler_with(store, 2048, 10_000);
        let assembly = assembler
            .assemble(&scope, &ContextQuery::new("name"))
            .await
            .unwrap();

        assert!(assembly.summary.is_none());
        assert_eq!(cache.len().await, 0);
        assert!(assembly.render().contains("Alex"));
    }

    #[tokio::test]
    async fn slow_assembly_goes_through_cache() {
        let store = Arc::new(InMemoryContextStore::new());
        let scope = ScopeId::new("alex");
        store
            .seed(&scope, ContextRecord::new(RecordKind::PersonalFact, "name", "Alex"))
            .await;

        // Zero threshold: every assembly counts as expensive.
        let (assembler, cache) = assembler_with(store, 2048, 0);
        let assembly = assembler
            .assemble(&scope, &ContextQuery::new("name"))
            .await
            .unwrap();

        assert!(assembly.summary.is_some());
        assert_eq!(cache.len().await, 1);
        assert!(assembly.render().contains("Alex"));
    }

    #[tokio::test]
    async fn store_write_invalidates_cached_summary() {
        let store = Arc::new(InMemoryContextStore::new());
        let scope = ScopeId::new("alex");
        store
            .write(&scope, ContextRecord::new(RecordKind::PersonalFact, "name", "Alex"))
            .await
            .unwrap();

        let (assembler, _cache) = assembler_with(store.clone(), 2048, 0);
        let first = assembler
            .assemble(&scope, &ContextQuery::new("name"))
            .await
            .unwrap();
        assert!(first.render().contains("Alex"));

        // A write advances the scope version; the stale summary can never
        // be looked up again.
        store
            .write(&scope, ContextRecord::new(RecordKind::PersonalFact, "name", "Sam"))
            .await
            .unwrap();

        let second = assembler
            .assemble(&scope, &ContextQuery::new("name"))
            .await
            .unwrap();
        assert!(second.render().contains("Sam"));
        assert!(!second.render().contains("Alex"));
        assert!(second.store_version > first.store_version);
    }

    #[tokio::test]
    async fn empty_scope_assembles_empty() {
        let store = Arc::new(InMemoryContextStore::new());
        let (assembler, _cache) = assembler_with(store, 2048, 0);
        let assembly = assembler
            .assemble(&ScopeId::new("nobody"), &ContextQuery::new("anything"))
            .await
            .unwrap();
        assert!(assembly.records.is_empty());
        assert!(assembly.summary.is_none());
        assert_eq!(assembly.render(), "");
    }
}
