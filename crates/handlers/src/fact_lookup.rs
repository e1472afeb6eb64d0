//! Fact-lookup handler — reads one stored fact by key.

use async_trait::async_trait;
use confab_core::error::HandlerError;
use confab_core::handler::ExpertHandler;
use confab_core::record::{ContextQuery, ContextStore, RecordKind};
use std::sync::Arc;

use crate::{arg_scope, arg_str};

pub struct FactLookupHandler {
    store: Arc<dyn ContextStore>,
}

impl FactLookupHandler {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ExpertHandler for FactLookupHandler {
    fn name(&self) -> &str {
        "fact-lookup"
    }

    fn description(&self) -> &str {
        "Look up a stored fact about the user by key"
    }

    async fn call(
        &self,
        args: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, HandlerError> {
        let key = arg_str(&args, "key")
            .or_else(|| arg_str(&args, "instruction"))
            .ok_or_else(|| HandlerError::InvalidArguments("need 'key' or 'instruction'".into()))?;

        let scope = arg_scope(&args);
        let records = self
            .store
            .fetch(
                &scope,
                &ContextQuery::new(key).with_kinds(vec![RecordKind::PersonalFact]),
            )
            .await
            .map_err(|e| HandlerError::Failed {
                handler: "fact-lookup".into(),
                kind: e.to_string(),
            })?;

        let best = records.first().ok_or_else(|| HandlerError::Failed {
            handler: "fact-lookup".into(),
            kind: "unknown_fact".into(),
        })?;

        Ok(serde_json::json!({
            "key": best.key,
            "value": best.value,
            "record_id": best.id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_context::InMemoryContextStore;
    use confab_core::record::ContextRecord;
    use confab_core::utterance::ScopeId;

    #[tokio::test]
    async fn finds_stored_fact() {
        let store = Arc::new(InMemoryContextStore::new());
        store
            .seed(
                &ScopeId::new("alex"),
                ContextRecord::new(RecordKind::PersonalFact, "name", "Alex"),
            )
            .await;

        let handler = FactLookupHandler::new(store);
        let payload = handler
            .call(serde_json::json!({"key": "name", "scope": "alex"}))
            .await
            .unwrap();
        assert_eq!(payload["value"], "Alex");
    }

    #[tokio::test]
    async fn unknown_fact_is_a_failure() {
        let handler = FactLookupHandler::new(Arc::new(InMemoryContextStore::new()));
        let err = handler
            .call(serde_json::json!({"key": "shoe size", "scope": "alex"}))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed { .. }));
    }
}
