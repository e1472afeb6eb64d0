//! Memory-write handler — stores facts and notes for later recall.
//!
//! Structured `key`/`value` pairs become personal facts; raw planner
//! instructions become episodic notes.

use async_trait::async_trait;
use confab_core::error::HandlerError;
use confab_core::handler::ExpertHandler;
use confab_core::record::{ContextRecord, ContextStore, RecordKind};
use std::sync::Arc;
use tracing::info;

use crate::{arg_scope, arg_str};

pub struct MemoryWriteHandler {
    store: Arc<dyn ContextStore>,
}

impl MemoryWriteHandler {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ExpertHandler for MemoryWriteHandler {
    fn name(&self) -> &str {
        "memory-write"
    }

    fn description(&self) -> &str {
        "Store a fact or note in the user's memory"
    }

    async fn call(
        &self,
        args: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, HandlerError> {
        let (kind, key, value) = match (arg_str(&args, "key"), arg_str(&args, "value")) {
            (Some(key), Some(value)) => {
                (RecordKind::PersonalFact, key.to_string(), value.to_string())
            }
            _ => {
                let note = arg_str(&args, "instruction").ok_or_else(|| {
                    HandlerError::InvalidArguments(
                        "need 'key' and 'value', or an 'instruction'".into(),
                    )
                })?;
                (RecordKind::EpisodicNote, "note".to_string(), note.to_string())
            }
        };

        let scope = arg_scope(&args);
        let id = self
            .store
            .write(&scope, ContextRecord::new(kind, &key, &value))
            .await
            .map_err(|e| HandlerError::Failed {
                handler: "memory-write".into(),
                kind: e.to_string(),
            })?;

        info!(%scope, key = %key, kind = %kind, "memory written");
        Ok(serde_json::json!({
            "status": "remembered",
            "record_id": id,
            "key": key,
        }))
    }
}
