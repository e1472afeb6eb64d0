//! List-write handler — adds an item to a named list.

use async_trait::async_trait;
use confab_core::error::HandlerError;
use confab_core::handler::ExpertHandler;
use confab_core::record::{ContextRecord, ContextStore, RecordKind};
use std::sync::Arc;
use tracing::info;

use crate::{arg_scope, arg_str};

pub struct ListWriteHandler {
    store: Arc<dyn ContextStore>,
}

impl ListWriteHandler {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

/// Recover `(item, list)` from a planner instruction like
/// "add milk to my shopping list".
fn parse_instruction(instruction: &str) -> Option<(String, String)> {
    let lower = instruction.to_lowercase();
    let rest = lower.strip_prefix("add ").or_else(|| lower.strip_prefix("put "))?;
    let (item, list_part) = rest.split_once(" to ")?;

    let list = list_part
        .trim_start_matches("my ")
        .trim_start_matches("the ")
        .trim_end_matches(" list")
        .trim();
    if item.is_empty() || list.is_empty() {
        return None;
    }
    Some((item.trim().to_string(), list.to_string()))
}

#[async_trait]
impl ExpertHandler for ListWriteHandler {
    fn name(&self) -> &str {
        "list-write"
    }

    fn description(&self) -> &str {
        "Add an item to a named list (shopping, errands, ...)"
    }

    async fn call(
        &self,
        args: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, HandlerError> {
        let (item, list) = match (arg_str(&args, "item"), arg_str(&args, "list")) {
            (Some(item), Some(list)) => (item.to_string(), list.to_string()),
            _ => arg_str(&args, "instruction")
                .and_then(parse_instruction)
                .ok_or_else(|| {
                    HandlerError::InvalidArguments(
                        "need 'item' and 'list', or a parseable 'instruction'".into(),
                    )
                })?,
        };

        let scope = arg_scope(&args);
        self.store
            .write(&scope, ContextRecord::new(RecordKind::ListItem, &list, &item))
            .await
            .map_err(|e| HandlerError::Failed {
                handler: "list-write".into(),
                kind: e.to_string(),
            })?;

        info!(%scope, list = %list, item = %item, "list item written");
        Ok(serde_json::json!({
            "status": "added",
            "item": item,
            "list": list,
        }))
    }
}
