//! Calendar-write handler — records an event or reminder.

use async_trait::async_trait;
use confab_core::error::HandlerError;
use confab_core::handler::ExpertHandler;
use confab_core::record::{ContextRecord, ContextStore, RecordKind};
use std::sync::Arc;
use tracing::info;

use crate::{arg_scope, arg_str};

pub struct CalendarWriteHandler {
    store: Arc<dyn ContextStore>,
}

impl CalendarWriteHandler {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ExpertHandler for CalendarWriteHandler {
    fn name(&self) -> &str {
        "calendar-write"
    }

    fn description(&self) -> &str {
        "Create a calendar entry or timed reminder"
    }

    async fn call(
        &self,
        args: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, HandlerError> {
        let title = arg_str(&args, "title")
            .or_else(|| arg_str(&args, "task"))
            .or_else(|| arg_str(&args, "instruction"))
            .ok_or_else(|| {
                HandlerError::InvalidArguments("need 'title' or 'instruction'".into())
            })?
            .to_string();
        let time = arg_str(&args, "time").unwrap_or("unscheduled").to_string();

        let scope = arg_scope(&args);
        self.store
            .write(
                &scope,
                ContextRecord::new(RecordKind::CalendarItem, &time, &title),
            )
            .await
            .map_err(|e| HandlerError::Failed {
                handler: "calendar-write".into(),
                kind: e.to_string(),
            })?;

        info!(%scope, title = %title, time = %time, "calendar entry written");
        Ok(serde_json::json!({
            "status": "scheduled",
            "title": title,
            "time": time,
        }))
    }
}
