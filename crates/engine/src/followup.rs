//! Post-reply follow-ups — best-effort side work after the primary reply.
//!
//! A short, explicit task list attached to the synthesized result and run
//! once the reply is computed: recording the exchange, nudging related
//! state. Failures here are logged and published as events, never surfaced
//! as request failures.

use confab_core::event::{DomainEvent, EventBus};
use confab_core::handler::{ExpertCall, HandlerRegistry};
use std::sync::Arc;
use tracing::{debug, warn};

/// One named best-effort follow-up.
#[derive(Debug, Clone)]
pub struct FollowUp {
    pub name: String,
    pub call: ExpertCall,
}

impl FollowUp {
    pub fn new(name: impl Into<String>, call: ExpertCall) -> Self {
        Self {
            name: name.into(),
            call,
        }
    }
}

/// Run follow-ups sequentially. Never returns an error.
pub async fn run_all(
    followups: &[FollowUp],
    registry: &Arc<HandlerRegistry>,
    events: &Arc<EventBus>,
) {
    for followup in followups {
        let result = registry.dispatch(&followup.call).await;
        if result.success {
            debug!(followup = %followup.name, "follow-up completed");
        } else {
            let error = result.error_kind.unwrap_or_else(|| "unknown".into());
            warn!(followup = %followup.name, error = %error, "follow-up failed");
            events.publish(DomainEvent::FollowUpFailed {
                name: followup.name.clone(),
                error,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use confab_core::error::HandlerError;
    use confab_core::handler::ExpertHandler;

    struct FailingHandler;

    #[async_trait]
    impl ExpertHandler for FailingHandler {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        async fn call(
            &self,
            _args: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, HandlerError> {
            Err(HandlerError::Failed {
                handler: "flaky".into(),
                kind: "boom".into(),
            })
        }
    }

    #[tokio::test]
    async fn failures_are_swallowed_and_published() {
        let registry = Arc::new(
            HandlerRegistry::builder()
                .register(Arc::new(FailingHandler))
                .build(),
        );
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();

        let followups = vec![FollowUp::new(
            "note-exchange",
            ExpertCall::new("flaky", serde_json::json!({})),
        )];

        // Must not error or panic.
        run_all(&followups, &registry, &events).await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::FollowUpFailed { name, .. } if name == "note-exchange"
        ));
    }

    #[tokio::test]
    async fn missing_handler_is_also_non_fatal() {
        let registry = Arc::new(HandlerRegistry::builder().build());
        let events = Arc::new(EventBus::default());
        let followups = vec![FollowUp::new(
            "ghost",
            ExpertCall::new("nope", serde_json::json!({})),
        )];
        run_all(&followups, &registry, &events).await;
    }
}
