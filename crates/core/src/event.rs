//! Domain event system — decoupled observation of the pipeline.
//!
//! Events are published as the pipeline moves an utterance along. Router
//! decisions are logged here with their inputs for offline evaluation, but
//! nothing subscribes back into the decision path — adaptation is an
//! external concern. Publishing never blocks the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::classification::{ExecutionPath, IntentClass};
use crate::task::TaskState;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A new utterance entered the pipeline
    UtteranceReceived {
        scope: String,
        conversation: String,
        chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// The fast path matched a template
    FastPathHit {
        handler: String,
        timestamp: DateTime<Utc>,
    },

    /// The router picked a class and path
    RouteSelected {
        intent: IntentClass,
        path: ExecutionPath,
        confidence: f32,
        timestamp: DateTime<Utc>,
    },

    /// A task reached a terminal state
    TaskFinished {
        task_id: String,
        handler: String,
        state: TaskState,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The final reply was synthesized
    ReplyReady {
        conversation: String,
        annotations: usize,
        timestamp: DateTime<Utc>,
    },

    /// The grounding validator flagged a claim
    GroundingFlagged {
        claim_preview: String,
        verdict: String,
        timestamp: DateTime<Utc>,
    },

    /// A post-reply follow-up task failed (logged, never surfaced)
    FollowUpFailed {
        name: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Components
/// subscribe and filter for the events they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::FastPathHit {
            handler: "list-write".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::FastPathHit { handler, .. } => {
                assert_eq!(handler, "list-write");
            }
            _ => panic!("Expected FastPathHit event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(4);
        bus.publish(DomainEvent::ReplyReady {
            conversation: "c1".into(),
            annotations: 0,
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn route_selected_serializes_class() {
        let event = DomainEvent::RouteSelected {
            intent: IntentClass::FactualLookup,
            path: ExecutionPath::SingleCompletion,
            confidence: 0.72,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("factual-lookup"));
        assert!(json.contains("single-completion"));
    }
}
