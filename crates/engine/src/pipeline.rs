//! The utterance pipeline.
//!
//! One inbound utterance, one reply. The fast path answers deterministic
//! requests with a single handler call; everything else goes through the
//! router, which picks exactly one execution path — single completion with
//! assembled context, one handler call with minimal context, or a
//! decomposed task graph. The classification fully determines the path:
//! the pipeline never invokes more than one of them per utterance.

use confab_config::AppConfig;
use confab_context::{Assembler, Clock, SummaryCache, SystemClock};
use confab_core::classification::{ClassificationResult, DeterministicAction, ExecutionPath, IntentClass};
use confab_core::completion::{CompletionBackend, CompletionRequest, PromptMessage};
use confab_core::error::{CompletionError, Error, HandlerError, Result};
use confab_core::event::{DomainEvent, EventBus};
use confab_core::handler::{ExpertCall, HandlerRegistry};
use confab_core::record::{ContextQuery, ContextStore};
use confab_core::reply::{Reply, Verdict};
use confab_core::utterance::{ConversationId, ConversationState, Turn, TurnRole, Utterance};
use confab_orchestrator::{BackendPlanner, Executor, PlanDefaults, Planner, RulePlanner, TaskGraph};
use confab_router::{QueryRouter, TemplateRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::followup::{self, FollowUp};
use crate::grounding;
use crate::synthesizer;

/// The assembled pipeline. Everything behind `Arc` is shared with spawned
/// work; the engine itself is cheap to share behind one more `Arc`.
pub struct Engine {
    config: AppConfig,
    templates: TemplateRegistry,
    router: QueryRouter,
    assembler: Assembler,
    cache: Arc<SummaryCache>,
    registry: Arc<HandlerRegistry>,
    executor: Executor,
    backend: Arc<dyn CompletionBackend>,
    planner: Box<dyn Planner>,
    events: Arc<EventBus>,
    conversations: RwLock<HashMap<ConversationId, ConversationState>>,
}

impl Engine {
    /// Wire an engine from its collaborators. The handler registry is
    /// frozen before it gets here; nothing registers at request time.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ContextStore>,
        backend: Arc<dyn CompletionBackend>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        let events = Arc::new(EventBus::default());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = Arc::new(SummaryCache::new(
            Duration::from_secs(config.context.cache_ttl_secs),
            clock.clone(),
        ));
        let assembler = Assembler::new(
            store,
            cache.clone(),
            config.context.budget_chars,
            Duration::from_millis(config.context.summarize_threshold_ms),
            clock,
        );
        let router = QueryRouter::from_config(&config);
        let planner = Box::new(BackendPlanner::new(
            backend.clone(),
            config.profile_for(IntentClass::ComplexMultiStep),
        ));
        let executor = Executor::new(registry.clone(), events.clone());

        Self {
            config,
            templates: confab_router::fastpath::default_registry(),
            router,
            assembler,
            cache,
            registry,
            executor,
            backend,
            planner,
            events,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the fast-path template set (must already be conflict-checked
    /// by the registry it came from).
    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    /// Replace the decomposition strategy.
    pub fn with_planner(mut self, planner: Box<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    /// The engine's event bus, for observers.
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Spawn the summary-cache reaper.
    pub fn start_reaper(&self) -> tokio::task::JoinHandle<()> {
        self.cache
            .start_reaper(Duration::from_secs(self.config.context.reaper_interval_secs))
    }

    /// Process one utterance into one reply.
    pub async fn handle(&self, utterance: Utterance) -> Result<Reply> {
        self.events.publish(DomainEvent::UtteranceReceived {
            scope: utterance.scope.to_string(),
            conversation: utterance.conversation.to_string(),
            chars: utterance.text.len(),
            timestamp: chrono::Utc::now(),
        });

        // Deterministic fast path: one handler call, no router, no context.
        if let Some(action) = self.templates.classify_fast(&utterance) {
            self.events.publish(DomainEvent::FastPathHit {
                handler: action.handler.clone(),
                timestamp: chrono::Utc::now(),
            });
            let reply = self.run_deterministic(&utterance, action).await?;
            self.finish(&utterance, reply).await
        } else {
            let state = self.conversation_state(&utterance.conversation).await;
            let classification = self.router.route(&utterance, &state);
            self.events.publish(DomainEvent::RouteSelected {
                intent: classification.intent,
                path: classification.path,
                confidence: classification.confidence,
                timestamp: chrono::Utc::now(),
            });

            let reply = match classification.path {
                ExecutionPath::HandlerCall => {
                    self.run_action(&utterance, &state, &classification).await?
                }
                ExecutionPath::MultiAgent => {
                    self.run_orchestrated(&utterance, &classification).await?
                }
                ExecutionPath::FastPath | ExecutionPath::SingleCompletion => {
                    self.run_single_completion(&utterance, &state, &classification)
                        .await?
                }
            };
            self.finish(&utterance, reply).await
        }
    }

    // ── Path runners ──────────────────────────────────────────────────────

    async fn run_deterministic(
        &self,
        utterance: &Utterance,
        action: DeterministicAction,
    ) -> Result<Reply> {
        let call = ExpertCall::new(
            &action.handler,
            inject_scope(action.args, &utterance.scope),
        );
        let result = self.registry.dispatch(&call).await;

        if !result.success {
            // No retries at this layer; the handler-failure signal is the
            // caller's to translate.
            return Err(Error::Handler(handler_error(&action.handler, &result.error_kind)));
        }

        info!(handler = %action.handler, "fast-path action completed");
        Ok(synthesizer::from_action(&result))
    }

    async fn run_single_completion(
        &self,
        utterance: &Utterance,
        state: &ConversationState,
        classification: &ClassificationResult,
    ) -> Result<Reply> {
        // Context store down is fatal on this path.
        let assembly = self
            .assembler
            .assemble(&utterance.scope, &ContextQuery::new(&utterance.text))
            .await
            .map_err(Error::Context)?;

        let mut messages = vec![PromptMessage::system(system_prompt(&assembly.render()))];
        for turn in state.turns() {
            messages.push(match turn.role {
                TurnRole::User => PromptMessage::user(&turn.text),
                TurnRole::Assistant => PromptMessage::assistant(&turn.text),
            });
        }
        messages.push(PromptMessage::user(&utterance.text));

        let request = CompletionRequest::new(classification.profile.clone(), messages);
        let timeout = Duration::from_millis(self.config.backend.request_timeout_ms);
        let response = match tokio::time::timeout(timeout, self.backend.complete(request)).await {
            Ok(Ok(response)) => response,
            // Backend down or erroring is fatal on this path.
            Ok(Err(err)) => return Err(Error::Completion(err)),
            // The in-flight call is dropped on timeout; a late result is
            // discarded, not merged.
            Err(_) => {
                return Err(Error::Completion(CompletionError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }));
            }
        };

        let reply = synthesizer::from_completion(&response.text);
        Ok(self.annotate(reply, &assembly.records))
    }

    async fn run_action(
        &self,
        utterance: &Utterance,
        state: &ConversationState,
        classification: &ClassificationResult,
    ) -> Result<Reply> {
        let tasks = RulePlanner
            .plan(&utterance.text, &self.registry, &self.plan_defaults())
            .await?;

        let Some(task) = tasks.into_iter().next() else {
            // Nothing actionable after all; answer it as conversation.
            return self
                .run_single_completion(utterance, state, classification)
                .await;
        };

        let call = ExpertCall::new(&task.handler, inject_scope(task.args, &utterance.scope));
        let result = self.registry.dispatch_with_timeout(&call, task.timeout).await;

        if !result.success {
            return Err(Error::Handler(handler_error(&task.handler, &result.error_kind)));
        }
        Ok(synthesizer::from_action(&result))
    }

    async fn run_orchestrated(
        &self,
        utterance: &Utterance,
        classification: &ClassificationResult,
    ) -> Result<Reply> {
        // Context store down only degrades this path.
        let assembly = match self
            .assembler
            .assemble(&utterance.scope, &ContextQuery::new(&utterance.text))
            .await
        {
            Ok(assembly) => Some(assembly),
            Err(err) => {
                warn!(error = %err, "context unavailable, orchestrating without it");
                None
            }
        };

        // Planner backend down only degrades decomposition to the rules.
        let defaults = self.plan_defaults();
        let tasks = match self
            .planner
            .plan(&utterance.text, &self.registry, &defaults)
            .await
        {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, "planner unavailable, falling back to rule-based decomposition");
                RulePlanner
                    .plan(&utterance.text, &self.registry, &defaults)
                    .await?
            }
        };

        if tasks.is_empty() {
            // Decomposition found nothing to do; degrade to one completion.
            let state = self.conversation_state(&utterance.conversation).await;
            return self
                .run_single_completion(utterance, &state, classification)
                .await;
        }

        let mut builder = TaskGraph::builder(Duration::from_millis(
            self.config.orchestrator.graph_timeout_ms,
        ));
        for mut task in tasks {
            task.args = inject_scope(task.args, &utterance.scope);
            builder = builder.add_task(task);
        }
        // A malformed graph is fatal before any task runs.
        let graph = builder.build().map_err(Error::Graph)?;

        let outcome = self.executor.execute(graph).await;
        let reply = synthesizer::from_orchestration(&outcome);
        let reply = match &assembly {
            Some(assembly) => self.annotate(reply, &assembly.records),
            None => reply,
        };

        // Post-reply, best-effort: record that the exchange happened.
        let followups = vec![FollowUp::new(
            "note-exchange",
            ExpertCall::new(
                "memory-write",
                serde_json::json!({
                    "instruction": format!("Handled request: {}", utterance.text),
                    "scope": utterance.scope.as_str(),
                }),
            ),
        )];
        followup::run_all(&followups, &self.registry, &self.events).await;

        Ok(reply)
    }

    // ── Shared plumbing ───────────────────────────────────────────────────

    fn annotate(&self, reply: Reply, records: &[confab_core::record::ContextRecord]) -> Reply {
        let annotations = grounding::validate(&reply.text, records);
        for annotation in &annotations {
            if annotation.verdict != Verdict::Supported {
                self.events.publish(DomainEvent::GroundingFlagged {
                    claim_preview: annotation.claim.chars().take(80).collect(),
                    verdict: format!("{:?}", annotation.verdict).to_lowercase(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }
        reply.with_annotations(annotations)
    }

    fn plan_defaults(&self) -> PlanDefaults {
        PlanDefaults {
            task_timeout: Duration::from_millis(self.config.orchestrator.task_timeout_ms),
            graph_timeout: Duration::from_millis(self.config.orchestrator.graph_timeout_ms),
            max_tasks: self.config.orchestrator.max_tasks,
        }
    }

    async fn conversation_state(&self, id: &ConversationId) -> ConversationState {
        self.conversations
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_else(|| ConversationState::new(self.config.history_turns))
    }

    /// Record the exchange in the conversation window and publish the
    /// reply-ready event.
    async fn finish(&self, utterance: &Utterance, reply: Reply) -> Result<Reply> {
        {
            let mut conversations = self.conversations.write().await;
            let state = conversations
                .entry(utterance.conversation.clone())
                .or_insert_with(|| ConversationState::new(self.config.history_turns));
            state.push(Turn::user(&utterance.text));
            state.push(Turn::assistant(&reply.text));
        }

        self.events.publish(DomainEvent::ReplyReady {
            conversation: utterance.conversation.to_string(),
            annotations: reply.annotations.len(),
            timestamp: chrono::Utc::now(),
        });
        Ok(reply)
    }
}

fn system_prompt(context_block: &str) -> String {
    let base = "You are confab, a concise personal assistant. \
                Use the known facts about the user when they are relevant, \
                and say so when you do not know something.";
    if context_block.is_empty() {
        base.to_string()
    } else {
        format!("{base}\n\n{context_block}")
    }
}

/// Handlers receive the utterance's scope alongside their arguments.
fn inject_scope(args: serde_json::Value, scope: &confab_core::utterance::ScopeId) -> serde_json::Value {
    match args {
        serde_json::Value::Object(mut map) => {
            map.insert(
                "scope".to_string(),
                serde_json::Value::String(scope.to_string()),
            );
            serde_json::Value::Object(map)
        }
        other => serde_json::json!({ "scope": scope.to_string(), "input": other }),
    }
}

fn handler_error(handler: &str, error_kind: &Option<String>) -> HandlerError {
    match error_kind.as_deref() {
        Some("not_found") => HandlerError::NotFound(handler.to_string()),
        Some("timeout") => HandlerError::Timeout {
            handler: handler.to_string(),
            timeout_ms: 0,
        },
        kind => HandlerError::Failed {
            handler: handler.to_string(),
            kind: kind.unwrap_or("unknown").to_string(),
        },
    }
}
