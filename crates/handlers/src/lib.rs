//! Built-in expert handler implementations for confab.
//!
//! One handler per capability domain: list writes, calendar writes, memory
//! writes, device control, and fact lookup. Each is an in-process reference
//! implementation of the uniform handler contract; deployments that run
//! capabilities as remote services register adapters with the same names
//! instead.
//!
//! Handlers accept either structured arguments (`{"item": "milk", "list":
//! "shopping"}`) or a raw `instruction` string from the planner, extracting
//! what they need from it.

pub mod calendar_write;
pub mod device_control;
pub mod fact_lookup;
pub mod list_write;
pub mod memory_write;

use confab_core::handler::HandlerRegistry;
use confab_core::record::ContextStore;
use std::sync::Arc;

/// Create the default handler registry, frozen at startup.
pub fn default_registry(store: Arc<dyn ContextStore>) -> HandlerRegistry {
    HandlerRegistry::builder()
        .register(Arc::new(list_write::ListWriteHandler::new(store.clone())))
        .register(Arc::new(calendar_write::CalendarWriteHandler::new(store.clone())))
        .register(Arc::new(memory_write::MemoryWriteHandler::new(store.clone())))
        .register(Arc::new(fact_lookup::FactLookupHandler::new(store)))
        .register(Arc::new(device_control::DeviceControlHandler::new()))
        .build()
}

/// Pull a string field out of handler arguments.
pub(crate) fn arg_str<'a>(args: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// The scope id the engine injects into every dispatched call.
pub(crate) fn arg_scope(args: &serde_json::Value) -> confab_core::utterance::ScopeId {
    confab_core::utterance::ScopeId::new(arg_str(args, "scope").unwrap_or("default"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_context::InMemoryContextStore;

    #[test]
    fn default_registry_has_all_domains() {
        let registry = default_registry(Arc::new(InMemoryContextStore::new()));
        assert_eq!(
            registry.names(),
            vec![
                "calendar-write",
                "device-control",
                "fact-lookup",
                "list-write",
                "memory-write",
            ]
        );
    }
}
