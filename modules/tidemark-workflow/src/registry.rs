//! Handler registry — event type → ordered workflow handlers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::WorkflowHandler;

/// Maps event types to the handlers that run when the type is dispatched.
///
/// Built once at process startup, then handed to the dispatcher by value —
/// no module-level state. Handlers for a type run in registration order.
/// Unknown types resolve to an empty slice, which the dispatcher treats as a
/// successful no-op: unregistered event types are expected as the system
/// evolves and must not halt the pipeline.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Arc<dyn WorkflowHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `event_type`.
    pub fn register(&mut self, event_type: impl Into<String>, handler: Arc<dyn WorkflowHandler>) {
        self.handlers
            .entry(event_type.into())
            .or_default()
            .push(handler);
    }

    /// Handlers for `event_type`, in registration order. Empty if none.
    pub fn handlers_for(&self, event_type: &str) -> &[Arc<dyn WorkflowHandler>] {
        self.handlers
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of event types with at least one handler.
    pub fn types_registered(&self) -> usize {
        self.handlers.len()
    }
}
