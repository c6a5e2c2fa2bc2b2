//! Workflow trigger pipeline.
//!
//! Consumes the durable outbox on a fixed interval and hands each pending
//! event to the handlers registered for its type. Delivery is at-least-once:
//! an event is stamped processed after its handlers were attempted, whether
//! or not they succeeded, and is never redelivered.
//!
//! Consumers define workflows by implementing [`WorkflowHandler`] and
//! registering instances in a [`HandlerRegistry`] before starting the
//! [`Dispatcher`].

pub mod dispatcher;
pub mod registry;
pub mod source;
pub mod traits;

pub use dispatcher::{Dispatcher, DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL};
pub use registry::HandlerRegistry;
pub use source::MemoryOutbox;
pub use traits::{EventSource, WorkflowHandler};
