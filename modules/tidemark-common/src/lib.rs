//! Shared configuration and the domain event catalogue.
//!
//! Nothing here touches the database or the network. Producers use
//! [`DomainEvent`] to keep event tags and payload shapes consistent; the
//! outbox itself stays open-ended and stores any `(event_type, payload)`
//! pair.

pub mod config;
pub mod events;

pub use config::Config;
pub use events::{event_types, DomainEvent};
