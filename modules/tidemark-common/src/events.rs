//! Domain events emitted by the business-mutation layer.
//!
//! Every variant is a fact about a committed state change, carrying a full
//! snapshot of the domain object at emission time (not a diff). Payloads
//! serialize to `serde_json::Value` for the outbox; the dispatcher never
//! looks inside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type tags as stored in the outbox `event_type` column.
///
/// Handlers register against these. The column itself is open-ended — an
/// unregistered or unknown tag is a no-op at dispatch time.
pub mod event_types {
    pub const DEAL_CREATED: &str = "deal.created";
    pub const DEAL_UPDATED: &str = "deal.updated";
    pub const AGREEMENT_SIGNED: &str = "agreement.signed";
    pub const INVOICE_ISSUED: &str = "invoice.issued";
    pub const PROJECT_ARCHIVED: &str = "project.archived";
}

/// Snapshot of a deal at the moment of emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealSnapshot {
    pub id: Uuid,
    pub tenant: String,
    pub name: String,
    pub stage: String,
    pub amount_cents: i64,
    pub owner: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of an agreement at the moment of emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementSnapshot {
    pub id: Uuid,
    pub tenant: String,
    pub title: String,
    pub deal_id: Option<Uuid>,
    pub signed_at: DateTime<Utc>,
}

/// Snapshot of an invoice at the moment of emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub id: Uuid,
    pub tenant: String,
    pub number: String,
    pub amount_cents: i64,
    pub issued_at: DateTime<Utc>,
}

/// Snapshot of a project at the moment of emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: Uuid,
    pub tenant: String,
    pub name: String,
    pub archived_at: DateTime<Utc>,
}

/// A fact about what happened in the business layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    DealCreated(DealSnapshot),
    DealUpdated(DealSnapshot),
    AgreementSigned(AgreementSnapshot),
    InvoiceIssued(InvoiceSnapshot),
    ProjectArchived(ProjectSnapshot),
}

impl DomainEvent {
    /// The event type string for the outbox `event_type` column.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::DealCreated(_) => event_types::DEAL_CREATED,
            DomainEvent::DealUpdated(_) => event_types::DEAL_UPDATED,
            DomainEvent::AgreementSigned(_) => event_types::AGREEMENT_SIGNED,
            DomainEvent::InvoiceIssued(_) => event_types::INVOICE_ISSUED,
            DomainEvent::ProjectArchived(_) => event_types::PROJECT_ARCHIVED,
        }
    }

    /// Serialize the snapshot to the JSON payload stored in the outbox.
    pub fn to_payload(&self) -> serde_json::Value {
        let result = match self {
            DomainEvent::DealCreated(s) | DomainEvent::DealUpdated(s) => serde_json::to_value(s),
            DomainEvent::AgreementSigned(s) => serde_json::to_value(s),
            DomainEvent::InvoiceIssued(s) => serde_json::to_value(s),
            DomainEvent::ProjectArchived(s) => serde_json::to_value(s),
        };
        result.expect("DomainEvent serialization should never fail")
    }

    /// The tenant that owns the underlying domain object.
    pub fn tenant(&self) -> &str {
        match self {
            DomainEvent::DealCreated(s) | DomainEvent::DealUpdated(s) => &s.tenant,
            DomainEvent::AgreementSigned(s) => &s.tenant,
            DomainEvent::InvoiceIssued(s) => &s.tenant,
            DomainEvent::ProjectArchived(s) => &s.tenant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal() -> DealSnapshot {
        DealSnapshot {
            id: Uuid::new_v4(),
            tenant: "acme".to_string(),
            name: "Acme Deal".to_string(),
            stage: "qualified".to_string(),
            amount_cents: 250_000,
            owner: Some("jordan".to_string()),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn event_type_matches_registry_tags() {
        let event = DomainEvent::DealCreated(deal());
        assert_eq!(event.event_type(), "deal.created");

        let event = DomainEvent::DealUpdated(deal());
        assert_eq!(event.event_type(), "deal.updated");
    }

    #[test]
    fn payload_is_the_snapshot_not_the_wrapper() {
        let snapshot = deal();
        let event = DomainEvent::DealCreated(snapshot.clone());
        let payload = event.to_payload();

        // No enum tag in the payload — just the snapshot fields.
        assert_eq!(payload["name"], "Acme Deal");
        assert_eq!(payload["amount_cents"], 250_000);
        assert!(payload.get("DealCreated").is_none());

        let back: DealSnapshot = serde_json::from_value(payload).unwrap();
        assert_eq!(back.id, snapshot.id);
    }

    #[test]
    fn tenant_is_exposed_for_context_columns() {
        let event = DomainEvent::DealCreated(deal());
        assert_eq!(event.tenant(), "acme");
    }
}
