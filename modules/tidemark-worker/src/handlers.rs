//! Workflow handlers wired at startup.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use tidemark_common::events::DealSnapshot;
use tidemark_common::{event_types, Config};
use tidemark_workflow::{HandlerRegistry, WorkflowHandler};

/// Build the process-wide registry. Called once at startup, before the
/// dispatcher is started.
pub fn build_registry(config: &Config) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    for event_type in [
        event_types::DEAL_CREATED,
        event_types::DEAL_UPDATED,
        event_types::AGREEMENT_SIGNED,
        event_types::INVOICE_ISSUED,
        event_types::PROJECT_ARCHIVED,
    ] {
        registry.register(event_type, Arc::new(ActivityLog { event_type }));
    }

    match &config.webhook_url {
        Some(url) => {
            info!("Webhook notifications enabled");
            registry.register(
                event_types::DEAL_CREATED,
                Arc::new(WebhookNotify::new(url.clone(), "New deal")),
            );
            registry.register(
                event_types::AGREEMENT_SIGNED,
                Arc::new(WebhookNotify::new(url.clone(), "Agreement signed")),
            );
        }
        None => {
            info!("No WORKFLOW_WEBHOOK_URL set, notifications disabled");
        }
    }

    registry
}

// ---------------------------------------------------------------------------
// ActivityLog — audit trail in the structured log
// ---------------------------------------------------------------------------

/// Records every triggering event in the structured log.
struct ActivityLog {
    event_type: &'static str,
}

#[async_trait]
impl WorkflowHandler for ActivityLog {
    async fn handle(&self, payload: &serde_json::Value) -> Result<()> {
        // Deal events carry a full DealSnapshot; log the richer fields.
        if let Ok(deal) = serde_json::from_value::<DealSnapshot>(payload.clone()) {
            info!(
                event_type = self.event_type,
                tenant = %deal.tenant,
                name = %deal.name,
                stage = %deal.stage,
                amount_cents = deal.amount_cents,
                "Workflow activity"
            );
            return Ok(());
        }

        let tenant = payload
            .get("tenant")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let subject = payload
            .get("name")
            .or_else(|| payload.get("title"))
            .or_else(|| payload.get("number"))
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        info!(
            event_type = self.event_type,
            tenant, subject, "Workflow activity"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WebhookNotify — Slack-compatible incoming webhook
// ---------------------------------------------------------------------------

/// Posts a short message to an incoming webhook.
struct WebhookNotify {
    webhook_url: String,
    label: &'static str,
    http: reqwest::Client,
}

impl WebhookNotify {
    fn new(webhook_url: String, label: &'static str) -> Self {
        Self {
            webhook_url,
            label,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WorkflowHandler for WebhookNotify {
    async fn handle(&self, payload: &serde_json::Value) -> Result<()> {
        let subject = payload
            .get("name")
            .or_else(|| payload.get("title"))
            .and_then(|v| v.as_str())
            .unwrap_or("(unnamed)");
        let tenant = payload
            .get("tenant")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown tenant");

        let body = json!({
            "text": format!(":bell: *{}* — {} ({})", self.label, subject, tenant),
            "unfurl_links": false,
        });

        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "Webhook returned non-success");
            anyhow::bail!("webhook returned {status}");
        }

        Ok(())
    }
}
