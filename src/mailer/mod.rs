//! Outbound mail via the mail gateway
//!
//! Mail delivery is fire-and-forget relative to the request that triggers
//! it; template rendering happens in the gateway, this side only ships a
//! flat snapshot.

use anyhow::{Context, Result};
use serde_json::json;

use crate::config::Config;
use crate::contract::Contract;

/// Thin client for the mail gateway
pub struct Mailer {
    client: reqwest::Client,
    endpoint: Option<String>,
    from: String,
    admin_to: Option<String>,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        if config.mail_api_url.is_none() || config.admin_email.is_none() {
            tracing::warn!("Mail gateway not configured; contract update mails are disabled");
        }

        Self {
            client: reqwest::Client::new(),
            endpoint: config.mail_api_url.clone(),
            from: config.mail_from.clone(),
            admin_to: config.admin_email.clone(),
        }
    }

    /// Notify the admin mailbox about a buyer-initiated contract update
    pub async fn send_contract_updated(&self, contract: &Contract) -> Result<()> {
        let (endpoint, admin_to) = match (&self.endpoint, &self.admin_to) {
            (Some(endpoint), Some(admin_to)) => (endpoint, admin_to),
            _ => {
                tracing::debug!(
                    contract = %contract.contract_number,
                    "Mail gateway not configured, skipping contract update mail"
                );
                return Ok(());
            }
        };

        let payload = json!({
            "from": self.from,
            "to": admin_to,
            "template": "contract-updated",
            "subject": format!("Contract {} updated", contract.contract_number),
            "data": {
                "contract_id": contract.id,
                "contract_number": contract.contract_number,
                "status": contract.status,
                "buyer_id": contract.buyer_id,
                "seller_id": contract.seller_id,
                "total_amount_cents": contract.total_amount_cents,
                "currency": contract.currency,
                "updated_at": contract.updated_at,
            },
        });

        let response = self
            .client
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .context("Failed to reach mail gateway")?;

        if !response.status().is_success() {
            anyhow::bail!("Mail gateway returned {}", response.status());
        }

        tracing::info!(
            contract = %contract.contract_number,
            "Contract update mail queued"
        );

        Ok(())
    }
}
