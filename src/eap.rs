//! Early Access Program purchase verification client
//!
//! Asks the verification backend whether a broadcast payment transaction
//! has been confirmed on chain.

use crate::runtime::TransactionVerifier;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Verification request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Verification backend returned HTTP {0}")]
    Status(u16),
}

/// Answer from the verification backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    tx_hash: &'a str,
}

/// Verifier backed by the HTTP verification endpoint
pub struct HttpVerifier {
    client: Client,
    endpoint: String,
}

impl HttpVerifier {
    pub fn new(base_url: &str) -> Result<Self, VerifyError> {
        let client = Client::builder().timeout(VERIFY_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint_for(base_url),
        })
    }
}

fn endpoint_for(base_url: &str) -> String {
    format!("{}/api/eap/verify", base_url.trim_end_matches('/'))
}

#[async_trait]
impl TransactionVerifier for HttpVerifier {
    async fn verify(&self, tx_id: &str) -> Result<VerifyResponse, VerifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&VerifyRequest { tx_hash: tx_id })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::Status(status.as_u16()));
        }

        Ok(response.json::<VerifyResponse>().await?)
    }
}
