//! API request and response types

use crate::db::{Conversation, Message};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation with its messages
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Request to verify an EAP payment
#[derive(Debug, Deserialize)]
pub struct VerifyTransactionRequest {
    pub tx_id: String,
}

/// Response for a started verification
#[derive(Debug, Serialize)]
pub struct VerifyStartedResponse {
    pub session_id: Uuid,
}

/// Response for cancel action
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub ok: bool,
}

/// Query for the token search
#[derive(Debug, Default, Deserialize)]
pub struct TokenSearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub beta: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
