//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::eap::{VerifyError, VerifyResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// Backend that knows whether a payment transaction landed
#[async_trait]
pub trait TransactionVerifier: Send + Sync {
    /// Check `tx_id` once
    async fn verify(&self, tx_id: &str) -> Result<VerifyResponse, VerifyError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: TransactionVerifier + ?Sized> TransactionVerifier for Arc<T> {
    async fn verify(&self, tx_id: &str) -> Result<VerifyResponse, VerifyError> {
        (**self).verify(tx_id).await
    }
}
