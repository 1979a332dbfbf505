//! Signer port — the wallet capability that answers challenges.
//!
//! The runtime never inspects key material or verifies signatures. It hands
//! the challenge to the signer and forwards whatever string comes back to
//! `POST /auth/exchange`. A faulty signer can only make authentication fail
//! remotely; it cannot corrupt local state, because nothing is cached until
//! the exchange succeeds.

use async_trait::async_trait;
use keyward_api::Challenge;

pub use crate::error::SignerError;

/// Produces a signature bound to one challenge.
#[async_trait]
pub trait Signer: Send + Sync + 'static {
    async fn sign_challenge(&self, challenge: &Challenge) -> Result<String, SignerError>;
}
