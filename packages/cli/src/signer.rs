//! Local development signer — an Ed25519 key held in the CLI process.
//!
//! Real deployments plug a wallet into [`keyward_runtime::Signer`]; this one
//! exists so the CLI can talk to a test identity service without one. The
//! *user* persists the seed (e.g. in `KEYWARD_SEED`) and passes it back on
//! each run.
//!
//! ```text
//! First run:
//!   keyward keygen                 # prints seed + public key
//!   register the public key with the identity service
//!
//! Subsequent runs:
//!   KEYWARD_SEED=<seed> keyward whoami
//! ```

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use keyward_api::Challenge;
use keyward_runtime::{Signer, SignerError};
use rand::rngs::OsRng;

#[derive(Clone)]
pub struct LocalKeySigner {
    signing_key: SigningKey,
}

impl LocalKeySigner {
    /// Generate a fresh key using OS randomness.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restore a key from a base58-encoded 32-byte seed.
    pub fn from_seed_base58(seed: &str) -> Result<Self, String> {
        let bytes = bs58::decode(seed.trim())
            .into_vec()
            .map_err(|e| format!("seed is not valid base58: {e}"))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("seed must be 32 bytes, got {}", b.len()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// The seed, base58-encoded. **Keep this secret.**
    pub fn seed_base58(&self) -> String {
        bs58::encode(self.signing_key.to_bytes()).into_string()
    }

    /// The public key in multibase form: `z` + base58btc(`0xed 0x01` ‖ key).
    pub fn public_key_multibase(&self) -> String {
        let mut prefixed = vec![0xed, 0x01];
        prefixed.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        format!("z{}", bs58::encode(prefixed).into_string())
    }
}

#[async_trait]
impl Signer for LocalKeySigner {
    /// Signs the challenge payload bytes; the signature is base58-encoded.
    async fn sign_challenge(&self, challenge: &Challenge) -> Result<String, SignerError> {
        let signature = self.signing_key.sign(challenge.payload.as_bytes());
        Ok(bs58::encode(signature.to_bytes()).into_string())
    }
}

/// Stands in when no seed was given. Commands that never reach a full
/// authentication (sign-out, or a refresh from a stored token) still work.
pub struct MissingSeed;

#[async_trait]
impl Signer for MissingSeed {
    async fn sign_challenge(&self, _challenge: &Challenge) -> Result<String, SignerError> {
        Err(SignerError(
            "a signing seed is required (--seed or KEYWARD_SEED)".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    #[test]
    fn seed_round_trips() {
        let signer = LocalKeySigner::generate();
        let restored = LocalKeySigner::from_seed_base58(&signer.seed_base58()).unwrap();
        assert_eq!(signer.public_key_multibase(), restored.public_key_multibase());
    }

    #[test]
    fn short_seed_is_rejected() {
        let short = bs58::encode([7u8; 16]).into_string();
        let err = LocalKeySigner::from_seed_base58(&short).err().unwrap();
        assert!(err.contains("32 bytes"), "got: {err}");
    }

    #[test]
    fn public_key_has_ed25519_multicodec_prefix() {
        assert!(LocalKeySigner::generate().public_key_multibase().starts_with("z6Mk"));
    }

    #[tokio::test]
    async fn missing_seed_fails_only_when_asked_to_sign() {
        let challenge = Challenge {
            id: "ch1".into(),
            payload: "prove it".into(),
        };
        let err = MissingSeed.sign_challenge(&challenge).await.unwrap_err();
        assert!(err.0.contains("KEYWARD_SEED"), "got: {err}");
    }

    #[tokio::test]
    async fn signature_verifies_over_payload() {
        let signer = LocalKeySigner::generate();
        let challenge = Challenge {
            id: "ch1".into(),
            payload: "prove it".into(),
        };
        let encoded = signer.sign_challenge(&challenge).await.unwrap();

        let bytes: [u8; 64] = bs58::decode(encoded).into_vec().unwrap().try_into().unwrap();
        let signature = Signature::from_bytes(&bytes);
        signer
            .signing_key
            .verifying_key()
            .verify(b"prove it", &signature)
            .unwrap();
    }
}
