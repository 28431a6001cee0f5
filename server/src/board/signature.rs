//! Document signature verification.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Verifies a signature over raw (non-prehashed) document bytes.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, signature: &[u8], message: &[u8], public_key: &[u8]) -> bool;
}

/// Ed25519 verification, the scheme board keys are minted for.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, signature: &[u8], message: &[u8], public_key: &[u8]) -> bool {
        let Ok(pk_array) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_array) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(message, &signature).is_ok()
    }
}
