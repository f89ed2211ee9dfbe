//! Identity verification seam.
//!
//! Signature checking is an opaque upstream concern (a chain RPC in the
//! original deployment). The arena only needs a yes/no answer; a failed
//! verification maps to [`crate::errors::ArenaError::InvalidSignature`] and
//! performs no state change.

/// Proves that a submitted action was authored by the claimed player.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, player: &str, payload: &str, signature: &str) -> bool;
}

/// Accepts every signature. The default for local play and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SignatureVerifier for AcceptAll {
    fn verify(&self, _player: &str, _payload: &str, _signature: &str) -> bool {
        true
    }
}
