//! Random identifiers for CSP nonces and CSRF token ids.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{thread_rng, RngCore};
use std::sync::Arc;

/// Length of the raw random bytes (16 bytes = 128 bits).
const NONCE_BYTES_LEN: usize = 16;

/// Generate a random opaque identifier.
///
/// URL-safe base64 without padding, so the value can sit in a header, a
/// cookie, an HTML attribute or a JSON body without escaping.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES_LEN];
    thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Request extension carrying the CSP nonce for the current request.
#[derive(Clone, Debug)]
pub struct CspNonce(pub Arc<str>);

impl CspNonce {
    pub fn new() -> Self {
        Self(Arc::from(generate_nonce()))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl Default for CspNonce {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_generation() {
        let nonce1 = generate_nonce();
        let nonce2 = generate_nonce();

        assert_ne!(nonce1, nonce2);
        assert_eq!(nonce1.len(), 22);

        let decoded = URL_SAFE_NO_PAD.decode(&nonce1).unwrap();
        assert_eq!(decoded.len(), NONCE_BYTES_LEN);
    }

    #[test]
    fn test_nonce_is_header_safe() {
        let nonce = generate_nonce();
        assert!(nonce
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
