use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

/// Derives the internal identifiers the stores are keyed by.
///
/// `entity_id` is a keyed hash of the email: deterministic and
/// recomputable, an index-key obfuscator rather than a secret. Session
/// tokens are not derived from anything; each grant draws fresh OS
/// randomness.
#[derive(Clone)]
pub struct TokenCodec {
    key: Arc<[u8]>,
}

impl TokenCodec {
    const TOKEN_BYTES: usize = 32;

    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { key: Arc::from(secret.as_ref()) }
    }

    /// Hex HMAC-SHA256 of the email under the configured secret.
    pub fn entity_id(&self, email: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .expect("hmac accepts keys of any length");
        mac.update(email.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Opaque session token: 32 bytes of OS randomness, base64url.
    pub fn issue_token(&self) -> String {
        let mut bytes = [0u8; Self::TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("key_length", &self.key.len())
            .finish_non_exhaustive()
    }
}
