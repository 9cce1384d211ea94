//! Bearer token check for relay requests

use base64::Engine;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Random bytes behind a generated token
const TOKEN_BYTES: usize = 24;

/// Shared secret every relay request must carry
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Fresh random token, URL-safe base64 without padding
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Constant-time comparison; a missing token never matches
    pub fn verify(&self, presented: Option<&str>) -> bool {
        match presented {
            Some(presented) => self.token.as_bytes().ct_eq(presented.as_bytes()).into(),
            None => false,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").finish_non_exhaustive()
    }
}
