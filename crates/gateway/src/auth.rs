//! Bearer token verification.
//!
//! Tokens are issued by the account service and look like
//! `<payload>.<signature>`, where `payload` is the base64url (unpadded) JSON
//! of an [`Identity`] and `signature` is the base64url HMAC-SHA256 of the
//! payload segment under the shared secret.
//!
//! No `Authorization` header means an anonymous caller. A header that is
//! present but does not verify is rejected. Without a configured secret
//! nothing can be verified, so every caller is anonymous.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use jurisflow_core::identity::Identity;
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Why a presented token was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    Malformed,
    BadSignature,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Malformed => f.write_str("malformed bearer token"),
            AuthError::BadSignature => f.write_str("invalid bearer token signature"),
        }
    }
}

/// Verifies bearer tokens against the shared secret.
#[derive(Clone, Default)]
pub struct TokenVerifier {
    secret: Option<Vec<u8>>,
}

impl TokenVerifier {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    fn mac(secret: &[u8]) -> HmacSha256 {
        HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length")
    }

    /// Sign an identity. `None` when no secret is configured.
    pub fn issue(&self, identity: &Identity) -> Option<String> {
        let secret = self.secret.as_deref()?;
        let payload = serde_json::to_vec(identity).ok()?;
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = Self::mac(secret);
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Some(format!("{payload}.{signature}"))
    }

    /// Verify an `Authorization` header value.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Option<Identity>, AuthError> {
        let Some(header) = header else {
            return Ok(None);
        };
        let Some(secret) = self.secret.as_deref() else {
            debug!("Bearer token ignored: no token secret configured");
            return Ok(None);
        };

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Malformed)?;

        let (payload, signature) = token.split_once('.').ok_or(AuthError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::Malformed)?;

        let mut mac = Self::mac(secret);
        mac.update(payload.as_bytes());
        // Constant-time comparison
        if mac.verify_slice(&signature).is_err() {
            warn!("Rejected bearer token with bad signature");
            return Err(AuthError::BadSignature);
        }

        let claims = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::Malformed)?;
        let identity: Identity =
            serde_json::from_slice(&claims).map_err(|_| AuthError::Malformed)?;
        Ok(Some(identity))
    }
}
