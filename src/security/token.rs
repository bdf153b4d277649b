//! Signed bearer tokens.
//!
//! A token is `<b64(user id)>.<expiry>.<b64(mac)>` where `mac` is
//! HMAC-SHA256 over `"<user id>.<expiry>"` and base64 is the URL-safe
//! alphabet without padding, so tokens survive a query string unescaped.

use super::{AuthError, Authenticator};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenAuthority {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority").finish_non_exhaustive()
    }
}

impl TokenAuthority {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, user_id: &str, expiry: i64) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidKey)?;
        mac.update(user_id.as_bytes());
        mac.update(b".");
        mac.update(expiry.to_string().as_bytes());
        Ok(mac)
    }

    /// Issue a token for `user_id` valid for `ttl_secs` from now.
    pub fn issue(&self, user_id: &str, ttl_secs: i64) -> Result<String, AuthError> {
        self.issue_until(user_id, chrono::Utc::now().timestamp() + ttl_secs)
    }

    /// Issue a token for `user_id` that expires at `expiry` (unix seconds).
    pub fn issue_until(&self, user_id: &str, expiry: i64) -> Result<String, AuthError> {
        if user_id.is_empty() {
            return Err(AuthError::EmptyUser);
        }
        let tag = self.mac(user_id, expiry)?.finalize().into_bytes();
        Ok(format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(user_id),
            expiry,
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Verify `token` as of `now` (unix seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<String, AuthError> {
        let mut parts = token.split('.');
        let (Some(user_b64), Some(expiry), Some(tag_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed);
        };

        let user_bytes = URL_SAFE_NO_PAD
            .decode(user_b64)
            .map_err(|_| AuthError::Malformed)?;
        let user_id = String::from_utf8(user_bytes).map_err(|_| AuthError::Malformed)?;
        if user_id.is_empty() {
            return Err(AuthError::EmptyUser);
        }
        let expiry: i64 = expiry.parse().map_err(|_| AuthError::Malformed)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| AuthError::Malformed)?;

        self.mac(&user_id, expiry)?
            .verify_slice(&tag)
            .map_err(|_| AuthError::BadSignature)?;

        if expiry <= now {
            return Err(AuthError::Expired);
        }
        Ok(user_id)
    }
}

impl Authenticator for TokenAuthority {
    fn authenticate(&self, token: &str) -> Result<String, AuthError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }
}
