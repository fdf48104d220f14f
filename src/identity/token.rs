//! Opaque bearer token codec.
//!
//! A token is `base64url(account_id || nonce || tag)` where `tag` is
//! HMAC-SHA256 over `account_id || nonce` under the process key. Decoding is a
//! pure cryptographic check: no store lookup, no shared state, so request
//! validation only needs this plus the session cache. The random nonce makes
//! every issued token distinct even for the same account, which is what lets a
//! re-login supersede the previous token.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::TokenError;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 8;
const TAG_LEN: usize = 32;

pub struct TokenCodec {
    key: Vec<u8>,
}

impl TokenCodec {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// A fresh random signing key. Sessions live only in the in-process cache,
    /// so a key that does not survive restart loses nothing the cache does not
    /// lose anyway.
    pub fn random_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        let _ = getrandom::getrandom(&mut key);
        key
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.key).expect("hmac key")
    }

    /// Issue a fresh token bound to `account_id`. Distinct calls produce
    /// distinct token values; each decodes back to the same identifier.
    pub fn issue(&self, account_id: &str) -> String {
        let mut nonce = [0u8; NONCE_LEN];
        let _ = getrandom::getrandom(&mut nonce);
        let mut mac = self.mac();
        mac.update(account_id.as_bytes());
        mac.update(&nonce);
        let tag = mac.finalize().into_bytes();

        let mut raw = Vec::with_capacity(account_id.len() + NONCE_LEN + TAG_LEN);
        raw.extend_from_slice(account_id.as_bytes());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&tag);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw)
    }

    /// Recover the account identifier from a presented token. Any structural
    /// or signature problem is `Malformed`; callers must still check the
    /// session cache for liveness.
    pub fn decode(&self, token: &str) -> Result<String, TokenError> {
        let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| TokenError::Malformed)?;
        if raw.len() <= NONCE_LEN + TAG_LEN {
            return Err(TokenError::Malformed);
        }
        let (body, tag) = raw.split_at(raw.len() - TAG_LEN);
        let (id_bytes, nonce) = body.split_at(body.len() - NONCE_LEN);

        let mut mac = self.mac();
        mac.update(id_bytes);
        mac.update(nonce);
        mac.verify_slice(tag).map_err(|_| TokenError::Malformed)?;

        String::from_utf8(id_bytes.to_vec()).map_err(|_| TokenError::Malformed)
    }
}
