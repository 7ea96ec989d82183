use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair. The two are only ever stored together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

// Tokens stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// `exp` claim of a JWT, if the token is one. Signatures are not checked.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn access_expires_at(&self) -> Option<DateTime<Utc>> {
        jwt_expiry(&self.access_token)
    }

    pub fn refresh_expires_at(&self) -> Option<DateTime<Utc>> {
        jwt_expiry(&self.refresh_token)
    }

    /// True when the pair can no longer be renewed: the refresh token is a
    /// JWT whose expiry has passed. Opaque tokens never look expired; the
    /// server is the only judge of those.
    pub fn looks_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() || self.refresh_token.is_empty() {
            return true;
        }
        self.refresh_expires_at()
            .map(|exp| exp <= now)
            .unwrap_or(false)
    }

    pub fn looks_expired(&self) -> bool {
        self.looks_expired_at(Utc::now())
    }
}
