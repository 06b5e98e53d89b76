use crate::errors::Result;
use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Lifetime baked into the token claims. The refresh max-age is a separate,
/// configurable knob and must not exceed this.
const TOKEN_LIFETIME_MINUTES: i64 = 60;

/// Supported signing algorithms. Which one applies is a configuration
/// choice; both sign the same claims set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256 (RS256)
    Rs256,
    /// ECDSA P-256 with SHA-256 (ES256)
    Es256,
}

impl Algorithm {
    fn header(&self) -> Header {
        match self {
            Algorithm::Rs256 => Header::new(jsonwebtoken::Algorithm::RS256),
            Algorithm::Es256 => Header::new(jsonwebtoken::Algorithm::ES256),
        }
    }

    fn encoding_key(&self, pem: &[u8]) -> Result<EncodingKey> {
        let key = match self {
            Algorithm::Rs256 => EncodingKey::from_rsa_pem(pem)?,
            Algorithm::Es256 => EncodingKey::from_ec_pem(pem)?,
        };
        Ok(key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iat: i64,
    exp: i64,
    aud: String,
}

/// A signed credential plus the bookkeeping needed to know when to replace
/// it. Never refreshed in place; a stale token is replaced wholesale.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub algorithm: Algorithm,
}

impl AuthToken {
    pub fn is_stale(&self, max_age_minutes: i64) -> bool {
        let elapsed = Utc::now().signed_duration_since(self.issued_at);
        elapsed.num_seconds() > max_age_minutes * 60
    }
}

/// Reads a private key and mints a fresh signed token with
/// issued-at = now, expiry = now + 60 minutes, audience = `audience`.
/// An unreadable key file or bad key material is a startup-class error.
pub fn issue(audience: &str, key_file: &Path, algorithm: Algorithm) -> Result<AuthToken> {
    let pem = std::fs::read(key_file)?;
    let key = algorithm.encoding_key(&pem)?;

    let issued_at = Utc::now();
    let claims = Claims {
        iat: issued_at.timestamp(),
        exp: (issued_at + Duration::minutes(TOKEN_LIFETIME_MINUTES)).timestamp(),
        aud: audience.to_string(),
    };

    let token = encode(&algorithm.header(), &claims, &key)?;

    info!(
        "Created JWT for audience {} using {:?} from key file {}",
        audience,
        algorithm,
        key_file.display()
    );

    Ok(AuthToken {
        token,
        issued_at,
        algorithm,
    })
}

/// Check-then-issue, performed synchronously before every publish attempt.
/// Returns `Ok(None)` while the current token is within `max_age_minutes`,
/// otherwise mints a replacement with the same audience and key material.
pub fn refresh_if_stale(
    current: &AuthToken,
    audience: &str,
    key_file: &Path,
    max_age_minutes: i64,
) -> Result<Option<AuthToken>> {
    if !current.is_stale(max_age_minutes) {
        return Ok(None);
    }

    let elapsed = Utc::now().signed_duration_since(current.issued_at);
    info!("Refreshing JWT after {}s", elapsed.num_seconds());
    issue(audience, key_file, current.algorithm).map(Some)
}
