/// Signed session tokens (HS256 JWT).
///
/// A token carries the user id as `sub` plus `iss`, `iat`, `nbf` and an
/// absolute `exp`. Decoding is all-or-nothing: a bad signature, a malformed
/// payload, a wrong issuer and an elapsed expiry all collapse into
/// [`JwtError::InvalidToken`], so callers cannot tell an expired token from a
/// forged one. The precise cause is logged at debug level.
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use crm_shared::auth::jwt::TokenSettings;
///
/// let settings = TokenSettings::new("a-secret-key-of-at-least-32-bytes!!", "crm", Duration::minutes(30));
/// let token = settings.issue(42).unwrap();
/// let claims = settings.decode(&token).unwrap();
/// assert_eq!(claims.sub, 42);
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    Create(String),

    #[error("Could not validate credentials")]
    InvalidToken,
}

/// Registered claims embedded in every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    /// Issuer
    pub iss: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Not before (unix seconds)
    pub nbf: i64,
}

impl Claims {
    /// Claims for `user_id` valid from now for `ttl`.
    pub fn new(user_id: i64, issuer: &str, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: issuer.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            nbf: now.timestamp(),
        }
    }
}

/// Signs `claims` with the HS256 `secret`.
pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::Create(e.to_string()))
}

/// Verifies signature, issuer, `nbf` and `exp` with no leeway and returns the claims.
pub fn decode_token(token: &str, secret: &str, issuer: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    // jsonwebtoken only recognises a string `sub` as present; the numeric
    // subject is enforced by deserializing into `Claims` instead.
    validation.set_required_spec_claims(&["exp", "iss"]);
    validation.validate_nbf = true;
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(reason = ?e.kind(), "Rejected session token");
            JwtError::InvalidToken
        })
}

/// Secret, issuer and lifetime bundled for the request path.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    secret: String,
    issuer: String,
    ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues an access token for `user_id`.
    pub fn issue(&self, user_id: i64) -> Result<String, JwtError> {
        issue_token(&Claims::new(user_id, &self.issuer, self.ttl), &self.secret)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        decode_token(token, &self.secret, &self.issuer)
    }
}
