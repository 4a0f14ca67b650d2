//! Bearer token issuance and validation.

use covers_kernel::settings::{AuthSettings, MAX_TOKEN_TTL_HOURS};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{AuthError, AuthResult, Identity};

/// JWT claims carried by covers access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    pub username: String,
    pub email: String,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Expiration, unix seconds.
    pub exp: i64,
    pub iss: String,
    /// Token ID.
    pub jti: String,
}

impl Claims {
    /// Returns the user ID.
    pub fn user_id(&self) -> AuthResult<Uuid> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }

    /// Converts the claims into the session identity handed to services.
    pub fn identity(&self) -> AuthResult<Identity> {
        Ok(Identity {
            user_id: self.user_id()?,
            username: self.username.clone(),
        })
    }
}

/// Signs and validates access tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct TokenIssuer {
    issuer: String,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// `ttl_hours` beyond [`MAX_TOKEN_TTL_HOURS`] is capped there.
    pub fn new(secret: &str, issuer: impl Into<String>, ttl_hours: u64) -> Self {
        let ttl_hours = ttl_hours.min(MAX_TOKEN_TTL_HOURS) as i64;
        Self {
            issuer: issuer.into(),
            ttl: Duration::hours(ttl_hours),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            &settings.jwt_secret,
            settings.issuer.clone(),
            settings.token_ttl_hours,
        )
    }

    /// Issues an access token for a user.
    pub fn issue(&self, user_id: Uuid, username: &str, email: &str) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AuthError::JwtEncoding(e.to_string()))
    }

    /// Validates signature, issuer and expiry, returning the claims.
    pub fn validate(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    /// Validates `token` and returns the caller's identity.
    pub fn identify(&self, token: &str) -> AuthResult<Identity> {
        self.validate(token)?.identity()
    }

    /// Token lifetime in seconds.
    pub fn expires_in_seconds(&self) -> i64 {
        self.ttl.whole_seconds()
    }
}
