//! Token Service
//!
//! HS256 bearer tokens carrying id, username, and role claims. Role is a
//! claim, not re-derived per request: a role change takes effect at the next
//! login. This staleness window is an accepted design decision, while
//! deletion revokes immediately because verification re-fetches the user row.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::User;
use crate::error::{ApiError, Result};

/// Token signing configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub expiry_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "campus-events-dev-secret".to_string(),
            issuer: "campus-events".to_string(),
            expiry_secs: 86_400,
        }
    }
}

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    /// Role at issuance time.
    pub role: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiry_secs: i64,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer,
            expiry_secs: config.expiry_secs,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.expiry_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ApiError::internal(format!("token signing failed: {}", e)))
    }

    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(ApiError::TokenExpired),
                _ => Err(ApiError::InvalidToken {
                    message: e.to_string(),
                }),
            },
        }
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
