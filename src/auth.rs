//! Access-token verification.
//!
//! Tokens are issued by the account service; this server only checks the signature and reads the
//! username and role claims.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, header::AUTHORIZATION};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

/// Role claim carried by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Tournament director.
    Admin,
    /// Anyone else.
    #[serde(other)]
    Viewer,
}

/// Verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Account name from the token.
    pub username: String,
    /// Granted role.
    pub role: Role,
}

impl Identity {
    /// Whether the caller may drive the clock and manage tournaments.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Turns a bearer token into an [`Identity`].
pub trait TokenVerifier: Send + Sync {
    /// `None` when the token is malformed, expired or wrongly signed.
    fn verify(&self, token: &str) -> Option<Identity>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    username: String,
    #[serde(default = "viewer")]
    role: Role,
    exp: u64,
}

fn viewer() -> Role {
    Role::Viewer
}

/// HS256 token verifier sharing its secret with the issuer.
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Verifier for tokens signed with `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign a token for `username` valid for `ttl`.
    pub fn issue(
        &self,
        username: &str,
        role: Role,
        ttl: Duration,
    ) -> jsonwebtoken::errors::Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let claims = Claims {
            username: username.to_owned(),
            role,
            exp: (now + ttl).as_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Option<Identity> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) if !data.claims.username.is_empty() => Some(Identity {
                username: data.claims.username,
                role: data.claims.role,
            }),
            Ok(_) => None,
            Err(err) => {
                debug!(error = %err, "rejected access token");
                None
            }
        }
    }
}

/// Token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
