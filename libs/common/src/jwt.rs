//! JWT token provider
//!
//! This module issues and verifies the two token kinds used by the platform:
//! short-lived access tokens carried in the `token` cookie, and long-lived
//! refresh tokens persisted per user. Tokens are HS256-signed and carry a
//! typed [`Claims`] payload whose subject is the user's login.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Default access token lifetime: 15 minutes
pub const DEFAULT_ACCESS_TOKEN_EXPIRY: u64 = 15 * 60;

/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_TOKEN_EXPIRY: u64 = 7 * 24 * 60 * 60;

/// Errors raised while issuing or verifying tokens
#[derive(Debug, Error)]
pub enum TokenError {
    /// The signature is valid but `exp` is in the past
    #[error("token expired")]
    Expired,

    /// Bad signature, wrong algorithm or unparseable token
    #[error("invalid token: {0}")]
    Invalid(String),

    /// The payload decoded but required claims are missing or mistyped
    #[error("malformed token claims: {0}")]
    Malformed(String),

    /// Signing failed
    #[error("failed to encode token: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::Json(inner) => TokenError::Malformed(inner.to_string()),
            ErrorKind::MissingRequiredClaim(claim) => {
                TokenError::Malformed(format!("missing claim `{}`", claim))
            }
            _ => TokenError::Invalid(e.to_string()),
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret for HS256 signing
    pub secret: String,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Signing secret (required)
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> anyhow::Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        if secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ACCESS_TOKEN_EXPIRY);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REFRESH_TOKEN_EXPIRY);

        Ok(JwtConfig {
            secret,
            access_token_expiry,
            refresh_token_expiry,
        })
    }

    /// Configuration with default lifetimes for the given secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        JwtConfig {
            secret: secret.into(),
            access_token_expiry: DEFAULT_ACCESS_TOKEN_EXPIRY,
            refresh_token_expiry: DEFAULT_REFRESH_TOKEN_EXPIRY,
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Login of the user the token was issued to
    pub sub: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// Issues and verifies access and refresh tokens
pub trait TokenProvider: Send + Sync {
    /// Mint an access token for `login`
    fn create_access_token(&self, login: &str) -> Result<String, TokenError>;

    /// Mint a refresh token for `login`
    fn create_refresh_token(&self, login: &str) -> Result<String, TokenError>;

    /// Verify signature and expiry and decode the claims
    fn verify_token(&self, token: &str) -> Result<Claims, TokenError>;

    /// Verify the signature and decode the claims without checking expiry
    ///
    /// Used to recover who an expired access token belonged to.
    fn decode_ignoring_expiry(&self, token: &str) -> Result<Claims, TokenError>;

    /// Lifetime of newly minted access tokens
    fn access_token_ttl(&self) -> Duration;
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expired_validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // An access token past `exp` must go through refresh, not pass for 60 more seconds.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let mut expired_validation = validation.clone();
        expired_validation.validate_exp = false;

        JwtService {
            encoding_key,
            decoding_key,
            validation,
            expired_validation,
            config,
        }
    }

    /// Sign an arbitrary set of claims
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn issue(&self, login: &str, token_type: TokenType, ttl: u64) -> Result<String, TokenError> {
        let now = unix_now()?;
        let claims = Claims {
            sub: login.to_string(),
            iat: now,
            exp: now + ttl,
            token_type,
        };
        self.encode_claims(&claims)
    }

}

impl TokenProvider for JwtService {
    fn create_access_token(&self, login: &str) -> Result<String, TokenError> {
        self.issue(login, TokenType::Access, self.config.access_token_expiry)
    }

    fn create_refresh_token(&self, login: &str) -> Result<String, TokenError> {
        self.issue(login, TokenType::Refresh, self.config.refresh_token_expiry)
    }

    fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    fn decode_ignoring_expiry(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.expired_validation)?;
        Ok(token_data.claims)
    }

    fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.config.access_token_expiry)
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| TokenError::Encoding(format!("Failed to get current time: {}", e)))
}
