//! Signed session tokens.
//!
//! Tokens are HMAC-SHA256 based and carry the user id, the role and an
//! expiry. Format: `cl_st_<user_id>_<role>_<expires_unix>_<hmac_hex>`, with
//! the MAC computed over `<user_id>:<role>:<expires_unix>`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use coachline_db::models::PartyRole;

use super::Actor;

type HmacSha256 = Hmac<Sha256>;

/// Prefix identifying coachline session tokens.
const TOKEN_PREFIX: &str = "cl_st_";

/// Errors that can occur while issuing or validating a session token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid user ID in token: {0}")]
    InvalidUserId(String),

    #[error("invalid role in token: {0}")]
    InvalidRole(String),

    #[error("invalid expiry in token: {0}")]
    InvalidExpiry(String),

    #[error("token HMAC verification failed")]
    HmacMismatch,

    #[error("token expired")]
    Expired,

    #[error("missing token secret")]
    MissingSecret,
}

/// Secret used to sign and verify session tokens.
#[derive(Clone)]
pub struct SessionConfig {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SessionConfig {
    pub const SECRET_ENV: &str = "COACHLINE_TOKEN_SECRET";

    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    /// Decode a hex-encoded secret, as stored in the config file.
    pub fn from_hex(secret_hex: &str) -> Result<Self, TokenError> {
        if secret_hex.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        let secret = hex::decode(secret_hex)
            .map_err(|e| TokenError::InvalidFormat(format!("token secret is not valid hex: {e}")))?;
        Ok(Self::new(secret))
    }

    /// Read the hex-encoded secret from `COACHLINE_TOKEN_SECRET`.
    pub fn from_env() -> Result<Self, TokenError> {
        let secret_hex = std::env::var(Self::SECRET_ENV).map_err(|_| TokenError::MissingSecret)?;
        Self::from_hex(&secret_hex)
    }
}

/// Claims extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub role: PartyRole,
    pub expires_at: i64,
}

impl SessionClaims {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

/// Issue a session token for `user_id` acting as `role`, valid until
/// `expires_at`.
pub fn issue_token(
    config: &SessionConfig,
    user_id: Uuid,
    role: PartyRole,
    expires_at: DateTime<Utc>,
) -> String {
    let expires = expires_at.timestamp();
    let message = signing_message(user_id, role, expires);
    let hmac_hex = hex::encode(compute_hmac(&config.secret, message.as_bytes()));
    format!("{TOKEN_PREFIX}{user_id}_{role}_{expires}_{hmac_hex}")
}

/// Validate a session token at time `now` and extract its claims.
///
/// The MAC is verified in constant time before the expiry is looked at.
pub fn validate_token(
    config: &SessionConfig,
    token: &str,
    now: DateTime<Utc>,
) -> Result<SessionClaims, TokenError> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .ok_or_else(|| TokenError::InvalidFormat(format!("token must start with '{TOKEN_PREFIX}'")))?;

    let (Some(user_id_str), Some(after_user_id)) = (rest.get(..36), rest.get(36..)) else {
        return Err(TokenError::InvalidFormat(
            "token too short to contain a valid UUID".to_string(),
        ));
    };
    let user_id =
        Uuid::parse_str(user_id_str).map_err(|e| TokenError::InvalidUserId(e.to_string()))?;

    let after_underscore = after_user_id.strip_prefix('_').ok_or_else(|| {
        TokenError::InvalidFormat("expected underscore after user ID".to_string())
    })?;

    let mut parts = after_underscore.splitn(3, '_');
    let (Some(role_str), Some(expires_str), Some(hmac_hex)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::InvalidFormat(
            "expected <role>_<expiry>_<hmac> after user ID".to_string(),
        ));
    };

    let role: PartyRole = role_str
        .parse()
        .map_err(|e: coachline_db::models::ParseEnumError| TokenError::InvalidRole(e.to_string()))?;
    let expires_at: i64 = expires_str
        .parse()
        .map_err(|e: std::num::ParseIntError| TokenError::InvalidExpiry(e.to_string()))?;

    let provided_mac = hex::decode(hmac_hex)
        .map_err(|e| TokenError::InvalidFormat(format!("invalid hex in hmac: {e}")))?;

    let message = signing_message(user_id, role, expires_at);
    verify_hmac_constant_time(&config.secret, message.as_bytes(), &provided_mac)?;

    if expires_at <= now.timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(SessionClaims {
        user_id,
        role,
        expires_at,
    })
}

fn signing_message(user_id: Uuid, role: PartyRole, expires_at: i64) -> String {
    format!("{user_id}:{role}:{expires_at}")
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC can take key of any size")
}

fn compute_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn verify_hmac_constant_time(
    key: &[u8],
    message: &[u8],
    expected_mac: &[u8],
) -> Result<(), TokenError> {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.verify_slice(expected_mac)
        .map_err(|_| TokenError::HmacMismatch)
}
