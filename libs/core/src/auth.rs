//! Credential and token shapes produced by the authentication manager.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AuthScheme;

/// The kind of bearer material a token carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    Id,
    ApiKey,
    Session,
    Custom,
}

/// A single credential value with its lifecycle metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    /// The refresh token this token was minted from, if any.
    pub parent_refresh_token: Option<String>,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Credentials held for one connector. Produced by `authenticate`, mutated
/// only by `refresh`, destroyed by `revoke`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCredentials {
    pub scheme: AuthScheme,
    pub config: HashMap<String, serde_json::Value>,
    pub tokens: HashMap<TokenKind, Token>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthCredentials {
    pub fn new(scheme: AuthScheme, config: HashMap<String, serde_json::Value>) -> Self {
        Self { scheme, config, tokens: HashMap::new(), expires_at: None }
    }

    pub fn token(&self, kind: TokenKind) -> Option<&Token> {
        self.tokens.get(&kind)
    }

    pub fn set_token(&mut self, token: Token) {
        self.tokens.insert(token.kind, token);
    }

    /// `is_valid` is false if the top-level expiry or any owned token's
    /// expiry is in the past.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.expires_at.is_some_and(|exp| exp <= now) {
            return false;
        }
        !self.tokens.values().any(|t| t.is_expired(now))
    }
}
