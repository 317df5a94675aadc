//! Authentication manager: one handler per [`AuthScheme`], applied
//! uniformly across protocols. Grounded on the old venue `AuthProvider` /
//! `ApiKeyAuth` / `OAuth2Auth` split, generalized from two schemes to the
//! full table and from per-venue storage to a shared credentials registry.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use connector_core::{AuthCredentials, AuthScheme, ConnectorConfig, ConnectorError, Result, Token, TokenKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Minimal claim set issued and verified for the `Jwt` scheme. Connectors
/// needing more claims pass them through `ConnectorConfig::auth_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Holds one [`AuthCredentials`] per connector and knows how to mint, apply
/// and refresh credentials for every scheme in the table.
pub struct AuthenticationManager {
    credentials: RwLock<HashMap<String, AuthCredentials>>,
    http: reqwest::Client,
}

impl AuthenticationManager {
    pub fn new(http: reqwest::Client) -> Self {
        Self { credentials: RwLock::new(HashMap::new()), http }
    }

    /// Produce and store credentials for a connector per its configured
    /// scheme. A `None` scheme stores an empty credential set so `apply`
    /// has nothing to do.
    pub async fn authenticate(&self, config: &ConnectorConfig) -> Result<()> {
        let creds = match config.auth_scheme {
            AuthScheme::None => AuthCredentials::new(AuthScheme::None, config.auth_config.clone()),
            AuthScheme::Basic => self.authenticate_basic(config)?,
            AuthScheme::ApiKey => self.authenticate_api_key(config)?,
            AuthScheme::OAuth2 => self.authenticate_oauth2(config).await?,
            AuthScheme::Jwt => self.authenticate_jwt(config)?,
            AuthScheme::Saml => self.authenticate_saml(config)?,
            AuthScheme::CustomToken => self.authenticate_custom_token(config)?,
        };
        self.credentials.write().insert(config.connector_id.clone(), creds);
        Ok(())
    }

    fn authenticate_basic(&self, config: &ConnectorConfig) -> Result<AuthCredentials> {
        let username = config.auth_str("username").ok_or_else(|| {
            ConnectorError::Auth { connector_id: config.connector_id.clone(), reason: "missing username".into() }
        })?;
        let password = config.auth_str("password").unwrap_or_default();
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        let mut creds = AuthCredentials::new(AuthScheme::Basic, config.auth_config.clone());
        creds.set_token(Token {
            kind: TokenKind::Session,
            value: encoded,
            issued_at: Utc::now(),
            expires_at: None,
            scope: None,
            parent_refresh_token: None,
        });
        Ok(creds)
    }

    fn authenticate_api_key(&self, config: &ConnectorConfig) -> Result<AuthCredentials> {
        let key = config.auth_str("api_key").ok_or_else(|| ConnectorError::Auth {
            connector_id: config.connector_id.clone(),
            reason: "missing api_key".into(),
        })?;
        let mut creds = AuthCredentials::new(AuthScheme::ApiKey, config.auth_config.clone());
        creds.set_token(Token {
            kind: TokenKind::ApiKey,
            value: key.to_string(),
            issued_at: Utc::now(),
            expires_at: None,
            scope: None,
            parent_refresh_token: None,
        });
        Ok(creds)
    }

    async fn authenticate_oauth2(&self, config: &ConnectorConfig) -> Result<AuthCredentials> {
        let token_url = config.auth_str("token_url").ok_or_else(|| ConnectorError::Auth {
            connector_id: config.connector_id.clone(),
            reason: "missing token_url".into(),
        })?;
        let client_id = config.auth_str("client_id").unwrap_or_default();
        let client_secret = config.auth_str("client_secret").unwrap_or_default();

        let grant_type = config.auth_str("grant_type").unwrap_or("client_credentials");
        let mut form = vec![
            ("grant_type", grant_type.to_string()),
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.to_string()),
        ];
        if grant_type == "authorization_code" {
            if let Some(code) = config.auth_str("code") {
                form.push(("code", code.to_string()));
            }
        }

        let response = self.http.post(token_url).form(&form).send().await.map_err(|e| {
            ConnectorError::Auth { connector_id: config.connector_id.clone(), reason: e.to_string() }
        })?;
        if !response.status().is_success() {
            return Err(ConnectorError::Auth {
                connector_id: config.connector_id.clone(),
                reason: format!("token endpoint returned {}", response.status()),
            });
        }
        let body: serde_json::Value = response.json().await.map_err(|e| ConnectorError::Auth {
            connector_id: config.connector_id.clone(),
            reason: e.to_string(),
        })?;

        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConnectorError::Auth {
                connector_id: config.connector_id.clone(),
                reason: "token response missing access_token".into(),
            })?
            .to_string();
        let expires_in = body.get("expires_in").and_then(|v| v.as_i64()).unwrap_or(3600);
        let refresh_token = body.get("refresh_token").and_then(|v| v.as_str()).map(str::to_string);

        let mut creds = AuthCredentials::new(AuthScheme::OAuth2, config.auth_config.clone());
        let now = Utc::now();
        creds.set_token(Token {
            kind: TokenKind::Access,
            value: access_token,
            issued_at: now,
            expires_at: Some(now + ChronoDuration::seconds(expires_in)),
            scope: body.get("scope").and_then(|v| v.as_str()).map(str::to_string),
            parent_refresh_token: None,
        });
        if let Some(refresh) = refresh_token {
            creds.set_token(Token {
                kind: TokenKind::Refresh,
                value: refresh,
                issued_at: now,
                expires_at: None,
                scope: None,
                parent_refresh_token: None,
            });
        }
        Ok(creds)
    }

    fn authenticate_jwt(&self, config: &ConnectorConfig) -> Result<AuthCredentials> {
        let secret = config.auth_str("jwt_secret").ok_or_else(|| ConnectorError::Auth {
            connector_id: config.connector_id.clone(),
            reason: "missing jwt_secret".into(),
        })?;
        let subject = config.auth_str("jwt_subject").unwrap_or(&config.connector_id);
        let ttl_secs = config
            .auth_config
            .get("jwt_ttl_seconds")
            .and_then(|v| v.as_i64())
            .unwrap_or(3600);

        let now = Utc::now();
        let claims = Claims { sub: subject.to_string(), iat: now.timestamp(), exp: (now + ChronoDuration::seconds(ttl_secs)).timestamp() };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| ConnectorError::Auth { connector_id: config.connector_id.clone(), reason: e.to_string() })?;

        let mut creds = AuthCredentials::new(AuthScheme::Jwt, config.auth_config.clone());
        creds.set_token(Token {
            kind: TokenKind::Access,
            value: token,
            issued_at: now,
            expires_at: Some(now + ChronoDuration::seconds(ttl_secs)),
            scope: None,
            parent_refresh_token: None,
        });
        Ok(creds)
    }

    /// Open question #1: a JWT that fails to decode is treated as an
    /// authentication failure rather than accepted opaquely, matching how
    /// every other scheme in this table reports a rejected credential. See
    /// DESIGN.md.
    pub fn verify_jwt(&self, secret: &str, token: &str) -> Result<()> {
        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::new(Algorithm::HS256))
            .map(|_| ())
            .map_err(|e| ConnectorError::Auth { connector_id: "jwt".into(), reason: e.to_string() })
    }

    /// SAML here is a passthrough: the connector framework does not run an
    /// identity provider, it stores an assertion handed to it out of band
    /// and forwards it as-is.
    fn authenticate_saml(&self, config: &ConnectorConfig) -> Result<AuthCredentials> {
        let assertion = config.auth_str("saml_assertion").ok_or_else(|| ConnectorError::Auth {
            connector_id: config.connector_id.clone(),
            reason: "missing saml_assertion".into(),
        })?;
        let mut creds = AuthCredentials::new(AuthScheme::Saml, config.auth_config.clone());
        creds.set_token(Token {
            kind: TokenKind::Session,
            value: assertion.to_string(),
            issued_at: Utc::now(),
            expires_at: None,
            scope: None,
            parent_refresh_token: None,
        });
        Ok(creds)
    }

    fn authenticate_custom_token(&self, config: &ConnectorConfig) -> Result<AuthCredentials> {
        let token = config.auth_str("custom_token").ok_or_else(|| ConnectorError::Auth {
            connector_id: config.connector_id.clone(),
            reason: "missing custom_token".into(),
        })?;
        let header_name = config.auth_str("custom_token_header").unwrap_or("Authorization").to_string();
        let prefix = config.auth_str("custom_token_prefix").unwrap_or("Bearer").to_string();
        let mut creds = AuthCredentials::new(AuthScheme::CustomToken, config.auth_config.clone());
        creds.config.insert("header_name".to_string(), serde_json::Value::String(header_name));
        creds.config.insert("prefix".to_string(), serde_json::Value::String(prefix));
        creds.set_token(Token {
            kind: TokenKind::Custom,
            value: token.to_string(),
            issued_at: Utc::now(),
            expires_at: None,
            scope: None,
            parent_refresh_token: None,
        });
        Ok(creds)
    }

    /// Refresh a connector's credentials. Only `OAuth2` refreshes with a
    /// stored refresh token; every other scheme re-authenticates from
    /// scratch since its credential never expires on its own.
    pub async fn refresh(&self, config: &ConnectorConfig) -> Result<()> {
        let has_refresh_token = self
            .credentials
            .read()
            .get(&config.connector_id)
            .and_then(|c| c.token(TokenKind::Refresh))
            .is_some();

        if config.auth_scheme == AuthScheme::OAuth2 && has_refresh_token {
            let refresh_token = self
                .credentials
                .read()
                .get(&config.connector_id)
                .and_then(|c| c.token(TokenKind::Refresh))
                .map(|t| t.value.clone())
                .expect("checked above");
            let token_url = config.auth_str("token_url").ok_or_else(|| ConnectorError::Auth {
                connector_id: config.connector_id.clone(),
                reason: "missing token_url".into(),
            })?;
            let client_id = config.auth_str("client_id").unwrap_or_default();
            let client_secret = config.auth_str("client_secret").unwrap_or_default();
            let form = [
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ];
            let response = self.http.post(token_url).form(&form).send().await.map_err(|e| {
                ConnectorError::Auth { connector_id: config.connector_id.clone(), reason: e.to_string() }
            })?;
            let body: serde_json::Value = response.json().await.map_err(|e| ConnectorError::Auth {
                connector_id: config.connector_id.clone(),
                reason: e.to_string(),
            })?;
            let access_token = body
                .get("access_token")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ConnectorError::Auth {
                    connector_id: config.connector_id.clone(),
                    reason: "refresh response missing access_token".into(),
                })?
                .to_string();
            let expires_in = body.get("expires_in").and_then(|v| v.as_i64()).unwrap_or(3600);
            let now = Utc::now();
            let mut guard = self.credentials.write();
            if let Some(creds) = guard.get_mut(&config.connector_id) {
                creds.set_token(Token {
                    kind: TokenKind::Access,
                    value: access_token,
                    issued_at: now,
                    expires_at: Some(now + ChronoDuration::seconds(expires_in)),
                    scope: None,
                    parent_refresh_token: Some(refresh_token),
                });
            }
            debug!(connector_id = %config.connector_id, "refreshed oauth2 access token");
            Ok(())
        } else {
            self.authenticate(config).await
        }
    }

    /// Apply stored credentials to an outgoing request's headers, mutating
    /// `headers` in place. No-op for `AuthScheme::None` or a connector with
    /// no stored credentials.
    pub fn apply(&self, connector_id: &str, headers: &mut HashMap<String, String>) -> Result<()> {
        let guard = self.credentials.read();
        let creds = match guard.get(connector_id) {
            Some(c) => c,
            None => return Ok(()),
        };
        match creds.scheme {
            AuthScheme::None => {}
            AuthScheme::Basic => {
                if let Some(token) = creds.token(TokenKind::Session) {
                    headers.insert("Authorization".to_string(), format!("Basic {}", token.value));
                }
            }
            AuthScheme::ApiKey => {
                if let Some(token) = creds.token(TokenKind::ApiKey) {
                    let header_name = creds
                        .config
                        .get("api_key_header")
                        .and_then(|v| v.as_str())
                        .unwrap_or("X-API-Key");
                    headers.insert(header_name.to_string(), token.value.clone());
                }
            }
            AuthScheme::OAuth2 | AuthScheme::Jwt => {
                if let Some(token) = creds.token(TokenKind::Access) {
                    headers.insert("Authorization".to_string(), format!("Bearer {}", token.value));
                }
            }
            AuthScheme::Saml => {
                if let Some(token) = creds.token(TokenKind::Session) {
                    headers.insert("Authorization".to_string(), format!("SAML {}", token.value));
                }
            }
            AuthScheme::CustomToken => {
                if let Some(token) = creds.token(TokenKind::Custom) {
                    let header_name =
                        creds.config.get("header_name").and_then(|v| v.as_str()).unwrap_or("Authorization");
                    let prefix = creds.config.get("prefix").and_then(|v| v.as_str()).unwrap_or("Bearer");
                    headers.insert(header_name.to_string(), format!("{prefix} {}", token.value));
                }
            }
        }
        Ok(())
    }

    /// Whether stored credentials for a connector are present and unexpired.
    pub fn is_valid(&self, connector_id: &str) -> bool {
        self.credentials.read().get(connector_id).is_some_and(|c| c.is_valid(Utc::now()))
    }

    pub fn revoke(&self, connector_id: &str) {
        if self.credentials.write().remove(connector_id).is_some() {
            warn!(connector_id, "revoked stored credentials");
        }
    }
}

impl Default for AuthenticationManager {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

/// Convenience constructor used by the factory when it doesn't need to share
/// an `http::Client` with the manager.
pub fn shared_default() -> Arc<AuthenticationManager> {
    Arc::new(AuthenticationManager::default())
}
