//! # Connector Factory
//!
//! Turns a [`Template`] plus caller overrides into a live
//! [`connector_adapters::ConnectorRuntime`], and tracks every runtime it has
//! created so it can tear them down, bulk-create a fleet from a roster, or
//! sweep the fleet for a health snapshot.

#![warn(missing_docs)]

mod template;

pub use template::Template;

use std::collections::HashMap;
use std::sync::Arc;

use connector_adapters::{AuthenticationManager, CircuitBreakerConfig, ConnectorRuntime, RateLimiter};
use connector_core::{ConnectorConfig, ConnectorError, HealthStatus, Result};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, instrument, warn};

/// Caller-supplied overrides merged onto a template's defaults.
#[derive(Debug, Clone, Default)]
pub struct ConnectorOverrides {
    pub base_url: Option<String>,
    pub auth_config: HashMap<String, Value>,
    pub custom_settings: HashMap<String, Value>,
    pub name: Option<String>,
}

/// Builds and owns every connector runtime created from its registered
/// templates.
pub struct ConnectorFactory {
    templates: RwLock<HashMap<String, Template>>,
    runtimes: RwLock<HashMap<String, Arc<ConnectorRuntime>>>,
    auth: Arc<AuthenticationManager>,
    rate_limiter: Arc<RateLimiter>,
    breaker_config: CircuitBreakerConfig,
}

impl ConnectorFactory {
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            runtimes: RwLock::new(HashMap::new()),
            auth: Arc::new(AuthenticationManager::default()),
            rate_limiter: Arc::new(RateLimiter::new()),
            breaker_config,
        }
    }

    pub fn register_template(&self, template: Template) {
        self.templates.write().insert(template.template_id.clone(), template);
    }

    pub fn template(&self, template_id: &str) -> Option<Template> {
        self.templates.read().get(template_id).cloned()
    }

    /// Build a `ConnectorConfig` from a template and overrides without
    /// creating a runtime. Used by callers that want to inspect or persist
    /// the resolved config before connecting.
    pub fn create_connector_config(
        &self,
        template_id: &str,
        connector_id: &str,
        overrides: ConnectorOverrides,
    ) -> Result<ConnectorConfig> {
        let template = self
            .templates
            .read()
            .get(template_id)
            .cloned()
            .ok_or_else(|| ConnectorError::Config(format!("unknown template `{template_id}`")))?;

        let base_url = overrides
            .base_url
            .or(template.default_base_url.clone())
            .ok_or_else(|| ConnectorError::Config(format!("template `{template_id}` has no default base_url and none was provided")))?;

        let mut auth_config = template.default_auth_config.clone();
        auth_config.extend(overrides.auth_config.clone());

        for field in &template.required_auth_fields {
            if !auth_config.contains_key(field) {
                return Err(ConnectorError::Config(format!(
                    "template `{template_id}` requires auth field `{field}` which was not provided"
                )));
            }
        }

        let mut custom_settings = HashMap::new();
        custom_settings.extend(overrides.custom_settings);

        let mut metadata = HashMap::new();
        metadata.insert("template_id".to_string(), template.template_id.clone());
        metadata.insert("template_name".to_string(), template.name.clone());

        Ok(ConnectorConfig {
            connector_id: connector_id.to_string(),
            name: overrides.name.unwrap_or_else(|| template.name.clone()),
            kind: template.kind,
            protocol: template.protocol,
            auth_scheme: template.auth_scheme,
            base_url,
            endpoints: template.default_endpoints.clone(),
            default_headers: template.default_headers.clone(),
            auth_config,
            connect_timeout_ms: template.default_connect_timeout_ms,
            request_timeout_ms: template.default_request_timeout_ms,
            retry_policy: template.default_retry_policy.clone(),
            rate_limit: template.default_rate_limit,
            batch_size: template.default_batch_size,
            ssl_verify: template.default_ssl_verify,
            data_format: template.data_format,
            custom_settings,
            metadata,
        })
    }

    /// Build a config, construct and initialize a runtime, and register it
    /// under `connector_id`. Replaces any existing runtime with that id
    /// after disconnecting it.
    #[instrument(skip(self, overrides), fields(%template_id, %connector_id))]
    pub async fn create_connector(
        &self,
        template_id: &str,
        connector_id: &str,
        overrides: ConnectorOverrides,
    ) -> Result<Arc<ConnectorRuntime>> {
        if let Some(existing) = self.runtimes.write().remove(connector_id) {
            warn!("replacing existing connector runtime");
            let _ = existing.disconnect().await;
        }

        let config = self.create_connector_config(template_id, connector_id, overrides)?;
        let runtime = Arc::new(ConnectorRuntime::new(config, self.auth.clone(), self.rate_limiter.clone(), self.breaker_config.clone()));
        runtime.initialize().await?;

        self.runtimes.write().insert(connector_id.to_string(), runtime.clone());
        info!("connector created");
        Ok(runtime)
    }

    pub fn connector(&self, connector_id: &str) -> Option<Arc<ConnectorRuntime>> {
        self.runtimes.read().get(connector_id).cloned()
    }

    /// Disconnect and remove a connector runtime.
    pub async fn destroy_connector(&self, connector_id: &str) -> Result<()> {
        let runtime = self.runtimes.write().remove(connector_id);
        match runtime {
            Some(runtime) => {
                runtime.disconnect().await?;
                info!(connector_id, "connector destroyed");
                Ok(())
            }
            None => Err(ConnectorError::Config(format!("no connector registered under `{connector_id}`"))),
        }
    }

    /// Create several connectors; a single failure does not abort the rest.
    /// Returned in the same order as `requests`.
    pub async fn bulk_create(
        &self,
        requests: Vec<(String, String, ConnectorOverrides)>,
    ) -> Vec<Result<Arc<ConnectorRuntime>>> {
        let mut results = Vec::with_capacity(requests.len());
        for (template_id, connector_id, overrides) in requests {
            results.push(self.create_connector(&template_id, &connector_id, overrides).await);
        }
        results
    }

    /// Poll `test_connection` and the breaker-derived health for every
    /// registered runtime.
    pub async fn health_check_all(&self) -> HashMap<String, HealthStatus> {
        let runtimes: Vec<(String, Arc<ConnectorRuntime>)> =
            self.runtimes.read().iter().map(|(id, r)| (id.clone(), r.clone())).collect();
        let mut statuses = HashMap::with_capacity(runtimes.len());
        for (connector_id, runtime) in runtimes {
            statuses.insert(connector_id, runtime.health());
        }
        statuses
    }

    /// Exercise one connector's wire path directly, bypassing rate limiting
    /// and the breaker.
    pub async fn test_connection(&self, connector_id: &str) -> Result<()> {
        let runtime = self
            .runtimes
            .read()
            .get(connector_id)
            .cloned()
            .ok_or_else(|| ConnectorError::Config(format!("no connector registered under `{connector_id}`")))?;
        runtime.test_connection().await
    }

    pub fn registered_connector_ids(&self) -> Vec<String> {
        self.runtimes.read().keys().cloned().collect()
    }
}

impl Default for ConnectorFactory {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{AuthScheme, ConnectorKind, Protocol};

    fn rest_template() -> Template {
        let mut template = Template::new("test-rest", "Test REST", ConnectorKind::Erp, Protocol::Rest, AuthScheme::None);
        template.default_base_url = Some("https://example.invalid".to_string());
        template
    }

    #[test]
    fn resolves_config_from_template_and_overrides() {
        let factory = ConnectorFactory::default();
        factory.register_template(rest_template());

        let config = factory
            .create_connector_config("test-rest", "acme-erp", ConnectorOverrides::default())
            .expect("template resolves");
        assert_eq!(config.connector_id, "acme-erp");
        assert_eq!(config.base_url, "https://example.invalid");
    }

    #[test]
    fn missing_required_auth_field_is_rejected() {
        let factory = ConnectorFactory::default();
        let mut template = rest_template();
        template.auth_scheme = AuthScheme::ApiKey;
        template.required_auth_fields = vec!["api_key".to_string()];
        factory.register_template(template);

        let result = factory.create_connector_config("test-rest", "acme-erp", ConnectorOverrides::default());
        assert!(result.is_err());
    }

    #[test]
    fn unknown_template_is_rejected() {
        let factory = ConnectorFactory::default();
        let result = factory.create_connector_config("does-not-exist", "acme-erp", ConnectorOverrides::default());
        assert!(result.is_err());
    }
}
