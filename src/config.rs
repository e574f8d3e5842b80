use config::{Environment, File};
use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    pub host: String,
    pub port: u16,
}

/// Azure AD application and SharePoint site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// SharePoint site whose drives the service exposes.
    pub site_id: String,
    /// Alternate Graph endpoint (tests, sovereign clouds).
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Path to the JSON policy document, re-read on every write check.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub log: LogConfig,
    pub rest: RestConfig,
    pub graph: GraphConfig,
    pub policy: PolicyConfig,
    /// Single API key registered as the 'environment' principal.
    pub api_key: Option<String>,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut config_builder = config::Config::builder()
            // Log defaults
            .set_default("log.level", "info")?
            // REST defaults
            .set_default("rest.host", "127.0.0.1")?
            .set_default("rest.port", 8080)?
            // Graph defaults
            .set_default("graph.tenant_id", "common")?
            .set_default("graph.client_id", "")?
            .set_default("graph.client_secret", "")?
            .set_default("graph.site_id", "root")?
            // Policy defaults
            .set_default("policy.path", "policy.json")?;

        // Add configuration from file
        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        // Add environment variables with prefix
        // e.g. `RUSTYSHEETS_LOG_LEVEL=...` would override `log.level`
        config_builder = config_builder.add_source(
            Environment::with_prefix("RUSTYSHEETS")
                .separator("_")
                .ignore_empty(true),
        );

        // Add direct environment variables for important settings
        let env_vars = [
            ("GRAPH_TENANT_ID", "graph.tenant_id"),
            ("GRAPH_CLIENT_ID", "graph.client_id"),
            ("GRAPH_CLIENT_SECRET", "graph.client_secret"),
            ("GRAPH_SITE_ID", "graph.site_id"),
            ("GRAPH_BASE_URL", "graph.base_url"),
            ("POLICY_PATH", "policy.path"),
            ("REST_HOST", "rest.host"),
            ("REST_PORT", "rest.port"),
            ("LOG_LEVEL", "log.level"),
            ("RUSTYSHEETS_API_KEY", "api_key"),
        ];

        for (env_var, config_path) in &env_vars {
            if let Ok(value) = env::var(env_var) {
                if *env_var == "REST_PORT" {
                    if let Ok(port) = value.parse::<u16>() {
                        config_builder = config_builder.set_override(*config_path, port)?;
                    } else {
                        warn!("Invalid port value in {}: {}", env_var, value);
                    }
                } else {
                    config_builder = config_builder.set_override(*config_path, value)?;
                }
            }
        }

        config_builder.build()?.try_deserialize()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
        }
    }
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load or parse configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}
