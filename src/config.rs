pub mod fleet;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use fleet::FleetConfig;

/// Process-level configuration: everything the service needs before the
/// fleet document is loaded. Sourced from an optional local file plus
/// `STEWARD__`-prefixed environment variables, the latter winning.
#[derive(Debug, Clone, Deserialize)]
pub struct StewardConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub fleet_config_path: Option<String>,
    pub identity: IdentityConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen_host")]
    pub host: String,
    #[serde(default = "default_listen_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_listen_host(),
            port: default_listen_port(),
        }
    }
}

/// Client-credentials identity used against the control plane. The secret is
/// expected to arrive via the environment, never the fleet document.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_api_base")]
    pub api_base: String,
    pub bot_token: String,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_listen_port() -> u16 {
    3000
}

fn default_token_endpoint() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_scope() -> String {
    "https://management.azure.com/.default".to_string()
}

fn default_chat_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

impl StewardConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("STEWARD").separator("__"))
            .build()?
            .try_deserialize()
    }
}
