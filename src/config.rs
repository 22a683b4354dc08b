use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::DEFAULT_TOKEN_TTL_SECS;
use crate::client::ClientConfig;
use crate::discovery::backend::consul::DEFAULT_CONSUL_URL;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub client: ClientConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub tags: Vec<String>,
    /// 注册到注册中心的实例 ID，缺省时按 `name-address-port` 生成
    pub instance_id: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "usersvc".to_string(),
            tags: vec!["prod".to_string()],
            instance_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// 注册到注册中心的对外地址，缺省使用 `address`
    pub advertise_address: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
            advertise_address: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 是否向注册中心自注册
    pub enabled: bool,
    pub consul_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            consul_url: DEFAULT_CONSUL_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: "SuperSecret".to_string(),
            issuer: "usersvc".to_string(),
            ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
