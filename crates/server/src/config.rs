//! Server configuration.

use serde::{Deserialize, Serialize};
use tracing::info;
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

/// Server networking and room settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum connected clients.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Connections per IP limit.
    #[serde(default = "default_ip_limit")]
    pub ip_limit: usize,
    /// Server name shown in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Simulation tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_clients: default_max_clients(),
            ip_limit: default_ip_limit(),
            name: default_name(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

fn default_port() -> u16 {
    2567
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_clients() -> usize {
    100
}
fn default_ip_limit() -> usize {
    100
}
fn default_name() -> String {
    "Fathom".to_string()
}
fn default_tick_interval() -> u64 {
    40
}

/// Fish tier catalog settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Path to the catalog document served to clients.
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

fn default_catalog_path() -> String {
    "fishData.json".to_string()
}
