use crate::Error;
use anyhow::Context;
use serde::Deserialize;
use std::{collections::HashSet, net::SocketAddr, path::Path};

/// Broker configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Domains the broker accepts key exchanges for.
    pub domains: HashSet<String>,

    pub mqtt: MqttConfig,

    /// Address the HTTP API binds to. Defaults to 0.0.0.0:5000.
    #[serde(default)]
    pub broker_listen: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MqttConfig {
    /// Hostname or IP address of the MQTT broker.
    pub broker_url: String,

    #[serde(default = "default_mqtt_port")]
    pub broker_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Keepalive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,

    #[serde(default)]
    pub tls: bool,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keepalive() -> u64 {
    60
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn is_valid_domain(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }
}
