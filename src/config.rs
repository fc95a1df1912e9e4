use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use validator::Validate;

use crate::registry::{PortPoolConfig, RegistrySettings};
use crate::simulation::ProfileParams;
use crate::telemetry::LoggingConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub simulation: SimulationConfig,
    #[validate(nested)]
    pub ports: PortPoolConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Browser origin of the control UI
    #[validate(length(min = 1))]
    pub cors_origin: String,
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            enable_cors: true,
            cors_origin: "http://localhost:5173".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimulationConfig {
    /// Interval between two readings of a running meter
    #[validate(range(min = 10, max = 3_600_000))]
    pub tick_millis: u64,
    /// Fixed seed for reproducible jitter, entropy when absent
    pub random_seed: Option<u64>,
    #[validate(nested)]
    pub profile: ProfileParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_millis: 1000,
            random_seed: None,
            profile: ProfileParams::default(),
        }
    }
}

impl Config {
    /// Defaults, then `config/default.toml`, then `PMSIM__*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("PMSIM__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract().context("invalid configuration")?;
        cfg.validate().context("configuration out of range")?;
        Ok(cfg)
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            tick_period: Duration::from_millis(self.simulation.tick_millis),
            random_seed: self.simulation.random_seed,
            ports: self.ports.clone(),
            profile: self.simulation.profile.clone(),
        }
    }
}
