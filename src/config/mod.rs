mod basic;
mod client;

pub use basic::BasicConfig;
pub use client::ClientConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::limits::RateLimitProbe;

pub const DEFAULT_CONFIG_FILE: &str = "restpace.toml";
const ENV_PREFIX: &str = "RESTPACE_";

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Process settings (see `basic` table in restpace.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// API connection settings (see `client` table in restpace.toml).
    #[serde(default)]
    pub client: ClientConfig,

    /// Optional endpoint to learn the request quota from (see `probe` table).
    #[serde(default)]
    pub probe: Option<ProbeConfig>,
}

/// Rate limit discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(flatten)]
    pub probe: RateLimitProbe,

    /// How long a learned quota stays valid.
    /// TOML: `probe.ttl_secs`. Default: `3600`.
    #[serde(default = "default_probe_ttl_secs")]
    pub ttl_secs: u64,
}

impl ProbeConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_probe_ttl_secs() -> u64 {
    3600
}

impl Config {
    /// Builds a Figment that merges defaults, a TOML file when it exists, and
    /// `RESTPACE_` environment variables (`__` separates tables).
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        let path = path.as_ref();
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if path.is_file() {
            figment.merge(Toml::file(path))
        } else {
            figment
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, Box<figment::Error>> {
        figment.extract().map_err(Box::new)
    }

    /// Loads configuration from `path` (optional), defaults and environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::from_figment(&Self::figment(path))
    }
}
