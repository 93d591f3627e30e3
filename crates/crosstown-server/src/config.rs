//! Server configuration, read from an optional YAML file and overridden by CLI flags.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crosstown_core::EconomyConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("player limits out of range: min {min}, max {max}")]
    PlayerLimits { min: u8, max: u8 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Registrations needed before the host may start (2-8).
    pub min_players: u8,
    pub max_players: u8,
    /// How long a reconnect token stays valid after a disconnect.
    #[serde(with = "secs")]
    pub reconnect_grace: Duration,
    /// Secret required by `Restart`; restarts are refused when unset.
    pub admin_secret: Option<String>,
    /// Dice seed; taken from the clock when unset.
    pub seed: Option<u64>,
    /// Directory with `board.yaml` and `monopolies.yaml`; the embedded board when unset.
    pub board_dir: Option<String>,
    pub economy: EconomyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 7777)),
            min_players: 2,
            max_players: 8,
            reconnect_grace: Duration::from_secs(120),
            admin_secret: None,
            seed: None,
            board_dir: None,
            economy: EconomyConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.min_players, self.max_players);
        if !(2..=8).contains(&min) || !(2..=8).contains(&max) || min > max {
            return Err(ConfigError::PlayerLimits { min, max });
        }
        Ok(())
    }

    /// Whether `secret` authorizes a restart.
    pub fn admin_allows(&self, secret: &str) -> bool {
        self.admin_secret
            .as_deref()
            .is_some_and(|expected| !expected.is_empty() && expected == secret)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
