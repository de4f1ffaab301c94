//! Configuration
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. TOML file: explicit path, else `TEMPO_CONFIG_PATH`, else `tempo.toml`
//!    in the working directory (optional)
//! 3. Environment variables prefixed `TEMPO_`, nested keys joined by `__`
//!    (`TEMPO_BROKER__PARTITION_COUNT=5`)
//! 4. Overrides passed to the builder (CLI flags)
//!
//! A `.env` file is loaded into the environment first.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::PartitionId;

const ENV_PREFIX: &str = "TEMPO";
const CONFIG_PATH_ENV: &str = "TEMPO_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "tempo.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_partition_count")]
    pub partition_count: u32,

    /// Partition that versions and distributes deployments
    #[serde(default = "default_deployment_partition")]
    pub deployment_partition: PartitionId,

    /// Extra attempts for responses and forwards that failed
    #[serde(default = "default_side_effect_retries")]
    pub side_effect_retries: u32,

    /// Capacity of each partition's command channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            partition_count: default_partition_count(),
            deployment_partition: default_deployment_partition(),
            side_effect_retries: default_side_effect_retries(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_partition_count() -> u32 {
    3
}

fn default_deployment_partition() -> PartitionId {
    1
}

fn default_side_effect_retries() -> u32 {
    3
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default sources without overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn validate(&self) -> Result<()> {
        let broker = &self.broker;
        if broker.partition_count == 0 {
            bail!("broker.partition_count must be at least 1");
        }
        if broker.deployment_partition == 0
            || broker.deployment_partition > broker.partition_count
        {
            bail!(
                "broker.deployment_partition must be between 1 and {}, but was {}",
                broker.partition_count,
                broker.deployment_partition
            );
        }
        if broker.channel_capacity == 0 {
            bail!("broker.channel_capacity must be at least 1");
        }
        Ok(())
    }

    /// The effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    partition_count: Option<u32>,
    log_level: Option<String>,
}

impl ConfigBuilder {
    /// Read this file instead of the default location; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn partition_count(mut self, count: Option<u32>) -> Self {
        self.partition_count = count;
        self
    }

    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let explicit_path = self
            .config_path
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        builder = match &explicit_path {
            Some(path) => builder.add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Toml)
                    .required(true),
            ),
            None => builder.add_source(
                config::File::with_name(DEFAULT_CONFIG_FILE)
                    .format(config::FileFormat::Toml)
                    .required(false),
            ),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize::<Config>())
            .with_context(|| match &explicit_path {
                Some(path) => format!("Failed to load configuration from {}", path.display()),
                None => "Failed to load configuration".to_string(),
            })?;

        if let Some(count) = self.partition_count {
            config.broker.partition_count = count;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }
}
