use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::Deserialize;
use validator::Validate;

use crate::error::AdapterError;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../sparteo-adapter.toml");
const ENVIRONMENT_PREFIX: &str = "SPARTEO_ADAPTER";

/// Per-bidder settings handed to [`crate::sparteo::builder`].
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AdapterConfig {
    /// Endpoint URL template, e.g.
    /// `https://bid.sparteo.com/s2s-auction?network_id={{.NetworkId}}`.
    #[validate(length(min = 1))]
    pub endpoint: String,
    /// Refuse to build the adapter.
    #[serde(default)]
    pub disabled: bool,
}

/// Host server settings. The adapter only logs them today.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ServerConfig {
    /// IAB Global Vendor List id of the exchange.
    #[serde(default)]
    #[validate(range(min = 1, max = 4095))]
    pub gvl_id: u16,
    #[serde(default)]
    pub datacenter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub adapter: AdapterConfig,
    #[validate(nested)]
    pub server: ServerConfig,
}

impl Settings {
    /// Load the settings bundled with the crate, with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an [`AdapterError::Configuration`] report when the embedded TOML
    /// or an override cannot be deserialized or fails validation.
    pub fn new() -> Result<Self, Report<AdapterError>> {
        Self::from_toml(DEFAULT_SETTINGS_TOML)
    }

    /// Parse settings from a TOML string. Variables named
    /// `SPARTEO_ADAPTER__<SECTION>__<KEY>` override values from the file.
    ///
    /// # Errors
    ///
    /// Returns an [`AdapterError::Configuration`] report on malformed TOML,
    /// missing required keys, or validation failures.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<AdapterError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_PREFIX)
            .separator("__");

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(AdapterError::Configuration {
                message: "failed to build adapter configuration".to_string(),
            })?;

        let settings: Self = config
            .try_deserialize()
            .change_context(AdapterError::Configuration {
                message: "failed to deserialize adapter configuration".to_string(),
            })?;

        settings
            .validate()
            .change_context(AdapterError::Configuration {
                message: "adapter configuration failed validation".to_string(),
            })?;

        Ok(settings)
    }
}
