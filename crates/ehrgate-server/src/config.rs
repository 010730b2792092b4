use ehrgate_auth::IdentityConfig;
use ehrgate_core::{DataType, Sensitivity};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Gateway configuration, loaded from TOML with `EHRGATE__SECTION__KEY`
/// environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub channels: ChannelConfig,
    /// Sensitivity applied when a created record does not carry one
    #[serde(default)]
    pub records: RecordDefaults,
    /// Identity attribute names and subject binding
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelConfig {
    /// The only channel on which audit entries are written and read
    pub audit: String,
    /// The only channel serving insurer operations
    pub insurance: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            audit: "audit-channel".to_string(),
            insurance: "insurance-channel".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecordDefaults {
    pub ehr: Sensitivity,
    pub lab: Sensitivity,
    pub prescription: Sensitivity,
    pub insurance: Sensitivity,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            ehr: Sensitivity::Medium,
            lab: Sensitivity::Medium,
            prescription: Sensitivity::Medium,
            insurance: Sensitivity::Low,
        }
    }
}

impl RecordDefaults {
    pub fn sensitivity_for(&self, data_type: DataType) -> Sensitivity {
        match data_type {
            DataType::Ehr => self.ehr,
            DataType::Lab => self.lab,
            DataType::Prescription => self.prescription,
            DataType::Insurance => self.insurance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration source could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        Self::Load(err.to_string())
    }
}

const VALID_LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl GatewayConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for empty channel or attribute names and
    /// `ConfigError::InvalidValue` if the audit and insurance channels
    /// coincide, attribute names collide or the log level is unknown.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.audit.trim().is_empty() {
            return Err(ConfigError::Missing("channels.audit".into()));
        }
        if self.channels.insurance.trim().is_empty() {
            return Err(ConfigError::Missing("channels.insurance".into()));
        }
        if self.channels.audit == self.channels.insurance {
            return Err(ConfigError::InvalidValue(
                "channels.audit and channels.insurance must differ".into(),
            ));
        }

        let names = self.identity.attribute_names();
        for (field, name) in &names {
            if name.trim().is_empty() {
                return Err(ConfigError::Missing(format!("identity.{field}")));
            }
        }
        for (i, (field, name)) in names.iter().enumerate() {
            if let Some((other, _)) = names[i + 1..].iter().find(|(_, n)| n == name) {
                return Err(ConfigError::InvalidValue(format!(
                    "identity.{field} and identity.{other} both read attribute {name:?}"
                )));
            }
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "logging.level must be one of {VALID_LOG_LEVELS:?}"
            )));
        }
        Ok(())
    }

    /// Parses and validates a TOML document. Environment overrides are not
    /// applied.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let cfg: GatewayConfig = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads `path` (when given), applies `EHRGATE__SECTION__KEY` environment
    /// overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::Load(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(
                config::File::from(path.to_path_buf()).format(config::FileFormat::Toml),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix("EHRGATE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg: GatewayConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        tracing::debug!(
            audit_channel = %cfg.channels.audit,
            insurance_channel = %cfg.channels.insurance,
            "Gateway configuration loaded"
        );
        Ok(cfg)
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }
}
