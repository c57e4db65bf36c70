//! Runtime configuration.
//!
//! Sources, in order of precedence (later sources override earlier):
//! 1. Bundled defaults (include_str! from speakhub.toml)
//! 2. User config in the home directory (~/.config/speakhub/speakhub.toml)
//! 3. User config in the current directory (./speakhub.toml)

use config::{Config, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use speakhub_core::GuildSettings;
use speakhub_error::{ConfigError, SpeakhubResult};
use speakhub_orchestrator::NormalizerConfig;
use speakhub_rate_limit::DispatcherConfig;
use speakhub_storage::StorageConfig;
use std::collections::BTreeSet;
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../speakhub.toml");

/// Top-level speakhub configuration.
///
/// Loaded once at startup and never mutated afterwards.
///
/// # Example
///
/// ```no_run
/// use speakhub_bot::SpeakhubConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SpeakhubConfig::load()?;
/// config.validate()?;
/// println!("{} guild(s) configured", config.guilds().len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct SpeakhubConfig {
    /// Rate limits and retry policy
    #[serde(default)]
    dispatcher: DispatcherConfig,

    /// Event normalization and per-guild queueing
    #[serde(default)]
    normalizer: NormalizerConfig,

    /// Optional managed channel persistence
    #[serde(default)]
    storage: Option<StorageConfig>,

    /// One entry per managed guild
    #[serde(default)]
    guilds: Vec<GuildSettings>,
}

fn build(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> SpeakhubResult<SpeakhubConfig> {
    let config = builder
        .build()
        .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
        .try_deserialize()
        .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
    Ok(config)
}

impl SpeakhubConfig {
    /// Load configuration from a specific file path, on top of the bundled
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> SpeakhubResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::new(format!(
                "Configuration file {} does not exist",
                path.display()
            ))
            .into());
        }
        build(
            Config::builder()
                .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
                .add_source(File::from(path).format(FileFormat::Toml)),
        )
    }

    /// Parse configuration from TOML text, on top of the bundled defaults.
    pub fn from_toml_str(toml: &str) -> SpeakhubResult<Self> {
        build(
            Config::builder()
                .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
                .add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    /// The bundled defaults alone. No guilds are configured.
    pub fn bundled() -> SpeakhubResult<Self> {
        build(Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml)))
    }

    /// Load configuration with precedence: current directory > home
    /// directory > bundled defaults.
    ///
    /// User config files are optional and silently skipped if not found.
    pub fn load() -> SpeakhubResult<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/speakhub/speakhub.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("speakhub").required(false));

        let config = build(builder)?;
        tracing::debug!(guilds = config.guilds.len(), "Loaded configuration");
        Ok(config)
    }

    /// Settings of one guild, if configured.
    pub fn guild(&self, guild: speakhub_core::GuildId) -> Option<&GuildSettings> {
        self.guilds.iter().find(|g| *g.guild_id() == guild)
    }

    /// Reject configurations the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for settings in &self.guilds {
            settings.validate()?;
            if !seen.insert(*settings.guild_id()) {
                return Err(ConfigError::new(format!(
                    "guild {} is configured more than once",
                    settings.guild_id()
                )));
            }
        }
        if *self.dispatcher.max_attempts() == 0 {
            return Err(ConfigError::new("dispatcher.max_attempts must be positive"));
        }
        if *self.dispatcher.submit_timeout_secs() == 0 {
            return Err(ConfigError::new(
                "dispatcher.submit_timeout_secs must be positive",
            ));
        }
        if *self.normalizer.queue_capacity() == 0 {
            return Err(ConfigError::new("normalizer.queue_capacity must be positive"));
        }
        Ok(())
    }
}
