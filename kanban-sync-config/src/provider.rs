//! Configuration provider using Figment

use crate::discovery::{ConfigFile, ConfigFormat, FileDiscovery};
use crate::error::{ConfigError, ConfigResult};
use crate::types::SyncConfig;
use crate::ENV_PREFIX;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use tracing::{debug, info, trace};

/// Loads [`SyncConfig`] from defaults, discovered files and the environment.
///
/// Nothing is cached; every call to [`load`](Self::load) reads the sources again.
#[derive(Debug, Clone, Default)]
pub struct ConfigProvider {
    discovery: FileDiscovery,
}

impl ConfigProvider {
    /// Provider using the standard home/current directory discovery
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider using a custom file discovery
    pub fn with_discovery(discovery: FileDiscovery) -> Self {
        Self { discovery }
    }

    /// Load and validate the configuration
    pub fn load(&self) -> ConfigResult<SyncConfig> {
        debug!("Loading kanban-sync configuration");

        let config: SyncConfig = self
            .build_figment()
            .extract()
            .map_err(|e| ConfigError::parse_error(None, e))?;
        config.validate()?;

        info!(
            base_url = %config.gateway.base_url,
            authenticated = config.gateway.token.is_some(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Sources merged in precedence order (later overrides earlier):
    /// defaults, global file, project file, environment
    fn build_figment(&self) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(SyncConfig::default()));

        for file in self.discovery.discover_all() {
            trace!(
                "Merging config file: {} ({:?})",
                file.path.display(),
                file.format
            );
            figment = figment.merge(Self::file_provider(&file));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn file_provider(file: &ConfigFile) -> Figment {
        match file.format {
            ConfigFormat::Toml => Figment::from(Toml::file(&file.path)),
            ConfigFormat::Yaml => Figment::from(Yaml::file(&file.path)),
            ConfigFormat::Json => Figment::from(Json::file(&file.path)),
        }
    }
}
