//! Configuration management for kanban-sync using Figment
//!
//! Settings are merged from several sources, later sources overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. Global file: `~/.kanban-sync/config.{toml,yaml,yml,json}`
//! 3. Project file: `./.kanban-sync/config.{toml,yaml,yml,json}`
//! 4. Environment variables prefixed with `KANBAN_SYNC_` (`__` separates nested keys)
//!
//! ```no_run
//! use kanban_sync_config::load_configuration;
//!
//! let config = load_configuration()?;
//! println!("remote store at {}", config.gateway.base_url);
//! # Ok::<(), kanban_sync_config::ConfigError>(())
//! ```
//!
//! ## Example TOML Configuration
//!
//! ```toml
//! default_agent = "refinador-tecnico"
//!
//! [gateway]
//! base_url = "https://boards.example.com/api/"
//! token = "eyJhbGciOi..."
//! timeout_secs = 15
//! ```
//!
//! The same keys from the environment:
//!
//! ```text
//! KANBAN_SYNC_GATEWAY__BASE_URL=https://boards.example.com/api/
//! KANBAN_SYNC_GATEWAY__TOKEN=eyJhbGciOi...
//! ```

mod discovery;
mod error;
mod provider;
mod types;

pub use discovery::{ConfigFile, ConfigFormat, ConfigScope, FileDiscovery};
pub use error::{ConfigError, ConfigResult};
pub use provider::ConfigProvider;
pub use types::{GatewayConfig, SyncConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Directory name searched for configuration files in the home and project roots
pub const CONFIG_DIR_NAME: &str = ".kanban-sync";

/// Base name of configuration files inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_STEM: &str = "config";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "KANBAN_SYNC_";

/// Load configuration from all standard sources and validate it
pub fn load_configuration() -> ConfigResult<SyncConfig> {
    ConfigProvider::new().load()
}
