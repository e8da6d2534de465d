//! Configuration file discovery
//!
//! Looks for `config.{toml,yaml,yml,json}` inside `.kanban-sync/` under the
//! home directory (global scope) and the current directory (project scope).

use crate::{CONFIG_DIR_NAME, CONFIG_FILE_STEM};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// A discovered configuration file
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Full path to the configuration file
    pub path: PathBuf,
    /// Detected format of the file
    pub format: ConfigFormat,
    /// Where the file was found
    pub scope: ConfigScope,
}

/// Configuration file format detected from file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Scope indicating where a file was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigScope {
    /// `~/.kanban-sync/`
    Global,
    /// `./.kanban-sync/`
    Project,
}

/// Finds configuration files in the global and project directories
#[derive(Debug, Clone, Default)]
pub struct FileDiscovery {
    global_dir: Option<PathBuf>,
    project_dir: Option<PathBuf>,
}

impl FileDiscovery {
    /// Discovery rooted at the home directory and the current directory,
    /// resolved when [`discover_all`](Self::discover_all) runs
    pub fn new() -> Self {
        Self::default()
    }

    /// Discovery rooted at explicit directories (each is the parent of `.kanban-sync/`)
    pub fn with_roots(global_root: Option<PathBuf>, project_root: Option<PathBuf>) -> Self {
        Self {
            global_dir: global_root.map(|root| root.join(CONFIG_DIR_NAME)),
            project_dir: project_root.map(|root| root.join(CONFIG_DIR_NAME)),
        }
    }

    /// All configuration files, lowest precedence first
    pub fn discover_all(&self) -> Vec<ConfigFile> {
        let global_dir = self
            .global_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME)));
        let project_dir = self.project_dir.clone().or_else(|| {
            std::env::current_dir()
                .ok()
                .map(|cwd| cwd.join(CONFIG_DIR_NAME))
        });

        let mut files = Vec::new();
        if let Some(dir) = &global_dir {
            files.extend(Self::search_directory(dir, ConfigScope::Global));
        }
        if let Some(dir) = &project_dir {
            // The project directory can be the home directory itself.
            if global_dir.as_deref() != Some(dir.as_path()) {
                files.extend(Self::search_directory(dir, ConfigScope::Project));
            }
        }

        debug!("Discovered {} configuration files", files.len());
        files
    }

    fn search_directory(dir: &Path, scope: ConfigScope) -> Vec<ConfigFile> {
        if !dir.is_dir() {
            trace!("Config directory {} does not exist", dir.display());
            return Vec::new();
        }

        ["toml", "yaml", "yml", "json"]
            .iter()
            .filter_map(|ext| {
                let path = dir.join(format!("{}.{}", CONFIG_FILE_STEM, ext));
                let format = ConfigFormat::from_extension(ext)?;
                if path.is_file() {
                    trace!("Found config: {} ({:?})", path.display(), format);
                    Some(ConfigFile {
                        path,
                        format,
                        scope,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("yml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("ini"), None);
    }

    #[test]
    fn test_discovers_global_before_project() {
        let global = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::create_dir_all(global.path().join(CONFIG_DIR_NAME)).unwrap();
        fs::create_dir_all(project.path().join(CONFIG_DIR_NAME)).unwrap();
        fs::write(global.path().join(CONFIG_DIR_NAME).join("config.yaml"), "").unwrap();
        fs::write(project.path().join(CONFIG_DIR_NAME).join("config.toml"), "").unwrap();

        let discovery = FileDiscovery::with_roots(
            Some(global.path().to_path_buf()),
            Some(project.path().to_path_buf()),
        );
        let files = discovery.discover_all();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].scope, ConfigScope::Global);
        assert_eq!(files[0].format, ConfigFormat::Yaml);
        assert_eq!(files[1].scope, ConfigScope::Project);
        assert_eq!(files[1].format, ConfigFormat::Toml);
    }

    #[test]
    fn test_missing_directories_yield_nothing() {
        let empty = TempDir::new().unwrap();
        let discovery = FileDiscovery::with_roots(
            Some(empty.path().join("nope")),
            Some(empty.path().to_path_buf()),
        );
        assert!(discovery.discover_all().is_empty());
    }
}
