use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Json},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::manager::ManagerKind;

const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

/// Paths used by stowaway, all optional and resolved against the home directory
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathsConfig {
    /// Path to the stowaway directory (default: ~/.stowaway)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stowaway_dir: Option<PathBuf>,
    /// Directory holding the stow bundles (default: ~/dotfiles)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dotfiles_dir: Option<PathBuf>,
    /// Where conflicting files are moved before stowing (default: ~/.stowaway/backups)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    /// Where snapshots are written (default: ~/.stowaway/snapshots)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshots_dir: Option<PathBuf>,
    /// Directory stow links into (default: home directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<PathBuf>,
}

impl PathsConfig {
    /// Get the stowaway directory path, using configured value or default
    pub fn stowaway_dir(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.stowaway_dir {
            Ok(path.clone())
        } else {
            Ok(home_dir()?.join(".stowaway"))
        }
    }

    /// Get the dotfiles directory path, using configured value or default
    pub fn dotfiles_dir(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.dotfiles_dir {
            Ok(path.clone())
        } else {
            Ok(home_dir()?.join("dotfiles"))
        }
    }

    /// Get the backup directory path, using configured value or default
    pub fn backup_dir(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.backup_dir {
            Ok(path.clone())
        } else {
            Ok(self.stowaway_dir()?.join("backups"))
        }
    }

    /// Get the snapshots directory path, using configured value or default
    pub fn snapshots_dir(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.snapshots_dir {
            Ok(path.clone())
        } else {
            Ok(self.stowaway_dir()?.join("snapshots"))
        }
    }

    /// Get the stow target directory, using configured value or default
    pub fn target_dir(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.target_dir {
            Ok(path.clone())
        } else {
            home_dir()
        }
    }
}

/// GitHub settings used for Gist sync
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GithubConfig {
    /// Personal access token with the `gist` scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Gist used by `gist push` / `gist pull`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gist_id: Option<String>,
}

/// The user's machine setup
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Last time the configuration was changed (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Paths configuration
    #[serde(default)]
    pub paths: PathsConfig,
    /// Package manager override, detected from `PATH` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<ManagerKind>,
    /// Packages (brew formulae or distro packages)
    #[serde(default)]
    pub packages: Vec<String>,
    /// Homebrew casks
    #[serde(default)]
    pub casks: Vec<String>,
    /// Homebrew taps
    #[serde(default)]
    pub taps: Vec<String>,
    /// Stow bundles inside the dotfiles directory
    #[serde(default)]
    pub bundles: Vec<String>,
    /// Shell commands keyed by hook event
    #[serde(default)]
    pub hooks: BTreeMap<String, Vec<String>>,
    /// User defined package templates
    #[serde(default)]
    pub templates: BTreeMap<String, Vec<String>>,
    /// GitHub settings
    #[serde(default)]
    pub github: GithubConfig,
    /// Token from `STOWAWAY_GITHUB__TOKEN`, held in memory only
    #[serde(skip)]
    pub(crate) env_token: Option<String>,
}

impl Config {
    /// Load configuration from the JSON file, with `STOWAWAY_` environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        log::debug!("Loading configuration from {}", path.display());

        let mut fig = Figment::new();

        if path.exists() {
            if path.extension().is_some_and(|ext| ext == "json") {
                fig = fig.merge(Json::file(path));
            } else {
                log::warn!("Unsupported configuration file format");
                anyhow::bail!(
                    "Unsupported configuration file format: {} (expected .json)",
                    path.display()
                );
            }
        } else {
            log::warn!("Configuration file not found, using defaults");
        }

        let prefix = format!("{}_", PROJECT_NAME.to_uppercase());
        log::debug!("Loading environment prefix: {}", prefix);
        let env = Figment::from(Env::prefixed(&prefix).split("__"));

        Self::from_layers(fig, env)
            .with_context(|| format!("Failed to parse configuration {}", path.display()))
    }

    /// Merge the file layer with environment overrides.
    ///
    /// The environment wins, but a token it supplies is kept out of
    /// `github.token` so saving never writes it to disk.
    fn from_layers(file: Figment, env: Figment) -> figment::Result<Self> {
        let env_token = env.extract_inner::<String>("github.token").ok();
        let file_token = file.extract_inner::<String>("github.token").ok();

        let mut config: Config = file.merge(env).extract()?;
        if env_token.is_some() {
            config.github.token = file_token;
            config.env_token = env_token;
        }
        Ok(config)
    }

    /// Update the last updated timestamp to current time
    pub fn update_timestamp(&mut self) {
        self.updated = Some(chrono::Utc::now().to_rfc3339());
    }

    /// Save configuration as pretty printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        log::debug!("Saving configuration to {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data + "\n")
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Stamp and save, the tail of every mutating command
    pub fn commit(&mut self, path: &Path) -> Result<()> {
        self.update_timestamp();
        self.save(path)
    }

    /// Resolve the configured package manager or detect one
    pub fn manager(&self) -> Result<ManagerKind> {
        match self.package_manager {
            Some(kind) => Ok(kind),
            None => crate::manager::detect()
                .context("No supported package manager found (brew, pacman, apt-get, yum)"),
        }
    }

    /// The GitHub token from the environment override, config or `GITHUB_TOKEN`
    pub fn github_token(&self) -> Option<String> {
        self.env_token
            .clone()
            .or_else(|| self.github.token.clone())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

/// Push `item` unless an equal string is already present.
pub fn add_unique(list: &mut Vec<String>, item: &str) -> bool {
    if list.iter().any(|existing| existing == item) {
        false
    } else {
        list.push(item.to_string());
        true
    }
}

/// Remove every occurrence of `item`, returning whether anything was removed
pub fn remove_item(list: &mut Vec<String>, item: &str) -> bool {
    let before = list.len();
    list.retain(|existing| existing != item);
    before != list.len()
}

/// Get the home directory
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Failed to get home directory")
}

/// Default config file path (~/.stowaway/config.json)
pub fn default_config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".stowaway").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_unique_dedupes() {
        let mut list = vec!["git".to_string()];
        assert!(!add_unique(&mut list, "git"));
        assert!(add_unique(&mut list, "ripgrep"));
        assert_eq!(list, vec!["git", "ripgrep"]);
    }

    #[test]
    fn test_remove_item() {
        let mut list = vec!["git".to_string(), "fd".to_string()];
        assert!(remove_item(&mut list, "git"));
        assert!(!remove_item(&mut list, "git"));
        assert_eq!(list, vec!["fd"]);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.packages = vec!["git".into(), "neovim".into()];
        config.casks = vec!["wezterm".into()];
        config.bundles = vec!["zsh".into()];
        config
            .hooks
            .insert("post-install".into(), vec!["echo done".into()]);
        config.paths.dotfiles_dir = Some(dir.path().join("dots"));
        config.package_manager = Some(ManagerKind::Pacman);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load(&dir.path().join("config.json")).unwrap();
        assert!(loaded.packages.is_empty());
        assert!(loaded.hooks.is_empty());
    }

    #[test]
    fn test_load_rejects_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "packages: []").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = Figment::from(Json::string(
            r#"{"package_manager": "brew", "packages": ["git"]}"#,
        ));
        let env = Figment::from(Json::string(r#"{"package_manager": "apt"}"#));

        let config = Config::from_layers(file, env).unwrap();
        assert_eq!(config.package_manager, Some(ManagerKind::Apt));
        assert_eq!(config.packages, vec!["git"]);
    }

    #[test]
    fn test_environment_token_is_never_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let file = Figment::from(Json::string(r#"{"github": {"token": "from-file"}}"#));
        let env = Figment::from(Json::string(r#"{"github": {"token": "from-env"}}"#));

        let mut config = Config::from_layers(file, env).unwrap();
        assert_eq!(config.github_token().as_deref(), Some("from-env"));

        config.commit(&path).unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(!saved.contains("from-env"));
        assert!(saved.contains("from-file"));
    }

    #[test]
    fn test_paths_use_configured_values() {
        let paths = PathsConfig {
            stowaway_dir: Some(PathBuf::from("/tmp/sw")),
            ..Default::default()
        };
        assert_eq!(paths.backup_dir().unwrap(), PathBuf::from("/tmp/sw/backups"));
        assert_eq!(
            paths.snapshots_dir().unwrap(),
            PathBuf::from("/tmp/sw/snapshots")
        );
    }
}
