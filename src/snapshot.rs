//! Snapshots, export and import of the tracked setup.
//!
//! A snapshot records the tracked lists together with what was actually
//! installed at the time, under `~/.stowaway/snapshots/<name>.json`. An
//! export is the portable subset of the config (never paths or tokens) and
//! can be written as JSON, YAML or TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::{Config, add_unique};
use crate::exec::CommandLine;
use crate::manager::ManagerKind;
use crate::{packages, ui};

const FORMAT_VERSION: u32 = 1;

/// Portable part of the configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Export {
    #[serde(default = "format_version")]
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<ManagerKind>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub casks: Vec<String>,
    #[serde(default)]
    pub taps: Vec<String>,
    #[serde(default)]
    pub bundles: Vec<String>,
    #[serde(default)]
    pub hooks: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub templates: BTreeMap<String, Vec<String>>,
}

fn format_version() -> u32 {
    FORMAT_VERSION
}

impl Export {
    pub fn from_config(config: &Config) -> Self {
        Self {
            version: FORMAT_VERSION,
            exported_at: Some(chrono::Utc::now().to_rfc3339()),
            package_manager: config.package_manager,
            packages: config.packages.clone(),
            casks: config.casks.clone(),
            taps: config.taps.clone(),
            bundles: config.bundles.clone(),
            hooks: config.hooks.clone(),
            templates: config.templates.clone(),
        }
    }

    /// Parse from text, the format chosen by the file extension
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        let export: Self = match extension(path).as_deref() {
            Some("json") | None => serde_json::from_str(contents)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(contents)?,
            Some("toml") => toml::from_str(contents)?,
            Some(other) => anyhow::bail!("Unsupported import format: .{}", other),
        };
        Ok(export)
    }

    /// Serialize, the format chosen by the file extension
    pub fn render(&self, path: &Path) -> Result<String> {
        let data = match extension(path).as_deref() {
            Some("json") | None => serde_json::to_string_pretty(self)? + "\n",
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            Some("toml") => toml::to_string(self)?,
            Some(other) => anyhow::bail!("Unsupported export format: .{}", other),
        };
        Ok(data)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Fold an export into the config.
///
/// Merging is a deduplicated union keeping existing order; `replace`
/// swaps the tracked lists, hooks and templates wholesale.
pub fn merge_export(config: &mut Config, export: Export, replace: bool) {
    if replace {
        config.packages = export.packages;
        config.casks = export.casks;
        config.taps = export.taps;
        config.bundles = export.bundles;
        config.hooks = export.hooks;
        config.templates = export.templates;
    } else {
        union(&mut config.packages, &export.packages);
        union(&mut config.casks, &export.casks);
        union(&mut config.taps, &export.taps);
        union(&mut config.bundles, &export.bundles);
        for (event, commands) in export.hooks {
            union(config.hooks.entry(event).or_default(), &commands);
        }
        for (name, pkgs) in export.templates {
            config.templates.entry(name).or_insert(pkgs);
        }
    }

    if config.package_manager.is_none() {
        config.package_manager = export.package_manager;
    }
}

/// Replace only the tracked lists, keeping hooks and templates
pub fn restore_lists(config: &mut Config, export: &Export) {
    config.packages = export.packages.clone();
    config.casks = export.casks.clone();
    config.taps = export.taps.clone();
    config.bundles = export.bundles.clone();
}

fn union(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        add_unique(into, item);
    }
}

/// `stowaway export`
pub async fn export(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path)?;
    let export = Export::from_config(&config);

    match output {
        Some(path) => {
            let data = export.render(&path)?;
            fs::write(&path, data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            ui::success(format!("Exported configuration to {}", ui::path(&path)));
        }
        None => println!("{}", serde_json::to_string_pretty(&export)?),
    }
    Ok(())
}

/// `stowaway import-config`
pub async fn import(config_path: &Path, input: &Path, replace: bool) -> Result<()> {
    let contents = fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let export = Export::parse(&contents, input)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    let mut config = Config::load(config_path)?;
    merge_export(&mut config, export, replace);
    config.commit(config_path)?;

    ui::success(format!(
        "Imported {} ({} packages, {} casks, {} bundles)",
        input.display(),
        config.packages.len(),
        config.casks.len(),
        config.bundles.len()
    ));
    Ok(())
}

/// Point-in-time record of the setup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub version: u32,
    pub name: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<ManagerKind>,
    /// Explicitly installed packages when the snapshot was taken
    #[serde(default)]
    pub installed: Vec<String>,
    #[serde(default)]
    pub casks: Vec<String>,
    pub config: Export,
}

impl Snapshot {
    pub async fn load(dir: &Path, name: &str) -> Result<Self> {
        let path = snapshot_path(dir, name)?;
        let contents = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Snapshot '{}' not found", name))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .await
            .context("Failed to create snapshots directory")?;
        let path = snapshot_path(dir, &self.name)?;
        fs::write(&path, serde_json::to_string_pretty(self)? + "\n")
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

pub fn snapshot_path(dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        anyhow::bail!("Invalid snapshot name '{}'", name);
    }
    Ok(dir.join(format!("{}.json", name)))
}

/// Snapshots in a directory, oldest first
pub async fn list_snapshots(dir: &Path) -> Result<Vec<Snapshot>> {
    let mut snapshots = Vec::new();
    if !dir.exists() {
        return Ok(snapshots);
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let contents = fs::read_to_string(&path).await?;
        match serde_json::from_str::<Snapshot>(&contents) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => log::warn!("Skipping unreadable snapshot {}: {}", path.display(), e),
        }
    }

    snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(snapshots)
}

async fn hostname() -> Option<String> {
    if let Ok(name) = std::env::var("HOSTNAME") {
        return Some(name);
    }
    CommandLine::new("hostname")
        .output(None)
        .await
        .ok()
        .map(|out| out.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// `stowaway snapshot create`
pub async fn create(config_path: &Path, name: Option<String>) -> Result<()> {
    let config = Config::load(config_path)?;
    let now = chrono::Local::now();
    let name = name.unwrap_or_else(|| now.format("%Y%m%d-%H%M%S").to_string());

    let (manager, installed, casks) = match config.manager() {
        Ok(manager) => {
            let spinner = ui::spinner(format!("Reading installed {} packages", manager));
            let installed = manager.explicit().await;
            let casks = manager.installed_casks().await;
            spinner.finish_and_clear();
            (Some(manager), installed?, casks?)
        }
        Err(e) => {
            log::warn!("{}; snapshot will not include installed packages", e);
            (None, Vec::new(), Vec::new())
        }
    };

    let snapshot = Snapshot {
        version: FORMAT_VERSION,
        name,
        created_at: chrono::Utc::now().to_rfc3339(),
        hostname: hostname().await,
        manager,
        installed,
        casks,
        config: Export::from_config(&config),
    };

    let path = snapshot.save(&config.paths.snapshots_dir()?).await?;
    ui::success(format!("Snapshot '{}' saved to {}", snapshot.name, ui::path(&path)));
    Ok(())
}

/// `stowaway snapshot list`
pub async fn list(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let snapshots = list_snapshots(&config.paths.snapshots_dir()?).await?;

    if snapshots.is_empty() {
        println!("No snapshots yet. Use 'stowaway snapshot create' to take one.");
        return Ok(());
    }

    ui::header("Snapshots");
    for snapshot in snapshots {
        println!(
            "  📸 {}  {}  {} tracked, {} installed{}",
            console::style(&snapshot.name).bold(),
            crate::setup::format_timestamp(&snapshot.created_at),
            snapshot.config.packages.len(),
            snapshot.installed.len(),
            snapshot
                .hostname
                .map(|h| format!(" on {}", h))
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// `stowaway snapshot show`
pub async fn show(config_path: &Path, name: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let snapshot = Snapshot::load(&config.paths.snapshots_dir()?, name).await?;

    ui::header(format!("Snapshot {}", snapshot.name));
    println!("  Created:  {}", crate::setup::format_timestamp(&snapshot.created_at));
    if let Some(host) = &snapshot.hostname {
        println!("  Host:     {}", host);
    }
    if let Some(manager) = snapshot.manager {
        println!("  Manager:  {}", manager);
    }
    println!("  Packages: {}", snapshot.config.packages.join(", "));
    println!("  Casks:    {}", snapshot.config.casks.join(", "));
    println!("  Taps:     {}", snapshot.config.taps.join(", "));
    println!("  Bundles:  {}", snapshot.config.bundles.join(", "));

    let drift = packages::compute_diff(&snapshot.config.packages, &snapshot.installed);
    if !drift.is_clean() {
        println!(
            "  At snapshot time: {} tracked not installed, {} installed not tracked",
            drift.missing.len(),
            drift.untracked.len()
        );
    }
    Ok(())
}

/// `stowaway snapshot restore`
pub async fn restore(config_path: &Path, name: &str, install: bool) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let snapshot = Snapshot::load(&config.paths.snapshots_dir()?, name).await?;

    restore_lists(&mut config, &snapshot.config);
    config.commit(config_path)?;
    ui::success(format!("Restored tracked lists from snapshot '{}'", name));

    if install {
        packages::install_all(&config).await?;
    }
    Ok(())
}

/// `stowaway snapshot delete`
pub async fn delete(config_path: &Path, name: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let path = snapshot_path(&config.paths.snapshots_dir()?, name)?;
    fs::remove_file(&path)
        .await
        .with_context(|| format!("Snapshot '{}' not found", name))?;
    ui::success(format!("Deleted snapshot '{}'", name));
    Ok(())
}
