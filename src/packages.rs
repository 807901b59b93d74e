use anyhow::{Context, Result};
use dialoguer::{MultiSelect, theme::ColorfulTheme};
use std::path::{Path, PathBuf};

use crate::config::{Config, add_unique, remove_item};
use crate::hooks::{self, HookEvent};
use crate::manager::ManagerKind;
use crate::ui;

/// Which list a package name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Formula,
    Cask,
    Tap,
}

impl PackageKind {
    pub fn from_flags(cask: bool, tap: bool) -> Self {
        match (cask, tap) {
            (_, true) => PackageKind::Tap,
            (true, false) => PackageKind::Cask,
            _ => PackageKind::Formula,
        }
    }

    fn list<'a>(&self, config: &'a mut Config) -> &'a mut Vec<String> {
        match self {
            PackageKind::Formula => &mut config.packages,
            PackageKind::Cask => &mut config.casks,
            PackageKind::Tap => &mut config.taps,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PackageKind::Formula => "package",
            PackageKind::Cask => "cask",
            PackageKind::Tap => "tap",
        }
    }
}

/// Difference between what the config wants and what is installed
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PackageDiff {
    /// Tracked but not installed
    pub missing: Vec<String>,
    /// Explicitly installed but not tracked
    pub untracked: Vec<String>,
}

impl PackageDiff {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.untracked.is_empty()
    }
}

pub fn compute_diff(desired: &[String], installed: &[String]) -> PackageDiff {
    let mut missing: Vec<String> = desired
        .iter()
        .filter(|p| !installed.contains(p))
        .cloned()
        .collect();
    let mut untracked: Vec<String> = installed
        .iter()
        .filter(|p| !desired.contains(p))
        .cloned()
        .collect();

    missing.sort();
    missing.dedup();
    untracked.sort();
    untracked.dedup();

    PackageDiff { missing, untracked }
}

/// Packages that still need installing, in config order
pub fn pending(desired: &[String], installed: &[String]) -> Vec<String> {
    desired
        .iter()
        .filter(|p| !installed.contains(p))
        .cloned()
        .collect()
}

/// `stowaway add`
pub async fn add(
    config_path: &Path,
    names: Vec<String>,
    cask: bool,
    tap: bool,
    no_install: bool,
) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let kind = PackageKind::from_flags(cask, tap);

    let mut added = Vec::new();
    for name in &names {
        if add_unique(kind.list(&mut config), name) {
            added.push(name.clone());
        } else {
            ui::warn(format!("{} already tracked", name));
        }
    }

    if added.is_empty() {
        return Ok(());
    }

    if !no_install {
        let manager = config.manager()?;
        install_kind(&config, manager, kind, &added).await?;
    }

    config.commit(config_path)?;
    ui::success(format!("Added {} {}(s): {}", added.len(), kind.label(), added.join(", ")));
    Ok(())
}

async fn install_kind(
    config: &Config,
    manager: ManagerKind,
    kind: PackageKind,
    names: &[String],
) -> Result<()> {
    hooks::run_hooks(config, HookEvent::PreInstall, None).await?;
    match kind {
        PackageKind::Formula => manager.install(names).await?,
        PackageKind::Cask => manager.install_casks(names).await?,
        PackageKind::Tap => manager.tap(names).await?,
    }
    hooks::run_hooks(config, HookEvent::PostInstall, None).await
}

/// `stowaway remove`
pub async fn remove(
    config_path: &Path,
    names: Vec<String>,
    cask: bool,
    tap: bool,
    uninstall: bool,
) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let kind = PackageKind::from_flags(cask, tap);

    let mut removed = Vec::new();
    for name in &names {
        if remove_item(kind.list(&mut config), name) {
            removed.push(name.clone());
        } else {
            ui::warn(format!("{} is not tracked", name));
        }
    }

    if removed.is_empty() {
        return Ok(());
    }

    if uninstall {
        let manager = config.manager()?;
        match kind {
            PackageKind::Formula => manager.uninstall(&removed).await?,
            PackageKind::Cask => manager.uninstall_casks(&removed).await?,
            PackageKind::Tap => log::warn!("Taps are untracked but left tapped"),
        }
    }

    config.commit(config_path)?;
    ui::success(format!(
        "Removed {} {}(s): {}",
        removed.len(),
        kind.label(),
        removed.join(", ")
    ));
    Ok(())
}

/// `stowaway list`
pub async fn list(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;

    let sections = [
        ("Packages", &config.packages),
        ("Casks", &config.casks),
        ("Taps", &config.taps),
        ("Bundles", &config.bundles),
    ];

    if sections.iter().all(|(_, items)| items.is_empty()) {
        println!("Nothing is tracked yet.");
        println!("Use 'stowaway add <package>' or 'stowaway scan' to get started.");
        return Ok(());
    }

    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        ui::header(format!("{} ({})", title, items.len()));
        for item in items {
            ui::item(item);
        }
    }
    Ok(())
}

/// Install everything tracked that is not installed yet
pub async fn install_all(config: &Config) -> Result<()> {
    let manager = config.manager()?;

    let missing_taps = pending(&config.taps, &manager.installed_taps().await?);
    let missing = pending(&config.packages, &manager.installed().await?);
    let missing_casks = pending(&config.casks, &manager.installed_casks().await?);

    if missing_taps.is_empty() && missing.is_empty() && missing_casks.is_empty() {
        ui::success("All packages are installed");
        return Ok(());
    }

    hooks::run_hooks(config, HookEvent::PreInstall, None).await?;
    manager.tap(&missing_taps).await?;
    manager.install(&missing).await?;
    manager.install_casks(&missing_casks).await?;
    hooks::run_hooks(config, HookEvent::PostInstall, None).await?;

    ui::success(format!(
        "Installed {} package(s), {} cask(s), {} tap(s)",
        missing.len(),
        missing_casks.len(),
        missing_taps.len()
    ));
    Ok(())
}

/// `stowaway install`
pub async fn install(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    install_all(&config).await
}

/// Diff of formulae and casks against the system
pub async fn system_diff(config: &Config) -> Result<(PackageDiff, PackageDiff)> {
    let manager = config.manager()?;
    let packages = compute_diff(&config.packages, &manager.explicit().await?);
    let casks = compute_diff(&config.casks, &manager.installed_casks().await?);
    Ok((packages, casks))
}

/// `stowaway diff`
pub async fn diff(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let (packages, casks) = system_diff(&config).await?;

    if packages.is_clean() && casks.is_clean() {
        ui::success("System matches configuration");
        return Ok(());
    }

    print_diff("Packages", &packages);
    print_diff("Casks", &casks);
    Ok(())
}

fn print_diff(title: &str, diff: &PackageDiff) {
    if diff.is_clean() {
        return;
    }
    ui::header(title);
    for name in &diff.missing {
        println!("  {} {}", console::style("-").red(), name);
    }
    for name in &diff.untracked {
        println!("  {} {}", console::style("+").green(), name);
    }
    println!(
        "\n  {} missing (tracked, not installed), {} untracked (installed, not tracked)",
        diff.missing.len(),
        diff.untracked.len()
    );
}

/// `stowaway scan`: track explicitly installed packages
pub async fn scan(config_path: &Path, all: bool) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let manager = config.manager()?;

    let spinner = ui::spinner(format!("Scanning {} packages", manager));
    let explicit = manager.explicit().await;
    let casks = manager.installed_casks().await;
    let taps = manager.installed_taps().await;
    spinner.finish_and_clear();

    let mut found: Vec<(PackageKind, String)> = Vec::new();
    for name in compute_diff(&config.packages, &explicit?).untracked {
        found.push((PackageKind::Formula, name));
    }
    for name in compute_diff(&config.casks, &casks?).untracked {
        found.push((PackageKind::Cask, name));
    }
    for name in compute_diff(&config.taps, &taps?).untracked {
        found.push((PackageKind::Tap, name));
    }

    if found.is_empty() {
        ui::success("No untracked packages found");
        return Ok(());
    }

    let selected: Vec<(PackageKind, String)> = if all {
        found
    } else {
        let items: Vec<String> = found
            .iter()
            .map(|(kind, name)| format!("[{}] {}", kind.label(), name))
            .collect();
        let picks = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt("Select packages to track")
            .items(&items)
            .defaults(&vec![true; items.len()])
            .interact()?;
        picks.into_iter().map(|i| found[i].clone()).collect()
    };

    let mut count = 0;
    for (kind, name) in &selected {
        if add_unique(kind.list(&mut config), name) {
            count += 1;
        }
    }

    if count > 0 {
        config.commit(config_path)?;
    }
    ui::success(format!("Tracked {} package(s) from {}", count, manager));
    Ok(())
}

/// Render a Homebrew Brewfile
pub fn render_brewfile(config: &Config) -> String {
    let mut out = String::new();
    for tap in &config.taps {
        out.push_str(&format!("tap \"{}\"\n", tap));
    }
    for package in &config.packages {
        out.push_str(&format!("brew \"{}\"\n", package));
    }
    for cask in &config.casks {
        out.push_str(&format!("cask \"{}\"\n", cask));
    }
    out
}

/// `stowaway brewfile`
pub async fn brewfile(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path)?;
    let contents = render_brewfile(&config);

    match output {
        Some(path) => {
            tokio::fs::write(&path, contents)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            ui::success(format!("Wrote {}", ui::path(&path)));
        }
        None => print!("{}", contents),
    }
    Ok(())
}
