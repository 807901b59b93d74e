use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use crate::config::Config;
use crate::stow::{self, ConflictStrategy};
use crate::{dotfiles, git, manager, packages, ui};

/// Initialize the stowaway configuration
pub async fn init(config_path: &Path, repo: Option<String>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let already = config_path.exists();

    let stowaway_dir = config.paths.stowaway_dir()?;
    let dotfiles_dir = config.paths.dotfiles_dir()?;

    if already {
        log::info!("Stowaway is already initialized at {}", stowaway_dir.display());
    } else {
        log::info!("Initializing stowaway at {}", stowaway_dir.display());
    }

    for dir in [
        stowaway_dir.clone(),
        config.paths.backup_dir()?,
        config.paths.snapshots_dir()?,
    ] {
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    if let Some(url) = repo {
        git::check_git_available().await?;
        git::clone(&url, &dotfiles_dir).await?;
        ui::success(format!("Cloned dotfiles into {}", ui::path(&dotfiles_dir)));
    } else {
        fs::create_dir_all(&dotfiles_dir)
            .await
            .with_context(|| format!("Failed to create {}", dotfiles_dir.display()))?;
        if git::check_git_available().await.is_ok() {
            git::init_repo(&dotfiles_dir).await?;
        }
    }

    if config.package_manager.is_none() {
        config.package_manager = manager::detect();
        match config.package_manager {
            Some(kind) => ui::info(format!("Detected package manager: {}", kind)),
            None => ui::warn("No supported package manager found"),
        }
    }

    config.commit(config_path)?;

    ui::success("Stowaway initialized");
    println!("  Config:   {}", ui::path(config_path));
    println!("  Dotfiles: {}", ui::path(&dotfiles_dir));
    Ok(())
}

/// Show an overview of the setup
pub async fn status(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        println!("Stowaway is not initialized. Run 'stowaway init' to get started.");
        return Ok(());
    }

    let config = Config::load(config_path)?;
    let dotfiles_dir = config.paths.dotfiles_dir()?;
    let target_dir = config.paths.target_dir()?;

    ui::header("Stowaway");
    if let Some(updated) = &config.updated {
        println!("  Last updated: {}", format_timestamp(updated));
    }
    match config.manager() {
        Ok(kind) => println!("  Manager:      {}", kind),
        Err(_) => println!("  Manager:      none found"),
    }
    println!("  Dotfiles:     {}", dotfiles_dir.display());
    println!(
        "  Tracked:      {} packages, {} casks, {} taps, {} bundles",
        config.packages.len(),
        config.casks.len(),
        config.taps.len(),
        config.bundles.len()
    );

    if config.manager().is_ok() {
        match packages::system_diff(&config).await {
            Ok((pkgs, casks)) => {
                let missing = pkgs.missing.len() + casks.missing.len();
                let untracked = pkgs.untracked.len() + casks.untracked.len();
                if missing == 0 && untracked == 0 {
                    println!("  Packages:     ✓ in sync");
                } else {
                    println!(
                        "  Packages:     {} missing, {} untracked (see 'stowaway diff')",
                        missing, untracked
                    );
                }
            }
            Err(e) => log::warn!("Could not compare packages: {}", e),
        }
    }

    if !config.bundles.is_empty() {
        ui::header("Bundles");
        for bundle in &config.bundles {
            let dir = dotfiles_dir.join(bundle);
            let state = if !dir.is_dir() {
                "✗ missing"
            } else if stow::is_stowed(&dir, &target_dir) {
                "✓ stowed"
            } else {
                "○ not stowed"
            };
            println!("  {} {}", state, bundle);
        }
    }

    Ok(())
}

/// Install every package and stow every bundle
pub async fn sync(config_path: &Path, strategy: ConflictStrategy, dry_run: bool) -> Result<()> {
    let mut config = Config::load(config_path)?;

    if dry_run {
        let (pkgs, casks) = packages::system_diff(&config).await?;
        for name in pkgs.missing.iter().chain(casks.missing.iter()) {
            ui::dry_run(format!("Would install {}", name));
        }
    } else {
        packages::install_all(&config).await?;
    }

    let bundles = config.bundles.clone();
    if bundles.is_empty() {
        ui::info("No bundles to stow");
    } else {
        dotfiles::stow_bundles(config_path, &mut config, &bundles, strategy, dry_run).await?;
    }

    if !dry_run {
        config.commit(config_path)?;
        ui::success("Machine is in sync");
    }
    Ok(())
}

/// Format a timestamp for display
pub fn format_timestamp(timestamp: &str) -> String {
    use chrono::{DateTime, Local};

    if let Ok(dt) = timestamp.parse::<DateTime<chrono::Utc>>() {
        let local: DateTime<Local> = dt.into();
        local.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        timestamp.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp_passthrough() {
        assert_eq!(format_timestamp("not a date"), "not a date");
        assert_eq!(format_timestamp("2025-01-01T00:00:00Z").len(), 19);
    }

    #[tokio::test]
    async fn test_init_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let config_path = root.join(".stowaway/config.json");

        let mut seed = Config::default();
        seed.paths.stowaway_dir = Some(root.join(".stowaway"));
        seed.paths.dotfiles_dir = Some(root.join("dotfiles"));
        seed.package_manager = Some(crate::manager::ManagerKind::Brew);
        seed.save(&config_path).unwrap();

        init(&config_path, None).await.unwrap();

        assert!(root.join(".stowaway/backups").is_dir());
        assert!(root.join(".stowaway/snapshots").is_dir());
        assert!(root.join("dotfiles").is_dir());
        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.package_manager, Some(crate::manager::ManagerKind::Brew));
    }
}
