//! Interactive browser over everything tracked.

use anyhow::Result;
use dialoguer::{FuzzySelect, Select, theme::ColorfulTheme};
use std::path::Path;

use crate::config::{Config, remove_item};
use crate::stow::{self, ConflictStrategy, StowAction};
use crate::{dotfiles, ui};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Package(String),
    Cask(String),
    Bundle(String),
}

impl Entry {
    fn label(&self) -> String {
        match self {
            Entry::Package(name) => format!("📦 {}", name),
            Entry::Cask(name) => format!("🍺 {} (cask)", name),
            Entry::Bundle(name) => format!("🔗 {} (bundle)", name),
        }
    }
}

/// Everything the browser lists, packages first
pub fn entries(config: &Config) -> Vec<Entry> {
    config
        .packages
        .iter()
        .cloned()
        .map(Entry::Package)
        .chain(config.casks.iter().cloned().map(Entry::Cask))
        .chain(config.bundles.iter().cloned().map(Entry::Bundle))
        .collect()
}

/// `stowaway browse`
pub async fn browse(config_path: &Path) -> Result<()> {
    let theme = ColorfulTheme::default();

    loop {
        let config = Config::load(config_path)?;
        let items = entries(&config);
        if items.is_empty() {
            println!("Nothing is tracked yet.");
            return Ok(());
        }

        let labels: Vec<String> = items.iter().map(Entry::label).collect();
        let Some(choice) = FuzzySelect::with_theme(&theme)
            .with_prompt("Browse (Esc to quit)")
            .items(&labels)
            .default(0)
            .interact_opt()?
        else {
            return Ok(());
        };

        match &items[choice] {
            Entry::Package(name) => package_menu(config_path, &theme, name, false).await?,
            Entry::Cask(name) => package_menu(config_path, &theme, name, true).await?,
            Entry::Bundle(name) => bundle_menu(config_path, &theme, name).await?,
        }
    }
}

async fn package_menu(config_path: &Path, theme: &ColorfulTheme, name: &str, cask: bool) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let manager = config.manager()?;

    if !cask {
        match manager.info(name).await {
            Ok(info) => println!("\n{}", info.trim()),
            Err(e) => ui::warn(format!("No info for {}: {}", name, e)),
        }
    }

    let actions = ["Install", "Untrack", "Back"];
    let Some(action) = Select::with_theme(theme)
        .with_prompt(name)
        .items(&actions)
        .default(2)
        .interact_opt()?
    else {
        return Ok(());
    };

    let names = vec![name.to_string()];
    match action {
        0 if cask => manager.install_casks(&names).await?,
        0 => manager.install(&names).await?,
        1 => {
            let list = if cask { &mut config.casks } else { &mut config.packages };
            if remove_item(list, name) {
                config.commit(config_path)?;
                ui::success(format!("Untracked {}", name));
            }
        }
        _ => {}
    }
    Ok(())
}

async fn bundle_menu(config_path: &Path, theme: &ColorfulTheme, name: &str) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let dotfiles_dir = config.paths.dotfiles_dir()?;
    let target_dir = config.paths.target_dir()?;
    let bundle_dir = dotfiles_dir.join(name);

    let state = if !bundle_dir.is_dir() {
        "missing on disk"
    } else if stow::is_stowed(&bundle_dir, &target_dir) {
        "stowed"
    } else {
        "not stowed"
    };
    println!("\n{} → {} ({})", name, bundle_dir.display(), state);

    let actions = ["Stow (back up conflicts)", "Unstow", "Back"];
    let Some(action) = Select::with_theme(theme)
        .with_prompt(name)
        .items(&actions)
        .default(2)
        .interact_opt()?
    else {
        return Ok(());
    };

    match action {
        0 => {
            let bundles = vec![name.to_string()];
            dotfiles::stow_bundles(config_path, &mut config, &bundles, ConflictStrategy::Backup, false)
                .await?;
        }
        1 => {
            stow::run_stow(&dotfiles_dir, &target_dir, name, StowAction::Delete).await?;
            ui::success(format!("Unstowed {}", name));
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_order() {
        let config = Config {
            packages: vec!["git".into()],
            casks: vec!["wezterm".into()],
            bundles: vec!["zsh".into()],
            ..Default::default()
        };
        assert_eq!(
            entries(&config),
            vec![
                Entry::Package("git".into()),
                Entry::Cask("wezterm".into()),
                Entry::Bundle("zsh".into()),
            ]
        );
        assert!(Entry::Bundle("zsh".into()).label().contains("bundle"));
    }
}
