use anyhow::{Context, Result};
use dialoguer::{MultiSelect, theme::ColorfulTheme};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::{Config, add_unique, remove_item};
use crate::hooks::{self, HookEvent};
use crate::stow::{self, ConflictStrategy, StowAction, StowError};
use crate::ui;

/// Home entries never offered for import
const IMPORT_IGNORE: &[&str] = &[
    ".cache",
    ".local",
    ".ssh",
    ".gnupg",
    ".Trash",
    ".DS_Store",
    ".stowaway",
    ".git",
    ".npm",
    ".cargo",
    ".rustup",
    ".docker",
    ".vscode-server",
    ".bash_history",
    ".zsh_history",
    ".python_history",
    ".node_repl_history",
    ".lesshst",
    ".viminfo",
    ".Xauthority",
    ".ICEauthority",
    ".xsession-errors",
    ".sudo_as_admin_successful",
];

/// Stow bundles into the target directory, tracking them in `config`.
///
/// Every bundle is checked before anything is linked: it must exist and,
/// under [`ConflictStrategy::Abort`], be free of conflicts. Tracking is
/// saved to `config_path` after each stowed bundle so a later failure keeps
/// what already happened on disk. A dry run saves nothing.
pub async fn stow_bundles(
    config_path: &Path,
    config: &mut Config,
    bundles: &[String],
    strategy: ConflictStrategy,
    dry_run: bool,
) -> Result<()> {
    let dotfiles_dir = config.paths.dotfiles_dir()?;
    let target_dir = config.paths.target_dir()?;
    let backup_dir = stow::backup_session_dir(&config.paths.backup_dir()?);

    for bundle in bundles {
        let bundle_dir = dotfiles_dir.join(bundle);
        if !bundle_dir.is_dir() {
            return Err(StowError::MissingBundle {
                bundle: bundle.clone(),
                dotfiles_dir: dotfiles_dir.clone(),
            }
            .into());
        }
        if strategy == ConflictStrategy::Abort {
            let conflicts = stow::find_conflicts(&bundle_dir, &target_dir)?;
            if !conflicts.is_empty() {
                report_conflicts(bundle, &conflicts, strategy);
                return Err(StowError::Conflicts {
                    bundle: bundle.clone(),
                    conflicts,
                }
                .into());
            }
        }
    }

    if !dry_run {
        stow::check_stow_available()?;
        hooks::run_hooks(config, HookEvent::PreStow, Some(&dotfiles_dir)).await?;
    }

    for bundle in bundles {
        let bundle_dir = dotfiles_dir.join(bundle);

        // earlier bundles may have changed the target, so look again
        let conflicts = stow::find_conflicts(&bundle_dir, &target_dir)?;
        report_conflicts(bundle, &conflicts, strategy);

        let resolution =
            stow::resolve_conflicts(bundle, &conflicts, strategy, &backup_dir, dry_run)?;
        if !resolution.backed_up.is_empty() && !dry_run {
            ui::info(format!(
                "Backed up {} path(s) to {}",
                resolution.backed_up.len(),
                ui::path(&backup_dir)
            ));
        }

        let action = stow_action(&bundle_dir, &target_dir);

        if dry_run {
            ui::dry_run(format!(
                "Would {} '{}' into {}",
                if action == StowAction::Restow { "restow" } else { "stow" },
                bundle,
                target_dir.display()
            ));
            continue;
        }

        stow::run_stow(&dotfiles_dir, &target_dir, bundle, action).await?;
        ui::success(format!("Stowed {}", bundle));

        if add_unique(&mut config.bundles, bundle) {
            config.commit(config_path)?;
        }
    }

    if !dry_run {
        hooks::run_hooks(config, HookEvent::PostStow, Some(&dotfiles_dir)).await?;
    }

    Ok(())
}

/// Restow a bundle that is already linked, stow it otherwise
fn stow_action(bundle_dir: &Path, target_dir: &Path) -> StowAction {
    if stow::is_stowed(bundle_dir, target_dir) {
        StowAction::Restow
    } else {
        StowAction::Stow
    }
}

fn report_conflicts(bundle: &str, conflicts: &[stow::Conflict], strategy: ConflictStrategy) {
    if conflicts.is_empty() {
        return;
    }
    ui::warn(format!(
        "{} conflict(s) for bundle '{}' (strategy: {:?})",
        conflicts.len(),
        bundle,
        strategy
    ));
    for conflict in conflicts {
        let note = if conflict.identical { ", identical" } else { "" };
        ui::item(format!(
            "{} ({}{})",
            conflict.target.display(),
            conflict.kind,
            note
        ));
    }
}

/// `stowaway stow`
pub async fn stow(
    config_path: &Path,
    bundles: Vec<String>,
    strategy: ConflictStrategy,
    dry_run: bool,
) -> Result<()> {
    let mut config = Config::load(config_path)?;

    let bundles = if bundles.is_empty() {
        config.bundles.clone()
    } else {
        bundles
    };
    if bundles.is_empty() {
        println!("No bundles to stow.");
        println!("Use 'stowaway stow <bundle>' or 'stowaway import <path>' first.");
        return Ok(());
    }

    stow_bundles(config_path, &mut config, &bundles, strategy, dry_run).await
}

/// `stowaway unstow`
pub async fn unstow(config_path: &Path, bundles: Vec<String>, forget: bool) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let dotfiles_dir = config.paths.dotfiles_dir()?;
    let target_dir = config.paths.target_dir()?;

    let mut changed = false;
    for bundle in &bundles {
        if dotfiles_dir.join(bundle).is_dir() {
            stow::run_stow(&dotfiles_dir, &target_dir, bundle, StowAction::Delete).await?;
            ui::success(format!("Unstowed {}", bundle));
        } else {
            ui::warn(format!("Bundle '{}' not found on disk", bundle));
        }

        if forget && remove_item(&mut config.bundles, bundle) {
            ui::info(format!("Stopped tracking {}", bundle));
            changed = true;
        }
    }

    if changed {
        config.commit(config_path)?;
    }
    Ok(())
}

/// `stowaway bundles`: on-disk bundles and what is tracked
pub async fn bundles(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let dotfiles_dir = config.paths.dotfiles_dir()?;
    let target_dir = config.paths.target_dir()?;

    let mut names = stow::bundles_on_disk(&dotfiles_dir)?;
    for tracked in &config.bundles {
        add_unique(&mut names, tracked);
    }

    if names.is_empty() {
        println!("No bundles found in {}", dotfiles_dir.display());
        return Ok(());
    }

    ui::header(format!("Bundles in {}", dotfiles_dir.display()));
    for name in names {
        let bundle_dir = dotfiles_dir.join(&name);
        let status = if !bundle_dir.is_dir() {
            "✗ missing"
        } else if stow::is_stowed(&bundle_dir, &target_dir) {
            "✓ stowed"
        } else {
            "○ not stowed"
        };
        let tracked = if config.bundles.contains(&name) {
            ""
        } else {
            " (untracked)"
        };
        println!("  {} {}{}", status, name, tracked);
    }
    Ok(())
}

/// `stowaway import`: move loose dotfiles into bundles and link them back
pub async fn import(
    config_path: &Path,
    paths: Vec<PathBuf>,
    bundle: Option<String>,
    scan: bool,
    all: bool,
    dry_run: bool,
) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let dotfiles_dir = config.paths.dotfiles_dir()?;
    let home = config.paths.target_dir()?;

    let candidates = if scan {
        let ignore = [
            config.paths.stowaway_dir()?,
            config.paths.backup_dir()?,
            config.paths.snapshots_dir()?,
        ];
        let loose = find_loose_dotfiles(&home, &dotfiles_dir, &ignore)?;
        if loose.is_empty() {
            ui::success("No loose dotfiles found");
            return Ok(());
        }
        if all {
            loose
        } else {
            prompt_import_selection(&home, loose)?
        }
    } else {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        paths
            .iter()
            .map(|p| absolute_import_path(&cwd, p))
            .collect()
    };

    if candidates.is_empty() {
        log::info!("Nothing selected to import");
        return Ok(());
    }

    let mut touched: Vec<String> = Vec::new();

    for path in &candidates {
        let relative = path
            .strip_prefix(&home)
            .with_context(|| format!("{} is not inside {}", path.display(), home.display()))?;
        let name = match &bundle {
            Some(name) => name.clone(),
            None => bundle_name_for(relative)
                .with_context(|| format!("Cannot derive a bundle name for {}", path.display()))?,
        };

        if dry_run {
            ui::dry_run(format!(
                "Would import {} into {}",
                path.display(),
                dotfiles_dir.join(&name).join(relative).display()
            ));
        } else {
            let dest = import_path(&home, &dotfiles_dir, path, &name)?;
            ui::success(format!("Imported {} → {}", path.display(), ui::path(&dest)));
        }
        add_unique(&mut touched, &name);
    }

    if dry_run {
        return Ok(());
    }

    for name in &touched {
        add_unique(&mut config.bundles, name);
    }
    config.commit(config_path)?;

    if stow::check_stow_available().is_ok() {
        for name in &touched {
            stow::run_stow(&dotfiles_dir, &home, name, StowAction::Restow).await?;
        }
        ui::success(format!("Restowed {}", touched.join(", ")));
    } else {
        ui::warn("stow not found; imported paths are linked but not restowed");
    }

    Ok(())
}

/// `path` made absolute against `cwd`, with `.` and `..` collapsed
fn absolute_import_path(cwd: &Path, path: &Path) -> PathBuf {
    stow::normalize(&cwd.join(path))
}

fn prompt_import_selection(home: &Path, loose: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let items: Vec<String> = loose
        .iter()
        .map(|p| {
            let relative = p.strip_prefix(home).unwrap_or(p);
            let bundle = bundle_name_for(relative).unwrap_or_else(|| "?".to_string());
            format!("{}  → {}", relative.display(), bundle)
        })
        .collect();

    println!("\nSelect dotfiles to import:");
    println!("(Use Space to select/deselect, Enter to confirm)");

    let selections = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Import")
        .items(&items)
        .interact()?;

    Ok(selections.into_iter().map(|i| loose[i].clone()).collect())
}

/// Derive a bundle name from a path relative to home.
///
/// `.config/<app>/..` maps to `<app>` unchanged and a file directly under
/// `.config` to its stem. Anything else uses the first component with its
/// leading dots, any suffix after `.`, `_` or `-`, and a trailing `rc`
/// removed.
pub fn bundle_name_for(relative: &Path) -> Option<String> {
    let components: Vec<&std::ffi::OsStr> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect();

    match components.as_slice() {
        [first, app, _, ..] if *first == ".config" => {
            return Some(app.to_string_lossy().into_owned());
        }
        [first, file] if *first == ".config" => {
            return Path::new(file)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .filter(|stem| !stem.is_empty());
        }
        _ => {}
    }

    let first = components.first()?.to_string_lossy();
    let trimmed = first.trim_start_matches('.');
    let stem = trimmed
        .split(['.', '_', '-'])
        .next()
        .unwrap_or(trimmed)
        .to_lowercase();
    let name = match stem.strip_suffix("rc") {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => stem,
    };

    if name.is_empty() { None } else { Some(name) }
}

/// Move `path` into `dotfiles_dir/bundle`, keeping its layout relative to
/// `home`, and leave a relative symlink in its place.
pub fn import_path(home: &Path, dotfiles_dir: &Path, path: &Path, bundle: &str) -> Result<PathBuf> {
    let relative = path
        .strip_prefix(home)
        .with_context(|| format!("{} is not inside {}", path.display(), home.display()))?;

    let meta = fs::symlink_metadata(path)
        .with_context(|| format!("{} does not exist", path.display()))?;
    if meta.file_type().is_symlink() {
        anyhow::bail!("{} is already a symlink", path.display());
    }

    let dest = dotfiles_dir.join(bundle).join(relative);
    if fs::symlink_metadata(&dest).is_ok() {
        anyhow::bail!(
            "{} already exists in bundle '{}'",
            relative.display(),
            bundle
        );
    }

    stow::move_path(path, &dest)?;

    let parent = path.parent().context("Imported path has no parent")?;
    let link = relative_path(parent, &dest);
    stow::symlink(&link, path)
        .with_context(|| format!("Failed to link {} back", path.display()))?;

    log::debug!("Linked {} -> {}", path.display(), link.display());
    Ok(dest)
}

/// Path to `to` as seen from directory `from`, both absolute
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to_components: Vec<Component> = to.components().collect();

    let common = from
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to_components[common..] {
        out.push(component.as_os_str());
    }
    out
}

/// Real files and directories in home that look like unmanaged dotfiles.
///
/// Entries that are, or contain, the dotfiles dir or any `ignore` path are
/// skipped along with the built-in ignore list.
pub fn find_loose_dotfiles(
    home: &Path,
    dotfiles_dir: &Path,
    ignore: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let managed = |path: &Path| {
        holds(path, dotfiles_dir) || ignore.iter().any(|dir| holds(path, dir))
    };

    let mut loose = Vec::new();

    for entry in fs::read_dir(home).with_context(|| format!("Failed to read {}", home.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();

        if !name.starts_with('.') || is_import_ignored(&name) || managed(&path) {
            continue;
        }
        if entry.file_type()?.is_symlink() {
            continue;
        }

        if name == ".config" {
            for child in fs::read_dir(&path)? {
                let child = child?;
                if child.file_type()?.is_symlink() || managed(&child.path()) {
                    continue;
                }
                loose.push(child.path());
            }
            continue;
        }

        loose.push(path);
    }

    loose.sort();
    Ok(loose)
}

fn is_import_ignored(name: &str) -> bool {
    IMPORT_IGNORE.contains(&name) || name.starts_with(".zcompdump")
}

/// `path` is `dir` or one of its ancestors
fn holds(path: &Path, dir: &Path) -> bool {
    dir.starts_with(path)
}
