//! GNU Stow orchestration with conflict detection
//!
//! Stow refuses to link a bundle when a real file already sits where one of
//! its symlinks should go. This module finds those collisions up front and
//! resolves them according to a [`ConflictStrategy`] before stow runs.
//!
//! # Conflict rules
//!
//! For each entry of a bundle, the matching path in the target directory is
//! inspected:
//!
//! - missing: no conflict, stow will create the link (folding directories)
//! - a symlink resolving to the bundle entry: already stowed
//! - a symlink resolving anywhere inside the stow directory: left to stow,
//!   which unfolds links owned by other bundles itself
//! - a real directory where the bundle has a directory: descend into it
//! - anything else: a [`Conflict`]
//!
//! # Backups
//!
//! Backed up paths keep their layout relative to the target directory:
//!
//! ```text
//! ~/.stowaway/backups/20250101-120000/.config/nvim/init.lua
//! ```

use anyhow::Context;
use clap::ValueEnum;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::exec::{CommandLine, program_exists};

/// Names inside a bundle that are never linked
const IGNORED: &[&str] = &[".git", ".gitignore", ".stow-local-ignore", ".DS_Store"];

#[derive(Debug, thiserror::Error)]
pub enum StowError {
    #[error("bundle '{bundle}' does not exist in {}", .dotfiles_dir.display())]
    MissingBundle { bundle: String, dotfiles_dir: PathBuf },
    #[error("{} path(s) block stowing '{bundle}':\n{}", .conflicts.len(), describe(.conflicts))]
    Conflicts {
        bundle: String,
        conflicts: Vec<Conflict>,
    },
    #[error("GNU stow is not installed or not on PATH")]
    StowMissing,
    #[error("stow failed for '{bundle}': {message}")]
    StowFailed { bundle: String, message: String },
    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What occupies the target path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    File,
    Directory,
    ForeignSymlink,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::File => write!(f, "file"),
            ConflictKind::Directory => write!(f, "directory"),
            ConflictKind::ForeignSymlink => write!(f, "symlink"),
        }
    }
}

/// A pre-existing path that stow would collide with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Path relative to both the bundle and the target directory
    pub relative: PathBuf,
    /// Entry inside the bundle
    pub source: PathBuf,
    /// Existing path in the target directory
    pub target: PathBuf,
    pub kind: ConflictKind,
    /// Regular file with the same bytes as the bundle copy
    pub identical: bool,
}

fn describe(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("  {} ({})", c.target.display(), c.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

/// How conflicts are handled before stowing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ConflictStrategy {
    /// Refuse to stow and list the conflicts
    #[default]
    Abort,
    /// Move conflicting paths into the backup directory
    Backup,
    /// Move conflicting files into the bundle, replacing the bundle copy
    Adopt,
    /// Drop identical files, back up everything else
    Auto,
}

/// What [`resolve_conflicts`] did
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// (original path, backup path)
    pub backed_up: Vec<(PathBuf, PathBuf)>,
    /// Target paths moved into the bundle
    pub adopted: Vec<PathBuf>,
    /// Identical target files deleted
    pub removed: Vec<PathBuf>,
}

/// Stow operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StowAction {
    Stow,
    Restow,
    Delete,
}

/// Find every path in `target_dir` that blocks linking `bundle_dir`.
///
/// The stow directory is the bundle's parent.
pub fn find_conflicts(bundle_dir: &Path, target_dir: &Path) -> Result<Vec<Conflict>, StowError> {
    let stow_dir = bundle_dir.parent().unwrap_or(bundle_dir);
    let mut conflicts = Vec::new();

    let mut walker = WalkDir::new(bundle_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e.file_name()));

    while let Some(entry) = walker.next() {
        let entry = entry?;
        let source = entry.path();
        let relative = source
            .strip_prefix(bundle_dir)
            .map_err(|e| std::io::Error::other(e.to_string()))?
            .to_path_buf();
        let target = target_dir.join(&relative);
        let is_dir = entry.file_type().is_dir();

        let Ok(meta) = fs::symlink_metadata(&target) else {
            // Nothing there: stow links it, folding whole directories
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        };

        if meta.file_type().is_symlink() {
            // stow unfolds a directory link into a sibling bundle; file links
            // into other bundles still block it
            let unfoldable = is_dir && target.is_dir() && resolves_inside(&target, stow_dir);
            if resolves_to(&target, source) || unfoldable {
                log::debug!("Already linked by stow: {}", target.display());
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }
            conflicts.push(Conflict {
                relative,
                source: source.to_path_buf(),
                target,
                kind: ConflictKind::ForeignSymlink,
                identical: false,
            });
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        if is_dir {
            if meta.is_dir() {
                continue;
            }
            // A file sits where the bundle needs a directory
            conflicts.push(Conflict {
                relative,
                source: source.to_path_buf(),
                target,
                kind: ConflictKind::File,
                identical: false,
            });
            walker.skip_current_dir();
            continue;
        }

        if meta.is_dir() {
            conflicts.push(Conflict {
                relative,
                source: source.to_path_buf(),
                target,
                kind: ConflictKind::Directory,
                identical: false,
            });
        } else {
            let identical = files_identical(source, &target)?;
            conflicts.push(Conflict {
                relative,
                source: source.to_path_buf(),
                target,
                kind: ConflictKind::File,
                identical,
            });
        }
    }

    Ok(conflicts)
}

/// Resolve conflicts so stow can run. Backups land under `backup_dir`,
/// which should be unique per run (see [`backup_session_dir`]).
pub fn resolve_conflicts(
    bundle: &str,
    conflicts: &[Conflict],
    strategy: ConflictStrategy,
    backup_dir: &Path,
    dry_run: bool,
) -> Result<Resolution, StowError> {
    let mut resolution = Resolution::default();

    if conflicts.is_empty() {
        return Ok(resolution);
    }

    if strategy == ConflictStrategy::Abort {
        return Err(StowError::Conflicts {
            bundle: bundle.to_string(),
            conflicts: conflicts.to_vec(),
        });
    }

    for conflict in conflicts {
        let adopt = strategy == ConflictStrategy::Adopt
            && conflict.kind == ConflictKind::File
            && !conflict.source.is_dir();
        let drop = strategy == ConflictStrategy::Auto && conflict.identical;

        if adopt {
            if dry_run {
                crate::ui::dry_run(format!(
                    "Would adopt {} into {}",
                    conflict.target.display(),
                    conflict.source.display()
                ));
            } else {
                // rename and copy both replace the bundle file in place
                move_path(&conflict.target, &conflict.source)?;
                log::info!("Adopted {}", conflict.target.display());
            }
            resolution.adopted.push(conflict.target.clone());
        } else if drop {
            if dry_run {
                crate::ui::dry_run(format!(
                    "Would remove identical {}",
                    conflict.target.display()
                ));
            } else {
                fs::remove_file(&conflict.target)?;
                log::info!("Removed identical {}", conflict.target.display());
            }
            resolution.removed.push(conflict.target.clone());
        } else {
            let destination = backup_path(backup_dir, &conflict.relative);
            if dry_run {
                crate::ui::dry_run(format!(
                    "Would back up {} to {}",
                    conflict.target.display(),
                    destination.display()
                ));
            } else {
                move_path(&conflict.target, &destination)?;
                log::info!(
                    "Backed up {} to {}",
                    conflict.target.display(),
                    destination.display()
                );
            }
            resolution
                .backed_up
                .push((conflict.target.clone(), destination));
        }
    }

    Ok(resolution)
}

/// Timestamped directory for one run's backups
pub fn backup_session_dir(backup_root: &Path) -> PathBuf {
    backup_root.join(chrono::Local::now().format("%Y%m%d-%H%M%S").to_string())
}

/// Where a conflicting path is backed up
pub fn backup_path(backup_dir: &Path, relative: &Path) -> PathBuf {
    backup_dir.join(relative)
}

/// Move a file or directory, copying across filesystems when rename fails
pub fn move_path(from: &Path, to: &Path) -> Result<(), StowError> {
    let wrap = |source: std::io::Error| StowError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }

    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    log::debug!("rename failed, copying {} to {}", from.display(), to.display());
    let meta = fs::symlink_metadata(from).map_err(wrap)?;
    if meta.is_dir() {
        copy_dir(from, to)?;
        fs::remove_dir_all(from).map_err(wrap)?;
    } else if meta.file_type().is_symlink() {
        let link = fs::read_link(from).map_err(wrap)?;
        symlink(&link, to).map_err(wrap)?;
        fs::remove_file(from).map_err(wrap)?;
    } else {
        fs::copy(from, to).map_err(wrap)?;
        fs::remove_file(from).map_err(wrap)?;
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), StowError> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let dest = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
        } else if file_type.is_symlink() {
            symlink(&fs::read_link(entry.path())?, &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
pub fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
pub fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    }
}

/// Every file in the bundle is reachable through symlinks from the target
pub fn is_stowed(bundle_dir: &Path, target_dir: &Path) -> bool {
    let mut files = 0;

    for entry in WalkDir::new(bundle_dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.file_name()))
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
    {
        files += 1;
        let Ok(relative) = entry.path().strip_prefix(bundle_dir) else {
            return false;
        };
        if !resolves_to(&target_dir.join(relative), entry.path()) {
            return false;
        }
    }

    files > 0
}

/// Bundle directories present in the dotfiles directory
pub fn bundles_on_disk(dotfiles_dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut bundles = Vec::new();
    if !dotfiles_dir.exists() {
        return Ok(bundles);
    }

    for entry in fs::read_dir(dotfiles_dir)
        .with_context(|| format!("Failed to read {}", dotfiles_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with('.') && entry.path().is_dir() {
            bundles.push(name);
        }
    }
    bundles.sort();
    Ok(bundles)
}

pub fn stow_command(
    dotfiles_dir: &Path,
    target_dir: &Path,
    bundle: &str,
    action: StowAction,
) -> CommandLine {
    let flag = match action {
        StowAction::Stow => "--stow",
        StowAction::Restow => "--restow",
        StowAction::Delete => "--delete",
    };
    CommandLine::new("stow")
        .arg(format!("--dir={}", dotfiles_dir.display()))
        .arg(format!("--target={}", target_dir.display()))
        .arg(flag)
        .arg(bundle)
}

pub fn check_stow_available() -> Result<(), StowError> {
    if program_exists("stow") {
        Ok(())
    } else {
        Err(StowError::StowMissing)
    }
}

/// Run stow for one bundle
pub async fn run_stow(
    dotfiles_dir: &Path,
    target_dir: &Path,
    bundle: &str,
    action: StowAction,
) -> Result<(), StowError> {
    check_stow_available()?;
    stow_command(dotfiles_dir, target_dir, bundle, action)
        .output(None)
        .await
        .map(|_| ())
        .map_err(|e| StowError::StowFailed {
            bundle: bundle.to_string(),
            message: e.to_string(),
        })
}

fn is_ignored(name: &std::ffi::OsStr) -> bool {
    IGNORED.iter().any(|ignored| name == *ignored)
}

/// Whether `link` resolves to the same file as `source`
fn resolves_to(link: &Path, source: &Path) -> bool {
    match (fs::canonicalize(link), fs::canonicalize(source)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether the symlink at `link` points somewhere under `dir`
fn resolves_inside(link: &Path, dir: &Path) -> bool {
    let Ok(dir) = fs::canonicalize(dir) else {
        return false;
    };
    if let Ok(resolved) = fs::canonicalize(link) {
        return resolved.starts_with(&dir);
    }
    // Dangling link, compare lexically
    match fs::read_link(link) {
        Ok(dest) => {
            let dest = match link.parent() {
                Some(parent) if dest.is_relative() => parent.join(dest),
                _ => dest,
            };
            normalize(&dest).starts_with(&dir)
        }
        Err(_) => false,
    }
}

/// Collapse `.` and `..` without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

fn files_identical(a: &Path, b: &Path) -> std::io::Result<bool> {
    let (ma, mb) = (fs::metadata(a)?, fs::metadata(b)?);
    if !ma.is_file() || !mb.is_file() || ma.len() != mb.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        dotfiles: PathBuf,
        home: PathBuf,
        backups: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let dotfiles = root.join("dotfiles");
        let home = root.join("home");
        let backups = root.join("backups");
        fs::create_dir_all(&dotfiles).unwrap();
        fs::create_dir_all(&home).unwrap();
        Fixture {
            _dir: dir,
            dotfiles,
            home,
            backups,
        }
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_no_conflicts_on_empty_home() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".zshrc"), "export A=1");
        write(&bundle.join(".config/zsh/aliases"), "alias l=ls");

        assert!(find_conflicts(&bundle, &fx.home).unwrap().is_empty());
    }

    #[test]
    fn test_detects_file_conflicts() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".zshrc"), "export A=1");
        write(&bundle.join(".zprofile"), "path");
        write(&fx.home.join(".zshrc"), "export A=1");
        write(&fx.home.join(".zprofile"), "something else");

        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();
        assert_eq!(conflicts.len(), 2);

        let zprofile = conflicts
            .iter()
            .find(|c| c.relative == Path::new(".zprofile"))
            .unwrap();
        assert_eq!(zprofile.kind, ConflictKind::File);
        assert!(!zprofile.identical);

        let zshrc = conflicts
            .iter()
            .find(|c| c.relative == Path::new(".zshrc"))
            .unwrap();
        assert!(zshrc.identical);
    }

    #[test]
    fn test_descends_into_existing_directories() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("nvim");
        write(&bundle.join(".config/nvim/init.lua"), "-- mine");
        write(&fx.home.join(".config/other/file"), "x");
        write(&fx.home.join(".config/nvim/init.lua"), "-- old");

        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].relative, Path::new(".config/nvim/init.lua"));
    }

    #[test]
    fn test_directory_where_file_expected() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("git");
        write(&bundle.join(".gitconfig"), "[user]");
        fs::create_dir_all(fx.home.join(".gitconfig")).unwrap();

        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::Directory);
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_links_are_not_conflicts() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".zshrc"), "export A=1");
        write(&bundle.join(".config/zsh/aliases"), "alias l=ls");
        symlink(&bundle.join(".zshrc"), &fx.home.join(".zshrc")).unwrap();
        fs::create_dir_all(fx.home.join(".config")).unwrap();
        // folded directory link
        symlink(&bundle.join(".config/zsh"), &fx.home.join(".config/zsh")).unwrap();

        assert!(find_conflicts(&bundle, &fx.home).unwrap().is_empty());
        assert!(is_stowed(&bundle, &fx.home));
    }

    #[cfg(unix)]
    #[test]
    fn test_foreign_symlink_conflicts() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".zshrc"), "export A=1");
        let elsewhere = fx.home.join("elsewhere");
        write(&elsewhere, "x");
        symlink(&elsewhere, &fx.home.join(".zshrc")).unwrap();

        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ForeignSymlink);
    }

    #[cfg(unix)]
    #[test]
    fn test_links_into_other_bundles_are_left_to_stow() {
        let fx = fixture();
        let other = fx.dotfiles.join("other");
        write(&other.join(".config/shared/a"), "a");
        let bundle = fx.dotfiles.join("mine");
        write(&bundle.join(".config/shared/b"), "b");
        fs::create_dir_all(fx.home.join(".config")).unwrap();
        symlink(&other.join(".config/shared"), &fx.home.join(".config/shared")).unwrap();

        assert!(find_conflicts(&bundle, &fx.home).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_links_into_other_bundles_conflict() {
        let fx = fixture();
        let a = fx.dotfiles.join("a");
        let b = fx.dotfiles.join("b");
        write(&a.join(".zshrc"), "from a");
        write(&b.join(".zshrc"), "from b");
        symlink(&a.join(".zshrc"), &fx.home.join(".zshrc")).unwrap();

        assert!(find_conflicts(&a, &fx.home).unwrap().is_empty());
        let conflicts = find_conflicts(&b, &fx.home).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ForeignSymlink);
        assert_eq!(conflicts[0].relative, Path::new(".zshrc"));
    }

    #[test]
    fn test_file_where_directory_expected() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("nvim");
        write(&bundle.join(".config/nvim/init.lua"), "-- cfg");
        write(&bundle.join(".config/nvim/lua/plugins.lua"), "-- plugins");
        write(&fx.home.join(".config/nvim"), "not a directory");

        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].relative, Path::new(".config/nvim"));
        assert_eq!(conflicts[0].kind, ConflictKind::File);
        assert!(!conflicts[0].identical);
    }

    #[test]
    fn test_ignored_entries_are_skipped() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".git/HEAD"), "ref");
        write(&bundle.join(".DS_Store"), "");
        write(&fx.home.join(".DS_Store"), "");
        fs::create_dir_all(fx.home.join(".git")).unwrap();

        assert!(find_conflicts(&bundle, &fx.home).unwrap().is_empty());
        assert!(!is_stowed(&bundle, &fx.home));
    }

    #[test]
    fn test_abort_strategy_errors() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".zshrc"), "new");
        write(&fx.home.join(".zshrc"), "old");
        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();

        let err = resolve_conflicts("zsh", &conflicts, ConflictStrategy::Abort, &fx.backups, false)
            .unwrap_err();
        assert!(matches!(err, StowError::Conflicts { .. }));
        assert!(err.to_string().contains(".zshrc"));
        assert!(fx.home.join(".zshrc").exists());
    }

    #[test]
    fn test_backup_strategy_moves_files() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("nvim");
        write(&bundle.join(".config/nvim/init.lua"), "new");
        write(&fx.home.join(".config/nvim/init.lua"), "old");
        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();

        let res = resolve_conflicts("nvim", &conflicts, ConflictStrategy::Backup, &fx.backups, false)
            .unwrap();
        let backup = fx.backups.join(".config/nvim/init.lua");
        assert_eq!(res.backed_up, vec![(fx.home.join(".config/nvim/init.lua"), backup.clone())]);
        assert_eq!(fs::read_to_string(backup).unwrap(), "old");
        assert!(!fx.home.join(".config/nvim/init.lua").exists());
    }

    #[test]
    fn test_auto_strategy_drops_identical_and_backs_up_rest() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".zshrc"), "same");
        write(&bundle.join(".zprofile"), "new");
        write(&fx.home.join(".zshrc"), "same");
        write(&fx.home.join(".zprofile"), "old");
        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();

        let res = resolve_conflicts("zsh", &conflicts, ConflictStrategy::Auto, &fx.backups, false)
            .unwrap();
        assert_eq!(res.removed, vec![fx.home.join(".zshrc")]);
        assert_eq!(res.backed_up.len(), 1);
        assert_eq!(fs::read_to_string(fx.backups.join(".zprofile")).unwrap(), "old");
    }

    #[test]
    fn test_adopt_strategy_moves_into_bundle() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".zshrc"), "template");
        write(&fx.home.join(".zshrc"), "customised");
        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();

        let res = resolve_conflicts("zsh", &conflicts, ConflictStrategy::Adopt, &fx.backups, false)
            .unwrap();
        assert_eq!(res.adopted, vec![fx.home.join(".zshrc")]);
        assert_eq!(fs::read_to_string(bundle.join(".zshrc")).unwrap(), "customised");
        assert!(!fx.home.join(".zshrc").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_adopt_backs_up_non_file_conflicts() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("git");
        write(&bundle.join(".gitconfig"), "[user]");
        write(&bundle.join(".gitignore_global"), "*.swp");
        write(&fx.home.join(".gitconfig/stray"), "x");
        let elsewhere = fx.home.join("elsewhere");
        write(&elsewhere, "y");
        symlink(&elsewhere, &fx.home.join(".gitignore_global")).unwrap();
        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();
        assert_eq!(conflicts.len(), 2);

        let res = resolve_conflicts("git", &conflicts, ConflictStrategy::Adopt, &fx.backups, false)
            .unwrap();
        assert!(res.adopted.is_empty());
        assert_eq!(res.backed_up.len(), 2);
        assert_eq!(fs::read_to_string(bundle.join(".gitconfig")).unwrap(), "[user]");
        assert_eq!(fs::read_to_string(bundle.join(".gitignore_global")).unwrap(), "*.swp");
        assert!(fx.backups.join(".gitconfig/stray").exists());
        assert!(fs::symlink_metadata(fx.backups.join(".gitignore_global"))
            .unwrap()
            .file_type()
            .is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_adopt_keeps_bundle_copy() {
        use std::os::unix::fs::PermissionsExt;

        // permission bits do not bind root
        if nix::unistd::Uid::effective().is_root() {
            return;
        }
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".zshrc"), "template");
        write(&fx.home.join(".zshrc"), "customised");
        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();

        let set_mode = |path: &Path, mode: u32| {
            fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
        };
        set_mode(&fx.home.join(".zshrc"), 0o000);
        set_mode(&fx.home, 0o555);

        let res = resolve_conflicts("zsh", &conflicts, ConflictStrategy::Adopt, &fx.backups, false);

        set_mode(&fx.home, 0o755);
        set_mode(&fx.home.join(".zshrc"), 0o644);

        assert!(matches!(res, Err(StowError::Move { .. })));
        assert_eq!(fs::read_to_string(bundle.join(".zshrc")).unwrap(), "template");
        assert_eq!(fs::read_to_string(fx.home.join(".zshrc")).unwrap(), "customised");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fx = fixture();
        let bundle = fx.dotfiles.join("zsh");
        write(&bundle.join(".zshrc"), "new");
        write(&fx.home.join(".zshrc"), "old");
        let conflicts = find_conflicts(&bundle, &fx.home).unwrap();

        let res = resolve_conflicts("zsh", &conflicts, ConflictStrategy::Backup, &fx.backups, true)
            .unwrap();
        assert_eq!(res.backed_up.len(), 1);
        assert_eq!(fs::read_to_string(fx.home.join(".zshrc")).unwrap(), "old");
        assert!(!fx.backups.exists());
    }

    #[test]
    fn test_move_path_directory() {
        let fx = fixture();
        write(&fx.home.join("dir/a/b.txt"), "b");
        move_path(&fx.home.join("dir"), &fx.backups.join("dir")).unwrap();
        assert!(!fx.home.join("dir").exists());
        assert_eq!(fs::read_to_string(fx.backups.join("dir/a/b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_stow_command_flags() {
        let cmd = stow_command(
            Path::new("/d"),
            Path::new("/h"),
            "zsh",
            StowAction::Restow,
        );
        assert_eq!(
            cmd.to_string(),
            "stow --dir=/d --target=/h --restow zsh"
        );
    }

    #[test]
    fn test_bundles_on_disk_skips_hidden() {
        let fx = fixture();
        fs::create_dir_all(fx.dotfiles.join("zsh")).unwrap();
        fs::create_dir_all(fx.dotfiles.join(".git")).unwrap();
        write(&fx.dotfiles.join("README.md"), "");
        fs::create_dir_all(fx.dotfiles.join("git")).unwrap();

        assert_eq!(bundles_on_disk(&fx.dotfiles).unwrap(), vec!["git", "zsh"]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }
}
