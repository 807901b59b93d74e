use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::exec::CommandLine;
use crate::hooks::{self, HookEvent};
use crate::ui;

fn git(repo_path: &Path) -> CommandLine {
    CommandLine::new("git")
        .arg("-C")
        .arg(repo_path.display().to_string())
}

/// Clone a git repository to the specified path
pub async fn clone(url: &str, target: &Path) -> Result<()> {
    log::info!("Cloning git repository: {}", url);
    log::debug!("Target path: {}", target.display());

    // Check if target already exists
    if target.join(".git").exists() {
        log::warn!("Repository already exists: {}", target.display());
        return Ok(());
    }

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create parent directory")?;
    }

    let spinner = ui::spinner(format!("Cloning {}", url));
    let result = CommandLine::new("git")
        .arg("clone")
        .arg(url)
        .arg(target.display().to_string())
        .output(None)
        .await;
    spinner.finish_and_clear();
    result.context("Git clone failed")?;

    log::info!("✓ Repository cloned successfully");

    if target.join(".gitmodules").exists() {
        log::info!("Found .gitmodules file, initializing submodules...");
        git(target)
            .args(["submodule", "update", "--init", "--recursive"])
            .output(None)
            .await
            .context("Git submodule update failed")?;
        log::info!("✓ Submodules initialized and updated");
    }

    Ok(())
}

/// Pull latest changes from a git repository
pub async fn pull(repo_path: &Path) -> Result<()> {
    log::info!("Pulling latest changes: {}", repo_path.display());

    if !repo_path.join(".git").exists() {
        anyhow::bail!("Not a git repository: {}", repo_path.display());
    }

    git(repo_path)
        .args(["pull", "--rebase", "--autostash"])
        .output(None)
        .await
        .context("Git pull failed")?;

    if repo_path.join(".gitmodules").exists() {
        log::info!("Updating submodules...");
        git(repo_path)
            .args(["submodule", "update", "--init", "--recursive"])
            .output(None)
            .await
            .context("Git submodule update failed")?;
    }

    log::info!("✓ Repository updated successfully");
    Ok(())
}

/// Initialise a repository if none exists
pub async fn init_repo(repo_path: &Path) -> Result<()> {
    if repo_path.join(".git").exists() {
        return Ok(());
    }
    tokio::fs::create_dir_all(repo_path)
        .await
        .context("Failed to create repository directory")?;
    git(repo_path).arg("init").output(None).await?;
    log::info!("Initialised git repository in {}", repo_path.display());
    Ok(())
}

/// Check if git is available on the system
pub async fn check_git_available() -> Result<()> {
    let version = CommandLine::new("git")
        .arg("--version")
        .output(None)
        .await
        .context("Failed to check git version. Is git installed?")?;
    log::debug!("Git version: {}", version.trim());
    Ok(())
}

/// Short status of a repository, empty when clean
pub async fn status(repo_path: &Path) -> Result<String> {
    git(repo_path)
        .args(["status", "--short"])
        .output(None)
        .await
        .context("Git status failed")
}

/// Stage and commit everything. Returns false when there was nothing to commit.
pub async fn commit_all(repo_path: &Path, message: &str) -> Result<bool> {
    if status(repo_path).await?.trim().is_empty() {
        return Ok(false);
    }
    git(repo_path).args(["add", "--all"]).output(None).await?;
    git(repo_path)
        .args(["commit", "--quiet", "-m", message])
        .output(None)
        .await
        .context("Git commit failed")?;
    Ok(true)
}

/// Whether the current branch has an upstream configured
pub async fn has_remote(repo_path: &Path) -> bool {
    git(repo_path)
        .args(["remote"])
        .output(None)
        .await
        .is_ok_and(|out| !out.trim().is_empty())
}

pub async fn push(repo_path: &Path) -> Result<()> {
    git(repo_path)
        .arg("push")
        .status(None)
        .await
        .context("Git push failed")
}

pub fn default_commit_message() -> String {
    format!(
        "stowaway sync {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    )
}

/// `stowaway git status`
pub async fn status_cmd(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let repo = config.paths.dotfiles_dir()?;
    check_git_available().await?;

    let changes = status(&repo).await?;
    if changes.trim().is_empty() {
        ui::success(format!("{} is clean", repo.display()));
    } else {
        ui::header(format!("Changes in {}", repo.display()));
        print!("{}", changes);
    }
    Ok(())
}

/// `stowaway git sync`: pull, commit local changes, push
pub async fn sync(config_path: &Path, message: Option<String>) -> Result<()> {
    let config = Config::load(config_path)?;
    let repo = config.paths.dotfiles_dir()?;
    check_git_available().await?;

    hooks::run_hooks(&config, HookEvent::PreSync, Some(&repo)).await?;

    let remote = has_remote(&repo).await;
    if remote {
        let spinner = ui::spinner("Pulling dotfiles");
        let result = pull(&repo).await;
        spinner.finish_and_clear();
        result?;
    }

    let message = message.unwrap_or_else(default_commit_message);
    if commit_all(&repo, &message).await? {
        ui::success(format!("Committed: {}", message));
    } else {
        ui::info("Nothing to commit");
    }

    if remote {
        push(&repo).await?;
        ui::success("Pushed dotfiles");
    } else {
        ui::warn("No git remote configured; skipped pull and push");
    }

    hooks::run_hooks(&config, HookEvent::PostSync, Some(&repo)).await
}

/// `stowaway git clone`
pub async fn clone_cmd(config_path: &Path, url: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let repo = config.paths.dotfiles_dir()?;
    check_git_available().await?;

    if repo.exists() && !repo.join(".git").exists() {
        let mut entries = tokio::fs::read_dir(&repo).await?;
        if entries.next_entry().await?.is_some() {
            anyhow::bail!(
                "{} exists and is not empty; move it away before cloning",
                repo.display()
            );
        }
        tokio::fs::remove_dir(&repo).await?;
    }

    clone(url, &repo).await?;
    ui::success(format!("Cloned {} into {}", url, ui::path(&repo)));
    Ok(())
}
