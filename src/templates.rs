use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{Config, add_unique};
use crate::{packages, ui};

/// Package sets shipped with stowaway
const BUILTIN: &[(&str, &[&str])] = &[
    (
        "essentials",
        &["git", "curl", "wget", "stow", "tmux", "htop", "jq", "tree"],
    ),
    (
        "developer",
        &["git", "neovim", "ripgrep", "fd", "fzf", "bat", "gh", "direnv"],
    ),
    ("rust", &["rustup", "cargo-watch", "sccache"]),
    ("python", &["python", "pipx", "uv", "ruff"]),
    ("node", &["node", "pnpm", "yarn"]),
    (
        "devops",
        &["docker", "kubectl", "helm", "terraform", "awscli", "k9s"],
    ),
];

/// Where a template comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Builtin,
    User,
}

/// All templates, user templates shadowing built-ins of the same name
pub fn all(config: &Config) -> BTreeMap<String, (Origin, Vec<String>)> {
    let mut templates: BTreeMap<String, (Origin, Vec<String>)> = BUILTIN
        .iter()
        .map(|(name, pkgs)| {
            (
                name.to_string(),
                (Origin::Builtin, pkgs.iter().map(|p| p.to_string()).collect()),
            )
        })
        .collect();

    for (name, pkgs) in &config.templates {
        templates.insert(name.clone(), (Origin::User, pkgs.clone()));
    }
    templates
}

pub fn find(config: &Config, name: &str) -> Result<Vec<String>> {
    match all(config).remove(name) {
        Some((_, pkgs)) => Ok(pkgs),
        None => anyhow::bail!(
            "Unknown template '{}'. Run 'stowaway template list' to see available templates.",
            name
        ),
    }
}

/// Merge a template's packages into the config, returning the new ones
pub fn apply_to(config: &mut Config, name: &str) -> Result<Vec<String>> {
    let mut added = Vec::new();
    for pkg in find(config, name)? {
        if add_unique(&mut config.packages, &pkg) {
            added.push(pkg);
        }
    }
    Ok(added)
}

/// `stowaway template list`
pub async fn list(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;

    ui::header("Templates");
    for (name, (origin, pkgs)) in all(&config) {
        let tag = match origin {
            Origin::Builtin => console::style("built-in").dim(),
            Origin::User => console::style("user").cyan(),
        };
        println!("  {} [{}] {} package(s)", console::style(&name).bold(), tag, pkgs.len());
    }
    Ok(())
}

/// `stowaway template show`
pub async fn show(config_path: &Path, name: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let pkgs = find(&config, name)?;

    ui::header(format!("Template {}", name));
    for pkg in pkgs {
        let mark = if config.packages.contains(&pkg) { "✓" } else { " " };
        println!("  {} {}", mark, pkg);
    }
    Ok(())
}

/// `stowaway template apply`
pub async fn apply(config_path: &Path, name: &str, install: bool) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let added = apply_to(&mut config, name)?;

    if added.is_empty() {
        ui::success(format!("Every package of '{}' is already tracked", name));
        return Ok(());
    }

    config.commit(config_path)?;
    ui::success(format!(
        "Applied template '{}': {} new package(s)",
        name,
        added.len()
    ));

    if install {
        packages::install_all(&config).await?;
    }
    Ok(())
}

/// `stowaway template save`
pub async fn save(config_path: &Path, name: &str) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if config.packages.is_empty() {
        anyhow::bail!("No packages tracked; nothing to save as a template");
    }

    let pkgs = config.packages.clone();
    let count = pkgs.len();
    config.templates.insert(name.to_string(), pkgs);
    config.commit(config_path)?;

    ui::success(format!("Saved template '{}' with {} package(s)", name, count));
    Ok(())
}

/// `stowaway template delete`
pub async fn delete(config_path: &Path, name: &str) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if config.templates.remove(name).is_none() {
        anyhow::bail!("'{}' is not a user template", name);
    }
    config.commit(config_path)?;
    ui::success(format!("Deleted template '{}'", name));
    Ok(())
}
