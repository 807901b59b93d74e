//! System package manager abstraction.
//!
//! Each supported manager knows how to build its install, uninstall and
//! listing commands. Building is kept separate from running so the command
//! lines can be inspected (and tested) without touching the system.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::exec::{CommandLine, program_exists};

/// Supported package managers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ManagerKind {
    Brew,
    Pacman,
    Apt,
    Yum,
}

impl std::fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagerKind::Brew => write!(f, "brew"),
            ManagerKind::Pacman => write!(f, "pacman"),
            ManagerKind::Apt => write!(f, "apt"),
            ManagerKind::Yum => write!(f, "yum"),
        }
    }
}

impl FromStr for ManagerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "brew" | "homebrew" => Ok(ManagerKind::Brew),
            "pacman" => Ok(ManagerKind::Pacman),
            "apt" | "apt-get" => Ok(ManagerKind::Apt),
            "yum" | "dnf" => Ok(ManagerKind::Yum),
            other => anyhow::bail!("Unknown package manager '{}'", other),
        }
    }
}

/// Detect the first available package manager on `PATH`
pub fn detect() -> Option<ManagerKind> {
    [
        (ManagerKind::Brew, "brew"),
        (ManagerKind::Pacman, "pacman"),
        (ManagerKind::Apt, "apt-get"),
        (ManagerKind::Yum, "yum"),
    ]
    .into_iter()
    .find(|(_, binary)| program_exists(binary))
    .map(|(kind, _)| {
        log::debug!("Detected package manager: {}", kind);
        kind
    })
}

impl ManagerKind {
    /// Whether casks and taps exist for this manager
    pub fn supports_casks(&self) -> bool {
        matches!(self, ManagerKind::Brew)
    }

    pub fn install_command(&self, packages: &[String]) -> CommandLine {
        match self {
            ManagerKind::Brew => CommandLine::new("brew").arg("install").args(packages.iter().cloned()),
            ManagerKind::Pacman => CommandLine::new("pacman")
                .args(["-S", "--needed", "--noconfirm"])
                .args(packages.iter().cloned())
                .sudo(),
            ManagerKind::Apt => CommandLine::new("apt-get")
                .args(["install", "-y"])
                .args(packages.iter().cloned())
                .sudo(),
            ManagerKind::Yum => CommandLine::new("yum")
                .args(["install", "-y"])
                .args(packages.iter().cloned())
                .sudo(),
        }
    }

    pub fn uninstall_command(&self, packages: &[String]) -> CommandLine {
        match self {
            ManagerKind::Brew => CommandLine::new("brew").arg("uninstall").args(packages.iter().cloned()),
            ManagerKind::Pacman => CommandLine::new("pacman")
                .args(["-Rns", "--noconfirm"])
                .args(packages.iter().cloned())
                .sudo(),
            ManagerKind::Apt => CommandLine::new("apt-get")
                .args(["remove", "-y"])
                .args(packages.iter().cloned())
                .sudo(),
            ManagerKind::Yum => CommandLine::new("yum")
                .args(["remove", "-y"])
                .args(packages.iter().cloned())
                .sudo(),
        }
    }

    /// Lists every installed package name
    pub fn installed_command(&self) -> CommandLine {
        match self {
            ManagerKind::Brew => CommandLine::new("brew").args(["list", "--formula", "-1"]),
            ManagerKind::Pacman => CommandLine::new("pacman").arg("-Qq"),
            ManagerKind::Apt => CommandLine::new("dpkg-query").args(["-W", "-f=${Package}\n"]),
            ManagerKind::Yum => CommandLine::new("rpm").args(["-qa", "--qf", "%{NAME}\n"]),
        }
    }

    /// Lists packages the user asked for, not pulled in as dependencies
    pub fn explicit_command(&self) -> CommandLine {
        match self {
            ManagerKind::Brew => CommandLine::new("brew").arg("leaves"),
            ManagerKind::Pacman => CommandLine::new("pacman").arg("-Qqe"),
            ManagerKind::Apt => CommandLine::new("apt-mark").arg("showmanual"),
            // rpm has no notion of explicit installs
            ManagerKind::Yum => self.installed_command(),
        }
    }

    pub fn info_command(&self, package: &str) -> CommandLine {
        match self {
            ManagerKind::Brew => CommandLine::new("brew").args(["info", package]),
            ManagerKind::Pacman => CommandLine::new("pacman").args(["-Si", package]),
            ManagerKind::Apt => CommandLine::new("apt-cache").args(["show", package]),
            ManagerKind::Yum => CommandLine::new("yum").args(["info", package]),
        }
    }

    /// Whether install commands escalate with sudo and need the terminal
    fn needs_terminal(&self) -> bool {
        !matches!(self, ManagerKind::Brew)
    }

    pub async fn installed(&self) -> Result<Vec<String>> {
        let stdout = self.installed_command().output(None).await?;
        Ok(parse_package_list(&stdout))
    }

    pub async fn explicit(&self) -> Result<Vec<String>> {
        let stdout = self.explicit_command().output(None).await?;
        Ok(parse_package_list(&stdout))
    }

    pub async fn installed_casks(&self) -> Result<Vec<String>> {
        if !self.supports_casks() {
            return Ok(Vec::new());
        }
        let stdout = cask_list_command().output(None).await?;
        Ok(parse_package_list(&stdout))
    }

    pub async fn installed_taps(&self) -> Result<Vec<String>> {
        if !self.supports_casks() {
            return Ok(Vec::new());
        }
        let stdout = CommandLine::new("brew").arg("tap").output(None).await?;
        Ok(parse_package_list(&stdout))
    }

    pub async fn install(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        log::info!("Installing with {}: {}", self, packages.join(" "));
        self.run(self.install_command(packages), "Installing packages").await
    }

    pub async fn uninstall(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        log::info!("Uninstalling with {}: {}", self, packages.join(" "));
        self.run(self.uninstall_command(packages), "Uninstalling packages")
            .await
    }

    pub async fn install_casks(&self, casks: &[String]) -> Result<()> {
        if casks.is_empty() {
            return Ok(());
        }
        if !self.supports_casks() {
            log::warn!("Casks are only supported by brew, skipping: {}", casks.join(", "));
            return Ok(());
        }
        self.run(cask_install_command(casks), "Installing casks").await
    }

    pub async fn uninstall_casks(&self, casks: &[String]) -> Result<()> {
        if casks.is_empty() || !self.supports_casks() {
            return Ok(());
        }
        self.run(
            CommandLine::new("brew")
                .args(["uninstall", "--cask"])
                .args(casks.iter().cloned()),
            "Uninstalling casks",
        )
        .await
    }

    pub async fn tap(&self, taps: &[String]) -> Result<()> {
        if !self.supports_casks() {
            if !taps.is_empty() {
                log::warn!("Taps are only supported by brew, skipping: {}", taps.join(", "));
            }
            return Ok(());
        }
        for tap in taps {
            self.run(tap_command(tap), &format!("Tapping {}", tap)).await?;
        }
        Ok(())
    }

    pub async fn info(&self, package: &str) -> Result<String> {
        self.info_command(package).output(None).await
    }

    async fn run(&self, command: CommandLine, message: &str) -> Result<()> {
        if self.needs_terminal() {
            return command.status(None).await;
        }
        let spinner = crate::ui::spinner(message);
        let result = command.output(None).await;
        spinner.finish_and_clear();
        result.map(|_| ())
    }
}

pub fn cask_install_command(casks: &[String]) -> CommandLine {
    CommandLine::new("brew")
        .args(["install", "--cask"])
        .args(casks.iter().cloned())
}

pub fn cask_list_command() -> CommandLine {
    CommandLine::new("brew").args(["list", "--cask", "-1"])
}

pub fn tap_command(tap: &str) -> CommandLine {
    CommandLine::new("brew").args(["tap", tap])
}

/// One package per line; anything after the first whitespace (versions) is dropped
pub fn parse_package_list(stdout: &str) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();
    for line in stdout.lines() {
        if let Some(name) = line.split_whitespace().next() {
            crate::config::add_unique(&mut packages, name);
        }
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkgs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_brew_install_command() {
        let cmd = ManagerKind::Brew.install_command(&pkgs(&["git", "fd"]));
        assert_eq!(cmd.program, "brew");
        assert_eq!(cmd.args, vec!["install", "git", "fd"]);
    }

    #[test]
    fn test_pacman_install_is_non_interactive() {
        let cmd = ManagerKind::Pacman.install_command(&pkgs(&["git"]));
        let line = cmd.to_string();
        assert!(line.contains("pacman -S --needed --noconfirm git"));
    }

    #[test]
    fn test_apt_uninstall_command() {
        let line = ManagerKind::Apt.uninstall_command(&pkgs(&["vim"])).to_string();
        assert!(line.ends_with("apt-get remove -y vim"));
    }

    #[test]
    fn test_explicit_commands() {
        assert_eq!(ManagerKind::Brew.explicit_command().to_string(), "brew leaves");
        assert_eq!(ManagerKind::Pacman.explicit_command().to_string(), "pacman -Qqe");
        assert_eq!(
            ManagerKind::Apt.explicit_command().to_string(),
            "apt-mark showmanual"
        );
        assert_eq!(
            ManagerKind::Yum.explicit_command(),
            ManagerKind::Yum.installed_command()
        );
    }

    #[test]
    fn test_parse_package_list() {
        let out = "git 2.45.0-1\n\n  ripgrep\nneovim 0.10\ngit\n";
        assert_eq!(parse_package_list(out), pkgs(&["git", "ripgrep", "neovim"]));
    }

    #[test]
    fn test_manager_from_str() {
        assert_eq!("Homebrew".parse::<ManagerKind>().unwrap(), ManagerKind::Brew);
        assert_eq!("apt-get".parse::<ManagerKind>().unwrap(), ManagerKind::Apt);
        assert_eq!("dnf".parse::<ManagerKind>().unwrap(), ManagerKind::Yum);
        assert!("zypper".parse::<ManagerKind>().is_err());
    }

    #[test]
    fn test_only_brew_supports_casks() {
        assert!(ManagerKind::Brew.supports_casks());
        assert!(!ManagerKind::Apt.supports_casks());
    }
}
