use anyhow::{Context, Result};
use std::path::Path;
use tokio::process::Command;

/// A program and its arguments, built before anything is spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Wrap the command with `sudo`, unless already root
    pub fn sudo(self) -> Self {
        if is_root() {
            return self;
        }
        let mut args = vec![self.program];
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
        }
    }

    fn command(&self, cwd: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run capturing output, failing with stderr on a non-zero exit
    pub async fn output(&self, cwd: Option<&Path>) -> Result<String> {
        log::debug!("Running: {}", self);

        let output = self
            .command(cwd)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("`{}` failed: {}", self, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run attached to the terminal so prompts (sudo, brew) reach the user
    pub async fn status(&self, cwd: Option<&Path>) -> Result<()> {
        log::debug!("Running: {}", self);

        let status = self
            .command(cwd)
            .status()
            .await
            .with_context(|| format!("Failed to execute {}", self.program))?;

        if !status.success() {
            anyhow::bail!("`{}` exited with {}", self, status);
        }
        Ok(())
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Whether an executable named `program` is on `PATH`
pub fn program_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Run a shell snippet through `sh -c`
pub async fn shell(snippet: &str, cwd: Option<&Path>) -> Result<()> {
    CommandLine::new("sh").arg("-c").arg(snippet).status(cwd).await
}

#[cfg(unix)]
fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = CommandLine::new("git").args(["commit", "-m", "update dotfiles"]);
        assert_eq!(cmd.to_string(), "git commit -m \"update dotfiles\"");
    }

    #[test]
    fn test_sudo_prefix() {
        let cmd = CommandLine::new("pacman").arg("-S").sudo();
        if is_root() {
            assert_eq!(cmd.program, "pacman");
        } else {
            assert_eq!(cmd.program, "sudo");
            assert_eq!(cmd.args, vec!["pacman", "-S"]);
        }
    }

    #[test]
    fn test_program_exists_rejects_garbage() {
        assert!(!program_exists("definitely-not-a-real-binary-name"));
    }

    #[cfg(unix)]
    #[test]
    fn test_program_exists_finds_shell() {
        assert!(program_exists("sh"));
    }

    #[cfg(unix)]
    #[test]
    fn test_root_follows_effective_uid() {
        let cmd = CommandLine::new("apt-get").arg("install").sudo();
        if nix::unistd::Uid::effective().is_root() {
            assert_eq!(cmd.to_string(), "apt-get install");
        } else {
            assert_eq!(cmd.to_string(), "sudo apt-get install");
        }
    }

    #[tokio::test]
    async fn test_output_reports_failure() {
        let err = CommandLine::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .output(None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_output_captures_stdout() {
        let out = CommandLine::new("sh")
            .args(["-c", "echo hello"])
            .output(None)
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }
}
