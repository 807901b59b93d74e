use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::home_dir;
use crate::exec::CommandLine;
use crate::ui;

pub fn default_key_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".ssh").join("id_ed25519"))
}

pub fn keygen_command(path: &Path, email: &str) -> CommandLine {
    CommandLine::new("ssh-keygen")
        .args(["-t", "ed25519", "-C", email, "-N", ""])
        .arg("-f")
        .arg(path.display().to_string())
}

/// `stowaway ssh keygen`
pub async fn keygen(email: Option<String>, path: Option<PathBuf>, force: bool) -> Result<()> {
    let key = match path {
        Some(p) => p,
        None => default_key_path()?,
    };
    let public = PathBuf::from(format!("{}.pub", key.display()));

    if key.exists() && !force {
        ui::info(format!("SSH key already exists at {}", ui::path(&key)));
    } else {
        if key.exists() {
            tokio::fs::remove_file(&key).await?;
            let _ = tokio::fs::remove_file(&public).await;
        }
        if let Some(dir) = key.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let email = email.unwrap_or_else(default_comment);
        keygen_command(&key, &email)
            .output(None)
            .await
            .context("ssh-keygen failed")?;
        ui::success(format!("Generated SSH key {}", ui::path(&key)));
    }

    let contents = tokio::fs::read_to_string(&public)
        .await
        .with_context(|| format!("Failed to read {}", public.display()))?;
    println!("\n{}", contents.trim());
    println!("\nAdd it at https://github.com/settings/ssh/new");
    Ok(())
}

fn default_comment() -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "stowaway".to_string());
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!("{}@{}", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keygen_command() {
        let cmd = keygen_command(Path::new("/home/u/.ssh/id_ed25519"), "me@example.com");
        assert_eq!(
            cmd.to_string(),
            "ssh-keygen -t ed25519 -C me@example.com -N \"\" -f /home/u/.ssh/id_ed25519"
        );
    }
}
