use anyhow::Result;
use clap::ValueEnum;
use std::path::Path;

use crate::config::{Config, add_unique, remove_item};
use crate::{exec, ui};

/// Points in a command where user hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HookEvent {
    PreInstall,
    PostInstall,
    PreStow,
    PostStow,
    PreSync,
    PostSync,
}

impl HookEvent {
    pub const ALL: [HookEvent; 6] = [
        HookEvent::PreInstall,
        HookEvent::PostInstall,
        HookEvent::PreStow,
        HookEvent::PostStow,
        HookEvent::PreSync,
        HookEvent::PostSync,
    ];

    /// Key used in the config's `hooks` map
    pub fn key(&self) -> &'static str {
        match self {
            HookEvent::PreInstall => "pre-install",
            HookEvent::PostInstall => "post-install",
            HookEvent::PreStow => "pre-stow",
            HookEvent::PostStow => "post-stow",
            HookEvent::PreSync => "pre-sync",
            HookEvent::PostSync => "post-sync",
        }
    }

    pub fn is_pre(&self) -> bool {
        matches!(
            self,
            HookEvent::PreInstall | HookEvent::PreStow | HookEvent::PreSync
        )
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Commands registered for an event
pub fn commands_for(config: &Config, event: HookEvent) -> Vec<String> {
    config.hooks.get(event.key()).cloned().unwrap_or_default()
}

/// Run all hooks of an event in order.
///
/// A failing pre-hook aborts the caller; post-hooks only warn.
pub async fn run_hooks(config: &Config, event: HookEvent, cwd: Option<&Path>) -> Result<()> {
    let commands = commands_for(config, event);
    if commands.is_empty() {
        return Ok(());
    }

    log::info!("Running {} {} hook(s)", commands.len(), event);

    for command in &commands {
        println!("🪝 {} {}", console::style(event).cyan(), command);
        if let Err(e) = exec::shell(command, cwd).await {
            if event.is_pre() {
                return Err(e.context(format!("{} hook failed: {}", event, command)));
            }
            ui::warn(format!("{} hook failed: {} ({})", event, command, e));
        }
    }

    Ok(())
}

pub async fn add(config_path: &Path, event: HookEvent, command: &str) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let hooks = config.hooks.entry(event.key().to_string()).or_default();

    if !add_unique(hooks, command) {
        ui::warn(format!("Hook already registered for {}: {}", event, command));
        return Ok(());
    }

    config.commit(config_path)?;
    ui::success(format!("Added {} hook: {}", event, command));
    Ok(())
}

pub async fn remove(config_path: &Path, event: HookEvent, command: &str) -> Result<()> {
    let mut config = Config::load(config_path)?;
    let key = event.key();

    let removed = match config.hooks.get_mut(key) {
        Some(hooks) => remove_item(hooks, command),
        None => false,
    };
    if !removed {
        ui::warn(format!("No {} hook matching: {}", event, command));
        return Ok(());
    }
    if config.hooks.get(key).is_some_and(|h| h.is_empty()) {
        config.hooks.remove(key);
    }

    config.commit(config_path)?;
    ui::success(format!("Removed {} hook: {}", event, command));
    Ok(())
}

pub async fn list(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;

    if config.hooks.values().all(|h| h.is_empty()) {
        println!("No hooks registered.");
        println!("Use 'stowaway hook add <event> <command>' to add one.");
        return Ok(());
    }

    ui::header("Hooks");
    for event in HookEvent::ALL {
        let commands = commands_for(&config, event);
        if commands.is_empty() {
            continue;
        }
        println!("  {}", console::style(event).cyan().bold());
        for command in commands {
            ui::item(command);
        }
    }
    Ok(())
}

pub async fn run(config_path: &Path, event: HookEvent) -> Result<()> {
    let config = Config::load(config_path)?;
    if commands_for(&config, event).is_empty() {
        ui::info(format!("No {} hooks registered", event));
        return Ok(());
    }
    run_hooks(&config, event, None).await
}
