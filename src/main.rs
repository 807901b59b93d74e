#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::Result;
use log::{debug, error};

mod browse;
mod cli;
mod config;
mod dotfiles;
mod exec;
mod gist;
mod git;
mod hooks;
mod manager;
mod packages;
mod setup;
mod snapshot;
mod ssh;
mod stow;
mod templates;
mod ui;

use crate::cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let arguments = init();
    debug!("Finished initialising, starting main workflow...");

    let config_path = match arguments.config.clone() {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let config_path = config_path.as_path();

    let result = match arguments.commands {
        None | Some(ArgumentCommands::Status) => setup::status(config_path).await,
        Some(ArgumentCommands::Init { repo }) => setup::init(config_path, repo).await,
        Some(ArgumentCommands::Sync { strategy, dry_run }) => {
            setup::sync(config_path, strategy, dry_run).await
        }
        Some(ArgumentCommands::Add {
            names,
            cask,
            tap,
            no_install,
        }) => packages::add(config_path, names, cask, tap, no_install).await,
        Some(ArgumentCommands::Remove {
            names,
            cask,
            tap,
            uninstall,
        }) => packages::remove(config_path, names, cask, tap, uninstall).await,
        Some(ArgumentCommands::List) => packages::list(config_path).await,
        Some(ArgumentCommands::Install) => packages::install(config_path).await,
        Some(ArgumentCommands::Diff) => packages::diff(config_path).await,
        Some(ArgumentCommands::Scan { all }) => packages::scan(config_path, all).await,
        Some(ArgumentCommands::Brewfile { output }) => packages::brewfile(config_path, output).await,
        Some(ArgumentCommands::Stow {
            bundles,
            strategy,
            dry_run,
        }) => dotfiles::stow(config_path, bundles, strategy, dry_run).await,
        Some(ArgumentCommands::Unstow { bundles, forget }) => {
            dotfiles::unstow(config_path, bundles, forget).await
        }
        Some(ArgumentCommands::Bundles) => dotfiles::bundles(config_path).await,
        Some(ArgumentCommands::Import {
            paths,
            bundle,
            scan,
            all,
            dry_run,
        }) => dotfiles::import(config_path, paths, bundle, scan, all, dry_run).await,
        Some(ArgumentCommands::Snapshot { command }) => match command {
            SnapshotCommands::Create { name } => snapshot::create(config_path, name).await,
            SnapshotCommands::List => snapshot::list(config_path).await,
            SnapshotCommands::Show { name } => snapshot::show(config_path, &name).await,
            SnapshotCommands::Restore { name, install } => {
                snapshot::restore(config_path, &name, install).await
            }
            SnapshotCommands::Delete { name } => snapshot::delete(config_path, &name).await,
        },
        Some(ArgumentCommands::Export { output }) => snapshot::export(config_path, output).await,
        Some(ArgumentCommands::ImportConfig { input, replace }) => {
            snapshot::import(config_path, &input, replace).await
        }
        Some(ArgumentCommands::Hook { command }) => match command {
            HookCommands::Add { event, command } => hooks::add(config_path, event, &command).await,
            HookCommands::Remove { event, command } => {
                hooks::remove(config_path, event, &command).await
            }
            HookCommands::List => hooks::list(config_path).await,
            HookCommands::Run { event } => hooks::run(config_path, event).await,
        },
        Some(ArgumentCommands::Template { command }) => match command {
            TemplateCommands::List => templates::list(config_path).await,
            TemplateCommands::Show { name } => templates::show(config_path, &name).await,
            TemplateCommands::Apply { name, install } => {
                templates::apply(config_path, &name, install).await
            }
            TemplateCommands::Save { name } => templates::save(config_path, &name).await,
            TemplateCommands::Delete { name } => templates::delete(config_path, &name).await,
        },
        Some(ArgumentCommands::Browse) => browse::browse(config_path).await,
        Some(ArgumentCommands::Gist { command }) => match command {
            GistCommands::Push {
                public,
                description,
            } => gist::push(config_path, public, description).await,
            GistCommands::Pull { id, replace } => gist::pull(config_path, id, replace).await,
        },
        Some(ArgumentCommands::Git { command }) => match command {
            GitCommands::Status => git::status_cmd(config_path).await,
            GitCommands::Sync { message } => git::sync(config_path, message).await,
            GitCommands::Clone { url } => git::clone_cmd(config_path, &url).await,
        },
        Some(ArgumentCommands::Ssh { command }) => match command {
            SshCommands::Keygen { email, path, force } => ssh::keygen(email, path, force).await,
        },
    };

    if let Err(e) = result {
        error!("{:#}", e);
        ui::failure("Command failed");
        std::process::exit(1);
    }

    Ok(())
}
