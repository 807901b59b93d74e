use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;

use crate::hooks::HookEvent;
use crate::stow::ConflictStrategy;

pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

pub const BANNER: &str = r#"
  _____ _
 / ____| |
| (___ | |_ _____      ____ ___      ____ _ _   _
 \___ \| __/ _ \ \ /\ / / _` \ \ /\ / / _` | | | |
 ____) | || (_) \ V  V / (_| |\ V  V / (_| | |_| |
|_____/ \__\___/ \_/\_/ \__,_| \_/\_/ \__,_|\__, |
                                            __/ |
                                           |___/"#;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    /// Enable Debugging
    #[clap(long, env, default_value_t = false)]
    pub debug: bool,

    /// Disable Banner
    #[clap(long, default_value_t = false)]
    pub disable_banner: bool,

    /// Configuration file path (defaults to ~/.stowaway/config.json)
    #[clap(short, long, env)]
    pub config: Option<PathBuf>,

    /// Subcommands
    #[clap(subcommand)]
    pub commands: Option<ArgumentCommands>,
}

#[derive(Subcommand, Debug)]
pub enum ArgumentCommands {
    /// Initialize stowaway (config, dotfiles directory, package manager)
    Init {
        /// Clone this dotfiles repository into the dotfiles directory
        #[clap(long)]
        repo: Option<String>,
    },
    /// Show an overview of packages and bundles
    Status,
    /// Install every tracked package and stow every tracked bundle
    Sync {
        /// How to handle files that block stowing
        #[clap(short, long, value_enum, default_value_t = ConflictStrategy::Abort)]
        strategy: ConflictStrategy,
        /// Show what would be done without changing anything
        #[clap(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Track (and install) packages
    Add {
        /// Package names
        #[clap(required = true)]
        names: Vec<String>,
        /// Treat names as Homebrew casks
        #[clap(long, conflicts_with = "tap")]
        cask: bool,
        /// Treat names as Homebrew taps
        #[clap(long)]
        tap: bool,
        /// Only update the configuration
        #[clap(long, default_value_t = false)]
        no_install: bool,
    },
    /// Stop tracking packages
    Remove {
        /// Package names
        #[clap(required = true)]
        names: Vec<String>,
        /// Treat names as Homebrew casks
        #[clap(long, conflicts_with = "tap")]
        cask: bool,
        /// Treat names as Homebrew taps
        #[clap(long)]
        tap: bool,
        /// Also uninstall them
        #[clap(short, long, default_value_t = false)]
        uninstall: bool,
    },
    /// List tracked packages, casks, taps and bundles
    List,
    /// Install tracked packages that are missing
    Install,
    /// Compare tracked packages with the system
    Diff,
    /// Track packages that are installed but not tracked
    Scan {
        /// Track everything found without prompting
        #[clap(long, default_value_t = false)]
        all: bool,
    },
    /// Generate a Homebrew Brewfile
    Brewfile {
        /// Write to this file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Stow dotfile bundles (all tracked bundles when none given)
    Stow {
        /// Bundle names inside the dotfiles directory
        bundles: Vec<String>,
        /// How to handle files that block stowing
        #[clap(short, long, value_enum, default_value_t = ConflictStrategy::Abort)]
        strategy: ConflictStrategy,
        /// Show what would be done without changing anything
        #[clap(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Remove a bundle's symlinks
    Unstow {
        #[clap(required = true)]
        bundles: Vec<String>,
        /// Also stop tracking the bundles
        #[clap(long, default_value_t = false)]
        forget: bool,
    },
    /// List bundles on disk and their stow state
    Bundles,
    /// Move loose dotfiles from home into bundles and link them back
    Import {
        /// Paths to import
        #[clap(required_unless_present = "scan")]
        paths: Vec<PathBuf>,
        /// Bundle to import into (derived from each path by default)
        #[clap(short, long)]
        bundle: Option<String>,
        /// Look for loose dotfiles in home
        #[clap(long, default_value_t = false)]
        scan: bool,
        /// With --scan, import everything found without prompting
        #[clap(long, requires = "scan", default_value_t = false)]
        all: bool,
        /// Show what would be done without changing anything
        #[clap(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Manage snapshots of the setup
    Snapshot {
        #[clap(subcommand)]
        command: SnapshotCommands,
    },
    /// Export the tracked setup (.json, .yaml or .toml)
    Export {
        /// Output file (stdout as JSON when omitted)
        output: Option<PathBuf>,
    },
    /// Import a previously exported setup
    ImportConfig {
        /// File to import (.json, .yaml or .toml)
        input: PathBuf,
        /// Replace tracked lists instead of merging
        #[clap(long, default_value_t = false)]
        replace: bool,
    },
    /// Manage hooks run around install, stow and sync
    Hook {
        #[clap(subcommand)]
        command: HookCommands,
    },
    /// Package templates
    Template {
        #[clap(subcommand)]
        command: TemplateCommands,
    },
    /// Interactively browse tracked packages and bundles
    Browse,
    /// Sync the setup through a GitHub Gist
    Gist {
        #[clap(subcommand)]
        command: GistCommands,
    },
    /// Work with the dotfiles git repository
    Git {
        #[clap(subcommand)]
        command: GitCommands,
    },
    /// SSH key helpers
    Ssh {
        #[clap(subcommand)]
        command: SshCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Record the current setup and installed packages
    Create {
        /// Snapshot name (defaults to a timestamp)
        #[clap(short, long)]
        name: Option<String>,
    },
    /// List snapshots
    List,
    /// Show a snapshot
    Show { name: String },
    /// Restore tracked lists from a snapshot
    Restore {
        name: String,
        /// Install the restored packages
        #[clap(long, default_value_t = false)]
        install: bool,
    },
    /// Delete a snapshot
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum HookCommands {
    /// Register a shell command for an event
    Add {
        #[clap(value_enum)]
        event: HookEvent,
        command: String,
    },
    /// Remove a registered command
    Remove {
        #[clap(value_enum)]
        event: HookEvent,
        command: String,
    },
    /// List hooks
    List,
    /// Run the hooks of an event now
    Run {
        #[clap(value_enum)]
        event: HookEvent,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// List built-in and user templates
    List,
    /// Show a template's packages
    Show { name: String },
    /// Track a template's packages
    Apply {
        name: String,
        /// Install after tracking
        #[clap(long, default_value_t = false)]
        install: bool,
    },
    /// Save the tracked packages as a user template
    Save { name: String },
    /// Delete a user template
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum GistCommands {
    /// Upload the exported setup
    Push {
        /// Create a public gist (only when creating)
        #[clap(long, default_value_t = false)]
        public: bool,
        /// Gist description
        #[clap(short, long)]
        description: Option<String>,
    },
    /// Download and merge a setup
    Pull {
        /// Gist id (defaults to the stored one)
        id: Option<String>,
        /// Replace tracked lists instead of merging
        #[clap(long, default_value_t = false)]
        replace: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum GitCommands {
    /// Show uncommitted changes in the dotfiles repository
    Status,
    /// Pull, commit and push the dotfiles repository
    Sync {
        /// Commit message
        #[clap(short, long)]
        message: Option<String>,
    },
    /// Clone a dotfiles repository into the dotfiles directory
    Clone { url: String },
}

#[derive(Subcommand, Debug)]
pub enum SshCommands {
    /// Generate an ed25519 key unless one exists
    Keygen {
        /// Key comment
        #[clap(short, long)]
        email: Option<String>,
        /// Key path (defaults to ~/.ssh/id_ed25519)
        #[clap(short, long)]
        path: Option<PathBuf>,
        /// Replace an existing key
        #[clap(long, default_value_t = false)]
        force: bool,
    },
}

pub fn init() -> Arguments {
    let arguments = Arguments::parse();

    let log_level = match &arguments.debug {
        false => log::LevelFilter::Info,
        true => log::LevelFilter::Debug,
    };

    env_logger::builder()
        .parse_default_env()
        .filter_level(log_level)
        .init();

    if !arguments.disable_banner {
        println!(
            "{}    {} - v{}",
            style(BANNER).green(),
            style(AUTHOR).red(),
            style(VERSION_NUMBER).blue()
        );
    }

    arguments
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Arguments::command().debug_assert();
    }

    #[test]
    fn test_parse_stow_with_strategy() {
        let args = Arguments::parse_from(["stowaway", "stow", "zsh", "nvim", "-s", "backup"]);
        match args.commands {
            Some(ArgumentCommands::Stow {
                bundles, strategy, ..
            }) => {
                assert_eq!(bundles, vec!["zsh", "nvim"]);
                assert_eq!(strategy, ConflictStrategy::Backup);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_hook_event() {
        let args = Arguments::parse_from(["stowaway", "hook", "add", "post-install", "echo hi"]);
        assert!(matches!(
            args.commands,
            Some(ArgumentCommands::Hook {
                command: HookCommands::Add {
                    event: HookEvent::PostInstall,
                    ..
                }
            })
        ));
    }

    #[test]
    fn test_import_requires_paths_or_scan() {
        assert!(Arguments::try_parse_from(["stowaway", "import"]).is_err());
        assert!(Arguments::try_parse_from(["stowaway", "import", "--scan"]).is_ok());
    }
}
