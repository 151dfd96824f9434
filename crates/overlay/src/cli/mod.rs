//! CLI command definitions and handlers.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};

use crate::runtime::{OverlayManager, RuntimeConfig};
use crate::security::Credentials;

/// Overlay - create and track OverlayFS mounts
#[derive(Parser)]
#[command(name = "overlay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory storing the state of overlay mounts
    /// [default: ~/.local/share/overlay]
    #[arg(long, global = true, env = "OVERLAY_ROOT")]
    pub root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output formats for `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tab separated table.
    Table,
    /// JSON object keyed by id.
    Json,
}

/// Overlay commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Overlay a directory and record the mount
    Mount {
        /// Directory to overlay (the read-only lower layer)
        source: PathBuf,

        /// Where to expose the merged view (default: <root>/mounts/<id>/rootfs)
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// List recorded mounts
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Only display mount ids
        #[arg(short, long)]
        quiet: bool,
    },

    /// Unmount the given mount points
    Unmount {
        /// Mount points to detach
        #[arg(required = true, value_parser = clap::builder::OsStringValueParser::new())]
        targets: Vec<OsString>,
    },

    /// Delete recorded mounts and their directories
    Remove {
        /// Mount ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Unmount targets that are still mounted
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Runtime configuration selected by the global flags.
    #[must_use]
    pub fn config(&self) -> RuntimeConfig {
        match &self.root {
            Some(root) => RuntimeConfig::default().with_root(root),
            None => RuntimeConfig::default(),
        }
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns the first failure, with the offending path or id as context.
    pub fn execute(self) -> Result<()> {
        let config = self.config();

        match self.command {
            Commands::Mount { source, target } => {
                let manager = open(config)?;
                let record = manager
                    .create(&source, target.as_deref())
                    .wrap_err_with(|| format!("overlaying {}", source.display()))?;
                println!("{}", record.target.display());
                Ok(())
            }

            Commands::List { format, quiet } => {
                let mounts = open(config)?.list().wrap_err("listing mounts")?;

                if quiet {
                    for id in mounts.keys() {
                        println!("{id}");
                    }
                } else if format == OutputFormat::Json {
                    println!("{}", serde_json::to_string_pretty(&mounts)?);
                } else {
                    println!("ID\tSOURCE\tTARGET");
                    for record in mounts.values() {
                        println!(
                            "{}\t{}\t{}",
                            record.id,
                            record.source.display(),
                            record.target.display()
                        );
                    }
                }
                Ok(())
            }

            // Unmounting by path needs no registry.
            Commands::Unmount { targets } => {
                for target in targets {
                    let target = Path::new(&target);
                    crate::filesystem::unmount(target)
                        .wrap_err_with(|| format!("unmounting {}", target.display()))?;
                }
                Ok(())
            }

            Commands::Remove { ids, force } => {
                let manager = open(config)?;
                for id in ids {
                    manager
                        .remove(&id, force)
                        .wrap_err_with(|| format!("removing mount {id}"))?;
                    println!("{id}");
                }
                Ok(())
            }
        }
    }
}

fn open(config: RuntimeConfig) -> Result<OverlayManager> {
    OverlayManager::new(config, Credentials::current()).wrap_err("initializing registry")
}
