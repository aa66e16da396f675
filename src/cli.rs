//! CLI argument parsing using clap derive macros

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{configure::ConfigureCommand, init::InitCommand, vscode::VscodeCommand};

/// tkgen - pinned C/C++ toolchains and CMake configuration
///
/// Provisions compiler distributions into a shared cache, generates CMake
/// toolchain files and optionally bootstraps a full configure.
#[derive(Parser, Debug)]
#[command(name = "tkgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize ToolchainKit in a project
    Init(InitCommand),

    /// Configure the toolchain and generate CMake integration
    Configure(ConfigureCommand),

    /// Generate VS Code workspace settings
    Vscode(VscodeCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }

        env_logger::Builder::from_env(
            env_logger::Env::default()
                .default_filter_or(if self.verbose { "debug" } else { "warn" }),
        )
        .init();

        match self.command {
            Commands::Init(cmd) => cmd.execute(self.verbose),
            Commands::Configure(cmd) => cmd.execute(self.verbose),
            Commands::Vscode(cmd) => cmd.execute(self.verbose),
        }
    }
}
