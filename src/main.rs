//! tkgen - ToolchainKit CLI
//!
//! Manages pinned C/C++ toolchains for multi-platform projects: provisions
//! compiler distributions into a content-addressed shared cache, links them
//! into projects, generates CMake toolchain files and optionally bootstraps
//! a full configure (build tools, dependencies, CMake).

mod cli;
mod cmake;
mod commands;
mod config;
mod core;
mod error;
mod exec;
mod packages;
mod plugins;
mod toolchain;

use clap::Parser;

use cli::Cli;
use error::ToolchainKitError;

fn main() {
    let cli = Cli::parse();

    if let Err(error) = cli.execute() {
        match error.downcast_ref::<ToolchainKitError>() {
            Some(tk_error) => tk_error.display_with_hints(),
            None => eprintln!("\nERROR: {:#}\n", error),
        }
        std::process::exit(1);
    }
}
