// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dot::{path::expand_tilde, path::home_dir, Client};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::{io, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about = "Manage dotfiles from a registry",
    override_usage = "dot [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Setup(opts) => run_setup(opts),
            Command::Apply(opts) => run_apply(opts),
            Command::Completions(opts) => run_completions(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Set up dot to manage dotfiles of a registry.
    #[command(override_usage = "dot setup [options]")]
    Setup(SetupOptions),

    /// Apply registry changes to dotfiles.
    #[command(override_usage = "dot apply [options] [dotfile]...")]
    Apply(ApplyOptions),

    /// Generate shell completions.
    #[command(override_usage = "dot completions <shell>")]
    Completions(CompletionsOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SetupOptions {
    /// Path to registry holding dotfile sources.
    #[arg(short, long, value_name = "path", default_value = "~/.dotfiles")]
    pub registry: String,

    /// Switch registries even if dot is already set up with another one.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ApplyOptions {
    /// Names of dotfiles to apply. Applies all of them if none are given.
    #[arg(value_name = "dotfile")]
    pub dotfiles: Vec<String>,

    /// Overwrite dotfiles even if they were modified by hand.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CompletionsOptions {
    /// Shell to generate completions for.
    #[arg(value_enum, value_name = "shell")]
    pub shell: Shell,
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run_setup(opts: SetupOptions) -> Result<()> {
    let registry = expand_tilde(&opts.registry, home_dir()?);
    let mut client = Client::new().context("failed to load dot")?;
    client.setup(&registry, opts.force)?;
    info!("successfully set up dot with registry {:?}", registry.display());

    Ok(())
}

fn run_apply(opts: ApplyOptions) -> Result<()> {
    let mut client = Client::new().context("failed to load dot")?;
    client.apply(opts.force, &opts.dotfiles)?;
    info!("successfully applied dotfiles");

    Ok(())
}

fn run_completions(opts: CompletionsOptions) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(opts.shell, &mut command, name, &mut io::stdout());

    Ok(())
}
