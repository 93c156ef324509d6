//! assetpipe - build and serve web asset bundles.

mod cli;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    assetpipe::logger::set_verbose(cli.verbose);

    let mut env = assetpipe::loader::load_file(&cli.config)
        .with_context(|| format!("cannot load {}", cli.config.display()))?;

    match &cli.command {
        Commands::Build { args } => cli::build::run(&mut env, args),
        Commands::Urls { name, sri } => cli::urls::run(&env, name, *sri),
        Commands::Check => cli::check::run(&env),
        Commands::Clean => cli::clean::run(&env),
    }
}
