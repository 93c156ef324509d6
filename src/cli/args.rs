//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Web asset build pipeline
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Bundle file path (default: assets.toml)
    #[arg(short = 'C', long, default_value = "assets.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build bundles
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        args: BuildArgs,
    },

    /// Print the URLs of a bundle
    #[command(visible_alias = "u")]
    Urls {
        /// Registered bundle name
        name: String,

        /// Also print subresource integrity hashes
        #[arg(long)]
        sri: bool,
    },

    /// List bundles that need a rebuild
    Check,

    /// Remove the cache directory and built outputs
    Clean,
}

#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Bundles to build. If omitted, builds every bundle in the file.
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Build even when the outputs are up to date
    #[arg(short, long)]
    pub force: bool,

    /// Do not read cached filter results
    #[arg(long)]
    pub no_cache: bool,

    /// Build with debug mode off, whatever the bundle file says
    #[arg(short, long)]
    pub production: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::parse_from(["assetpipe", "-C", "site/assets.toml", "b", "js", "css", "--force"]);
        assert_eq!(cli.config, PathBuf::from("site/assets.toml"));
        match cli.command {
            Commands::Build { args } => {
                assert_eq!(args.names, ["js", "css"]);
                assert!(args.force);
                assert!(!args.no_cache);
            }
            other => panic!("expected build, got {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_command() {
        let cli = Cli::parse_from(["assetpipe", "urls", "js", "--sri", "-v", "--color", "never"]);
        assert!(cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.config, PathBuf::from("assets.toml"));
        assert!(matches!(cli.command, Commands::Urls { ref name, sri: true } if name == "js"));
    }
}
