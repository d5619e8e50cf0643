use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kvo",
    about = "kvo: object persistence over key-value storage",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log every storage call and hydration at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Manager configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the capabilities of a storage backend
    Capabilities(BackendArgs),
    /// Run a persist, update, remove cycle and print every storage call
    Demo(DemoArgs),
    /// Print the effective manager configuration
    Config,
}

#[derive(Args, Clone, Debug, Default)]
pub struct BackendArgs {
    /// Send only changed fields on update
    #[arg(long)]
    pub partial_updates: bool,
    /// Use the single-field identifier strategy
    #[arg(long, conflicts_with = "require_composite_keys")]
    pub no_composite_keys: bool,
    /// Reject classes with single-field keys
    #[arg(long)]
    pub require_composite_keys: bool,
}

#[derive(Args, Clone, Debug)]
pub struct DemoArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
    /// Identifier of the demo post
    #[arg(long, default_value = "1")]
    pub id: String,
    #[arg(long, default_value = "a")]
    pub headline: String,
    /// Headline written by the update step
    #[arg(long, default_value = "b")]
    pub new_headline: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_demo_defaults() {
        let cli = Cli::try_parse_from(["kvo", "demo"]).unwrap();
        let Command::Demo(args) = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(args.id, "1");
        assert_eq!(args.headline, "a");
        assert_eq!(args.new_headline, "b");
        assert!(!args.backend.partial_updates);
    }

    #[test]
    fn parse_demo_flags() {
        let cli = Cli::try_parse_from([
            "kvo",
            "demo",
            "--partial-updates",
            "--no-composite-keys",
            "--id",
            "42",
        ])
        .unwrap();
        let Command::Demo(args) = cli.command else {
            panic!("wrong command");
        };
        assert!(args.backend.partial_updates);
        assert!(args.backend.no_composite_keys);
        assert_eq!(args.id, "42");
    }

    #[test]
    fn conflicting_key_flags_rejected() {
        let parsed = Cli::try_parse_from([
            "kvo",
            "capabilities",
            "--no-composite-keys",
            "--require-composite-keys",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["kvo", "config", "-v", "--format", "json", "--config", "kvo.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("kvo.toml")));
        assert!(matches!(cli.command, Command::Config));
    }
}
