use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::paths;

#[derive(Parser)]
#[command(name = "virtforge")]
#[command(version)]
#[command(about = "Compile a libvirt/QEMU host configuration into system resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a configuration and show derived settings
    Check(ConfigArgs),

    /// Print the ordered resource graph
    Compile {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show current vs desired state of emitted files and links
    Status(TargetArgs),

    /// Preview what apply would change
    Diff(TargetArgs),

    /// Write unit files, links and generated configuration
    Apply(ApplyArgs),

    /// Materialize runtime products from a setup manifest
    Setup {
        /// Manifest written by apply
        #[arg(short, long)]
        manifest: String,

        /// Prefix for every destination path
        #[arg(long, default_value = "/")]
        root: String,

        /// Number of parallel jobs
        #[arg(short, long, default_value = "4")]
        jobs: usize,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Configuration file
    #[arg(short, long, env = paths::ENV_CONFIG, default_value = paths::DEFAULT_CONFIG)]
    pub config: String,
}

#[derive(Args)]
pub struct TargetArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Prefix for every destination path
    #[arg(long, default_value = "/")]
    pub root: String,

    /// Only consider matching resources: files, links, or type:fragment
    pub target: Option<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub scope: TargetArgs,

    /// Show what would change without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
