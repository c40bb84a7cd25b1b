mod cli;
mod commands;
mod config;
mod emit;
mod paths;
mod progress;
mod resource;
mod setup;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, TargetArgs};
use std::io;
use std::path::{Path, PathBuf};

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Check(args) => commands::check::run(&ctx, &paths::expand(&args.config)),
        Command::Compile { config, format } => {
            commands::compile::run(&ctx, &paths::expand(&config.config), format)
        }
        Command::Status(args) => {
            let (config, root) = resolve(&args);
            commands::apply::status(&ctx, &scope(&config, &root, &args))
        }
        Command::Diff(args) => {
            let (config, root) = resolve(&args);
            commands::apply::diff(&ctx, &scope(&config, &root, &args))
        }
        Command::Apply(args) => {
            let (config, root) = resolve(&args.scope);
            commands::apply::apply(
                &ctx,
                &scope(&config, &root, &args.scope),
                args.dry_run,
                args.yes,
                args.jobs,
            )
        }
        Command::Setup {
            manifest,
            root,
            jobs,
        } => commands::setup::run(&ctx, &paths::expand(&manifest), &paths::expand(&root), jobs),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "virtforge", &mut io::stdout());
            Ok(())
        }
    }
}

fn resolve(args: &TargetArgs) -> (PathBuf, PathBuf) {
    (paths::expand(&args.config.config), paths::expand(&args.root))
}

fn scope<'a>(
    config: &'a Path,
    root: &'a Path,
    args: &'a TargetArgs,
) -> commands::apply::Scope<'a> {
    commands::apply::Scope {
        config,
        root,
        target: args.target.as_deref(),
    }
}
