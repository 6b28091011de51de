mod app;
mod commands;
mod listing;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse();

    // Show hirforge warnings on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        };
        env_logger::Builder::new()
            .filter_module("hirforge", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Hir {
            path,
            method,
            format,
            build,
        } => commands::hir::run(path, method.as_deref(), *format, build, &cli.global),
        Command::Moves {
            path,
            method,
            build,
        } => commands::moves::run(path, method.as_deref(), build, &cli.global),
        Command::Blocks { path, method } => {
            commands::blocks::run(path, method.as_deref(), &cli.global)
        }
    }
}
