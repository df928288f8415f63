mod cli;
mod commands;
mod config;
mod output;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{AuthArgs, Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub auth: AuthArgs,
}

fn main() {
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

    if let Err(err) = run(cli) {
        report_error(&err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        quiet: cli.quiet,
        auth: cli.auth,
    };

    match cli.command {
        Command::Follow(args) => commands::follow::run(&ctx, args),
        Command::List(args) => commands::list::run(&ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sitefollow", &mut io::stdout());
            Ok(())
        }
    }
}

/// Print a fatal error, with advice when it came from the Graph client.
fn report_error(err: &anyhow::Error) {
    ui::error(&format!("{err:#}"));
    if let Some(graph_err) = err.downcast_ref::<graphkit::Error>() {
        let category = graph_err.category();
        eprintln!("  {}: {}", category.description(), category.advice());
    }
}
