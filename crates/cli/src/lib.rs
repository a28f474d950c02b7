pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leadroute",
    about = "Leadroute operator CLI",
    long_about = "Operate the lead routing database: migrations, demo data, readiness checks, \
                  config inspection, and dry-run routing.",
    after_help = "Examples:\n  leadroute doctor --json\n  leadroute seed\n  \
                  leadroute route --city Austin --status new"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo representatives, rules and allocations")]
    Seed {
        #[arg(long, help = "Remove the demo rows instead of loading them")]
        clean: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, DB connectivity, schema and routing readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Route a lead against the configured database and print the decision")]
    Route(commands::route::RouteArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { clean } => commands::seed::run(clean),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Route(args) => commands::route::run(args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
