pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shopsense",
    about = "Shopsense operator CLI",
    long_about = "Operate the Shopsense recommendation engine: readiness, migrations, demo data, \
                  promotion sweeps, recommendation lookups and data export.",
    after_help = "Examples:\n  shopsense doctor --json\n  shopsense seed\n  shopsense recommend user-joao\n  shopsense export --user user-joao"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset (safe to run repeatedly)")]
    Seed,
    #[command(about = "Regenerate promotions for every user and print the sweep report")]
    Sweep,
    #[command(about = "Print peer-scored recommendations for one user")]
    Recommend {
        #[arg(help = "User identifier")]
        user_id: String,
    },
    #[command(about = "Export stored data with summary statistics as JSON")]
    Export {
        #[arg(long, help = "Only export the given user's data")]
        user: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity and schema migration state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Sweep => commands::sweep::run(),
        Command::Recommend { user_id } => commands::recommend::run(&user_id),
        Command::Export { user } => commands::export::run(user.as_deref()),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
