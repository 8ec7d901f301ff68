pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use huddle_core::config::LoadOptions;

use commands::schedule::ScheduleArgs;

#[derive(Debug, Parser)]
#[command(
    name = "huddle",
    about = "Huddle scheduling agent CLI",
    long_about = "Run scheduling requests against the agent, inspect effective configuration, and check gateway readiness.",
    after_help = "Examples:\n  huddle schedule meeting with John tomorrow at 2pm EST --name \"Ada Lovelace\" --email ada@example.com\n  huddle doctor --json\n  huddle config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to load instead of huddle.toml or config/huddle.toml")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Send one free-text scheduling request to the agent and print its reply")]
    Schedule {
        #[arg(help = "Scheduling request, e.g. `lunch with Sam friday noon`")]
        text: Vec<String>,
        #[arg(long, help = "Display name of the requester")]
        name: Option<String>,
        #[arg(long, help = "Email of the requester, used as meeting organizer")]
        email: Option<String>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack token readiness, and gateway connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };

    let result = match cli.command {
        Command::Schedule { text, name, email, json } => commands::schedule::run(
            options,
            ScheduleArgs { instruction: text.join(" "), name, email, json },
        ),
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
