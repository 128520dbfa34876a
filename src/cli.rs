use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands;

#[derive(Debug, Parser)]
#[command(name = "extrator")]
#[command(about = "Billing-platform extraction loop daemon control CLI")]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the extraction loop daemon, or request an immediate cycle if
    /// one is already running.
    Start(CycleArgs),
    /// Stop the extraction loop daemon.
    Stop,
    /// Show daemon pid, liveness, persisted state and audit paths.
    Status,
    // Internal entry point used by the spawned daemon process.
    #[command(name = "run-internal", hide = true)]
    RunInternal(CycleArgs),
}

#[derive(Debug, Args, Default)]
pub struct CycleArgs {
    /// Skip the GraphQL invoice sub-task on every cycle.
    #[arg(long = "sem-faturas-graphql")]
    pub sem_faturas_graphql: bool,
}

fn print_report(report: &commands::CommandReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("command: {}", report.command);
    println!("ok: {}", report.ok);
    if !report.details.is_empty() {
        println!("details:");
        for detail in &report.details {
            println!("- {detail}");
        }
    }
    if !report.issues.is_empty() {
        println!("issues:");
        for issue in &report.issues {
            println!("- {issue}");
        }
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match &cli.command {
        Command::Start(args) => commands::daemon_start::run(!args.sem_faturas_graphql)?,
        Command::Stop => commands::daemon_stop::run()?,
        Command::Status => commands::daemon_status::run()?,
        Command::RunInternal(args) => commands::daemon_run::run(!args.sem_faturas_graphql)?,
    };

    print_report(&report, cli.json)?;

    if report.ok {
        Ok(())
    } else {
        std::process::exit(2);
    }
}
