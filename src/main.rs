mod cli;
mod command;
mod config;
mod error;
mod jobs;
mod manager;
mod platform;
mod ui;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use cli::{Cli, CliCommand};
use config::BotConfig;
use jobs::{Job, JobEvent, JobRegistry};
use manager::{CommandOutcome, JobManager};
use platform::SimPlatform;
use ui::JobProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = BotConfig::load()?;
    let registry = Arc::new(JobRegistry::new(
        config.event_capacity,
        config.max_finished_jobs,
    ));
    let platform = SimPlatform::new(Duration::from_millis(config.step_delay_ms));
    let manager = JobManager::new(registry, platform, config.spec_defaults());

    match cli.command {
        CliCommand::Run { text } => run_command(&manager, &text, &cli.requester).await?,
        CliCommand::Status { job } => println!("{}", manager.status_report(job.as_deref())),
        CliCommand::Cancel { job } => {
            manager.cancel(&job)?;
            println!("Cancellation requested for `{job}`.");
        }
        CliCommand::Demo => run_demo(&manager, &cli.requester).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "trainbot=debug" } else { "trainbot=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(fmt::layer())
        .init();
}

/// Interpret one comment and, when it starts a job, follow its progress
/// stream in the terminal until the terminal event.
async fn run_command(
    manager: &JobManager<SimPlatform>,
    text: &str,
    requester: &str,
) -> Result<()> {
    match manager.submit(text, requester) {
        Ok(CommandOutcome::Submitted { job }) => watch(manager, &job).await,
        Ok(CommandOutcome::Help(reply))
        | Ok(CommandOutcome::Status(reply))
        | Ok(CommandOutcome::Rejected(reply)) => {
            println!("{reply}");
            Ok(())
        }
        // A validation failure is the bot's reply, not a process error.
        Err(err) => {
            println!("{err}");
            Ok(())
        }
    }
}

async fn watch(manager: &JobManager<SimPlatform>, job: &Job) -> Result<()> {
    let progress = JobProgress::start(&job.id, job.spec.kind());
    let mut stream = manager.subscribe(&job.id)?;

    while let Some(event) = stream.next().await {
        match event {
            JobEvent::Progress(p) => progress.update(&p),
            JobEvent::Finished {
                state,
                result,
                error,
            } => {
                progress.complete(state, result.as_ref(), error.as_ref());
                if let Some(report) = &result {
                    progress.print_report(report);
                }
            }
        }
    }

    Ok(())
}

/// Scripted walk through the command surface.
async fn run_demo(manager: &JobManager<SimPlatform>, requester: &str) -> Result<()> {
    let script = [
        "/help",
        "/train --config=resnet --epochs=3",
        "/eval --model=baseline,candidate --metrics=accuracy,f1",
        "/test --type=smoke --samples=20",
        "/pipeline --steps=all --skip=test",
        "/status",
    ];

    for text in script {
        println!("\n> {text}");
        run_command(manager, text, requester).await?;
    }

    Ok(())
}
