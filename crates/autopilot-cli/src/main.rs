mod cli;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use autopilot_core::domain::{BatchId, TaskRow, TaskStatus};
use autopilot_core::ports::{InstantSleeper, SeededRandom};
use autopilot_core::store::TaskQuery;
use autopilot_core::{Pipeline, PipelineBuilder, PipelineConfig, PipelineError};
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, RunArgs, help_text, parse_args};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("error: {message}\n\n{}", help_text());
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Help => {
            println!("{}", help_text());
            ExitCode::SUCCESS
        }
        Command::Run(run_args) => match run(run_args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "run failed");
                ExitCode::FAILURE
            }
        },
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: RunArgs) -> Result<(), PipelineError> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let mut builder = PipelineBuilder::new(config);
    if let Some(seed) = args.seed {
        builder = builder.random(Arc::new(SeededRandom::new(seed)));
    }
    if args.instant {
        builder = builder.sleeper(Arc::new(InstantSleeper));
    }
    let pipeline = builder.build()?;

    let rows = (1..=args.tasks)
        .map(|i| TaskRow::new("ORG-1", format!("CMP-{i:03}"), format!("LE-{i:03}")))
        .collect();
    let receipt = pipeline.store.ingest_rows("Synthetic batch", rows).await?;

    let poll = if args.instant {
        Duration::from_millis(10)
    } else {
        Duration::from_millis(500)
    };

    pipeline.orchestrator.start_run(receipt.task_ids.clone());
    watch_progress(&pipeline, poll).await;
    print_counts(&pipeline, &receipt.batch_id).await?;

    if args.retry {
        let failed = pipeline
            .store
            .task_ids_with_status(Some(&receipt.batch_id), TaskStatus::Failed)
            .await?;
        if failed.is_empty() {
            println!("no failed tasks to retry");
        } else {
            println!("retrying {} failed task(s)", failed.len());
            pipeline.orchestrator.retry_run(failed);
            watch_progress(&pipeline, poll).await;
            print_counts(&pipeline, &receipt.batch_id).await?;
        }
    }
    Ok(())
}

/// Prints progress whenever it changes, until the run is over.
async fn watch_progress(pipeline: &Pipeline, poll: Duration) {
    let mut last = None;
    loop {
        let progress = pipeline.orchestrator.progress();
        if last != Some(progress) {
            println!("progress: {}/{}", progress.completed, progress.total);
            last = Some(progress);
        }
        if !progress.running {
            break;
        }
        tokio::time::sleep(poll).await;
    }
    pipeline.orchestrator.wait_idle().await;
}

async fn print_counts(pipeline: &Pipeline, batch_id: &BatchId) -> Result<(), PipelineError> {
    let query = TaskQuery::new(1, 1).batch(batch_id.clone());
    let page = pipeline.store.list_tasks(&query).await?;
    let json = serde_json::to_string_pretty(&page.count_by_status)
        .map_err(|e| PipelineError::internal(format!("cannot render status counts: {e}")))?;
    println!("{json}");
    Ok(())
}
