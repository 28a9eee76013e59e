mod config;

use anyhow::Context;
use clap::Parser;
use config::{BenchConfig, CliArgs};
use core::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use viewer_bench::{
    GrpcTransport, SequenceController, random::Random, telemetry::init_telemetry,
};

// Using mimalloc for steadier allocation latency across long runs.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = BenchConfig::try_from(args).context("invalid configuration")?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));
    if let Some(deadline) = config.deadline {
        tokio::spawn(cancel_after(deadline, cancel.clone()));
    }

    let result = run(config, cancel.clone()).await;
    cancel.cancel();
    providers.shutdown();
    result
}

async fn run(config: BenchConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let transport = GrpcTransport::connect(&config.target, config.compression).await?;

    let mut controller = SequenceController::new(
        config.plan,
        config.pacing,
        transport,
        Random::from_seed(config.seed),
        cancel,
    );

    match controller.run().await {
        Ok(report) => {
            tracing::info!(
                creation_batches = report.creation_batches,
                mutation_batches = report.mutation_batches,
                recorded_slots = report.recorded_slots,
                skipped_slots = report.skipped_slots,
                skipped_groups = report.skipped_groups,
                elapsed_ms = report.elapsed.as_millis(),
                "Finished"
            );
            Ok(())
        }
        Err(err) => match err.phase() {
            Some(phase) => Err(err).with_context(|| format!("run failed during {phase} phase")),
            None => Err(err).context("run failed"),
        },
    }
}

fn log_startup_info(config: &BenchConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting viewer-bench with full config: {config:#?}");
    } else {
        tracing::info!(
            target = %config.target,
            batch_width = config.plan.batch_width,
            creation_batches = config.plan.creation_batches,
            rounds = config.plan.rounds,
            spawn_wait = ?config.pacing.spawn,
            set_position_wait = ?config.pacing.reposition,
            "Starting viewer-bench"
        );
    }
}

async fn cancel_after(deadline: Duration, cancel: CancellationToken) {
    tokio::select! {
        () = tokio::time::sleep(deadline) => {
            tracing::warn!(?deadline, "Run deadline reached, cancelling");
            cancel.cancel();
        }
        () = cancel.cancelled() => {}
    }
}

async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = cancel.cancelled() => return,
    }

    tracing::info!("Cancelling run...");
    cancel.cancel();
}
