//! Poll command: wire source, aggregator and reporter under one shutdown.

use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::aggregator::spawn_aggregator;
use super::decoder::producer_task;
use super::reporter::{spawn_reporter, FinalReportGate, Report, ReportSink};
use super::shutdown::{ShutdownCoordinator, ShutdownReason};
use super::source::HttpSource;
use crate::config::Config;

/// Samples in flight between producer and aggregator. Tokio has no
/// rendezvous channel; one slot is the closest equivalent.
const HANDOFF_CAPACITY: usize = 1;

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub reason: ShutdownReason,
    pub final_report: Report,
}

/// Poll `config.url` until a signal or a fatal stream error.
pub async fn run<S: ReportSink>(
    config: &Config,
    sink: Arc<S>,
    shutdown: ShutdownCoordinator,
) -> Result<RunOutcome> {
    let url = config.url.clone();

    run_pipeline(config, sink, shutdown, move |tx, shutdown| async move {
        let client = match HttpSource::client() {
            Ok(client) => client,
            Err(e) => {
                shutdown.fatal(&e);
                return 0;
            }
        };

        let opened = tokio::select! {
            biased;
            _ = shutdown.triggered() => return 0,
            opened = HttpSource::open(&client, &url) => opened,
        };

        match opened {
            Ok(source) => producer_task(source.into_chunks(), tx, shutdown).await,
            Err(e) => {
                shutdown.fatal(&e);
                0
            }
        }
    })
    .await
}

/// Run the pipeline with a caller-supplied producer stage.
///
/// The producer receives the sample sender and the coordinator; when it
/// returns, shutdown is triggered if nothing else did it first.
pub async fn run_pipeline<S, F, P>(
    config: &Config,
    sink: Arc<S>,
    shutdown: ShutdownCoordinator,
    producer: F,
) -> Result<RunOutcome>
where
    S: ReportSink,
    F: FnOnce(mpsc::Sender<f64>, ShutdownCoordinator) -> P,
    P: Future<Output = u64> + Send + 'static,
{
    tracing::info!(
        "Starting pipeline: url={}, period={}s, window={}",
        config.url,
        config.period,
        config.window
    );

    let cancel = shutdown.token();
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);

    let (stats, mut aggregator) = spawn_aggregator(rx, config.window, cancel.clone());
    let gate = FinalReportGate::new();
    let mut reporter = spawn_reporter(
        stats.clone(),
        Arc::clone(&sink),
        config.report_period(),
        cancel.clone(),
        gate.clone(),
    );

    let mut producer = {
        let stage = producer(tx, shutdown.clone());
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let produced = stage.await;
            shutdown.trigger(ShutdownReason::Fatal("sample source stopped".to_string()));
            produced
        })
    };

    // Running
    shutdown.triggered().await;
    let reason = shutdown
        .reason()
        .ok_or_else(|| anyhow!("cancelled without a shutdown reason"))?;
    tracing::info!("Draining: {}", reason);

    // Draining
    let drained = tokio::time::timeout(config.grace(), async {
        tokio::join!(&mut producer, &mut aggregator, &mut reporter)
    })
    .await;

    let final_report = match drained {
        Ok((produced, aggregated, reported)) => {
            let produced = produced?;
            let aggregated = aggregated?;
            tracing::info!(
                "Pipeline stopped: {} samples produced, {} aggregated",
                produced,
                aggregated.count()
            );
            reported?
        }
        Err(_) => {
            tracing::warn!(
                "Pipeline did not stop within {}s, aborting remaining tasks",
                config.grace_period
            );
            producer.abort();
            aggregator.abort();
            reporter.abort();
            // No-op if the reporter got its final report out before the abort.
            gate.emit(sink.as_ref(), &stats.snapshot())
        }
    };

    tracing::info!("Terminated");
    Ok(RunOutcome {
        reason,
        final_report,
    })
}
