use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use streamstat::poll::{
    producer_task, run_pipeline, MemorySink, Report, ReportKind, ShutdownCoordinator, ShutdownReason,
};
use streamstat::{Config, PipelineError};

fn config(period: u64, window: usize) -> Config {
    Config {
        url: "http://feed.invalid/stream".to_string(),
        period,
        window,
        grace_period: 5,
    }
}

fn record(value: f64) -> Result<Bytes, PipelineError> {
    Ok(Bytes::from(format!("{{\"data\": {}}}", value)))
}

fn finals(reports: &[Report]) -> Vec<Report> {
    reports.iter().filter(|r| r.kind == ReportKind::Final).copied().collect()
}

/// Trigger a signal once `after` has elapsed. Under paused time the clock
/// only advances once every other task is idle.
fn signal_after(shutdown: &ShutdownCoordinator, after: Duration) {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        shutdown.trigger(ShutdownReason::Signal("SIGINT"));
    });
}

#[tokio::test(start_paused = true)]
async fn test_window_scenario_then_signal() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = ShutdownCoordinator::new();
    signal_after(&shutdown, Duration::from_millis(1500));

    let chunks = stream::iter([10.0, 20.0, 30.0, 40.0].map(record)).chain(stream::pending());
    let outcome = run_pipeline(&config(1, 3), Arc::clone(&sink), shutdown, |tx, sd| {
        producer_task(chunks, tx, sd)
    })
    .await
    .unwrap();

    assert_eq!(outcome.reason, ShutdownReason::Signal("SIGINT"));
    let summary = outcome.final_report.summary.unwrap();
    assert_eq!(summary.count, 4);
    assert_eq!(summary.sum, 100.0);
    assert_eq!(summary.cumulative_mean, 25.0);
    assert_eq!(summary.moving_average, 30.0);

    let reports = sink.reports();
    let periodic: Vec<_> = reports.iter().filter(|r| r.kind == ReportKind::Periodic).collect();
    assert_eq!(periodic.len(), 1);
    assert_eq!(periodic[0].summary, outcome.final_report.summary);
    assert_eq!(finals(&reports), vec![outcome.final_report]);
    assert_eq!(reports.last(), Some(&outcome.final_report));
}

#[tokio::test(start_paused = true)]
async fn test_no_data_before_first_tick() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = ShutdownCoordinator::new();
    signal_after(&shutdown, Duration::from_millis(1100));

    let outcome = run_pipeline(&config(1, 5), Arc::clone(&sink), shutdown, |tx, sd| {
        producer_task(stream::pending(), tx, sd)
    })
    .await
    .unwrap();

    let reports = sink.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].kind, ReportKind::Periodic);
    assert_eq!(reports[0].summary, None);
    assert_eq!(reports[0].to_string(), "result: no data yet");
    assert_eq!(reports[1].kind, ReportKind::Final);
    assert_eq!(outcome.final_report.summary, None);
}

#[tokio::test(start_paused = true)]
async fn test_signal_mid_stream_reports_consumed_samples() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = ShutdownCoordinator::new();
    signal_after(&shutdown, Duration::from_millis(500));

    // Two samples arrive, the stream stalls, three more would follow.
    let stalled = stream::iter([1.0, 2.0].map(record))
        .chain(stream::pending())
        .chain(stream::iter([3.0, 4.0, 5.0].map(record)));
    let outcome = run_pipeline(&config(1, 5), Arc::clone(&sink), shutdown, |tx, sd| {
        producer_task(stalled, tx, sd)
    })
    .await
    .unwrap();

    let summary = outcome.final_report.summary.unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.sum, 3.0);
    assert_eq!(summary.moving_average, 1.5);
    assert_eq!(finals(&sink.reports()).len(), 1);
}

#[tokio::test]
async fn test_malformed_chunk_halts_acceptance() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = ShutdownCoordinator::new();

    let chunks = stream::iter(vec![
        record(10.0),
        record(20.0),
        Ok(Bytes::from_static(b"{\"data\": oops}")),
        record(30.0),
    ]);
    let outcome = run_pipeline(&config(60, 3), Arc::clone(&sink), shutdown, |tx, sd| {
        producer_task(chunks, tx, sd)
    })
    .await
    .unwrap();

    assert!(outcome.reason.is_fatal());
    // Exactly the samples before the bad chunk.
    let summary = outcome.final_report.summary.unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.sum, 30.0);
    assert_eq!(summary.moving_average, 15.0);
    assert_eq!(finals(&sink.reports()), vec![outcome.final_report]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_malformed_chunk_keeps_prior_samples_under_contention() {
    for _ in 0..100 {
        let sink = Arc::new(MemorySink::new());
        let chunks = stream::iter(vec![
            record(10.0),
            record(20.0),
            Ok(Bytes::from_static(b"oops")),
        ]);
        let outcome = run_pipeline(&config(60, 3), sink, ShutdownCoordinator::new(), |tx, sd| {
            producer_task(chunks, tx, sd)
        })
        .await
        .unwrap();

        let summary = outcome.final_report.summary.unwrap();
        assert_eq!((summary.count, summary.sum), (2, 30.0));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_of_stream_aggregates_every_sample() {
    let values = [1.0, 2.0, 3.0, 4.0, 5.0];
    for _ in 0..100 {
        let sink = Arc::new(MemorySink::new());
        let chunks = stream::iter(values.map(record));
        let outcome = run_pipeline(&config(60, 2), Arc::clone(&sink), ShutdownCoordinator::new(), |tx, sd| {
            producer_task(chunks, tx, sd)
        })
        .await
        .unwrap();

        match &outcome.reason {
            ShutdownReason::Fatal(msg) => assert!(msg.contains("stream ended"), "{}", msg),
            other => panic!("unexpected reason {:?}", other),
        }
        let summary = outcome.final_report.summary.unwrap();
        assert_eq!(summary.count, values.len() as u64);
        assert_eq!(summary.sum, 15.0);
        assert_eq!(summary.cumulative_mean, 3.0);
        assert_eq!(summary.moving_average, 4.5);
        assert_eq!(finals(&sink.reports()), vec![outcome.final_report]);
    }
}

#[tokio::test]
async fn test_repeated_triggers_yield_single_final_report() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = ShutdownCoordinator::new();
    let extra = shutdown.clone();

    let outcome = run_pipeline(&config(60, 2), Arc::clone(&sink), shutdown, move |tx, sd| {
        async move {
            extra.trigger(ShutdownReason::Signal("SIGTERM"));
            extra.trigger(ShutdownReason::Signal("SIGHUP"));
            producer_task(stream::pending(), tx, sd).await
        }
    })
    .await
    .unwrap();

    assert_eq!(outcome.reason, ShutdownReason::Signal("SIGTERM"));
    assert_eq!(finals(&sink.reports()).len(), 1);
}

#[tokio::test]
async fn test_producer_exit_without_error_still_shuts_down() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = ShutdownCoordinator::new();

    let outcome = run_pipeline(&config(60, 2), Arc::clone(&sink), shutdown, |tx, _sd| async move {
        drop(tx);
        0
    })
    .await
    .unwrap();

    match outcome.reason {
        ShutdownReason::Fatal(msg) => assert!(msg.contains("sample source stopped")),
        other => panic!("unexpected reason {:?}", other),
    }
    assert_eq!(finals(&sink.reports()).len(), 1);
}
