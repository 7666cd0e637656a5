use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::aggregator::StatsHandle;
use super::stats::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Periodic,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: u64,
    pub sum: f64,
    pub cumulative_mean: f64,
    pub moving_average: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub kind: ReportKind,
    /// `None` until the first sample has been aggregated.
    pub summary: Option<Summary>,
}

impl Report {
    pub fn from_snapshot(kind: ReportKind, snapshot: &Snapshot) -> Self {
        let summary = match (snapshot.cumulative_mean(), snapshot.windowed_mean) {
            (Some(cumulative_mean), Some(moving_average)) => Some(Summary {
                count: snapshot.count,
                sum: snapshot.sum,
                cumulative_mean,
                moving_average,
            }),
            _ => None,
        };
        Report { kind, summary }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            ReportKind::Periodic => "result",
            ReportKind::Final => "finish result",
        };
        match &self.summary {
            Some(s) => write!(
                f,
                "{}: {:.8} mov.avg {:.8} (samples: {})",
                label, s.cumulative_mean, s.moving_average, s.count
            ),
            None => write!(f, "{}: no data yet", label),
        }
    }
}

/// Side-effect hook receiving every report.
pub trait ReportSink: Send + Sync + 'static {
    fn emit(&self, report: &Report);
}

/// Prints report blocks to stdout.
pub struct ConsoleSink {
    period: Duration,
}

impl ConsoleSink {
    pub fn new(period: Duration) -> Self {
        ConsoleSink { period }
    }
}

impl ReportSink for ConsoleSink {
    fn emit(&self, report: &Report) {
        match report.kind {
            ReportKind::Periodic => {
                println!("***** every {} sec *****", self.period.as_secs());
                println!("{}\n---------------------", report);
            }
            ReportKind::Final => {
                println!("==================\n{}", report);
            }
        }
    }
}

/// Collects reports in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ReportSink for MemorySink {
    fn emit(&self, report: &Report) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(*report);
        }
    }
}

/// Lets exactly one party emit the final report.
#[derive(Debug, Clone, Default)]
pub struct FinalReportGate {
    emitted: Arc<OnceLock<Report>>,
}

impl FinalReportGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit the final report built from `snapshot` unless one was already
    /// emitted. Returns the report the sink received either way.
    pub fn emit<S: ReportSink + ?Sized>(&self, sink: &S, snapshot: &Snapshot) -> Report {
        *self.emitted.get_or_init(|| {
            let report = Report::from_snapshot(ReportKind::Final, snapshot);
            sink.emit(&report);
            report
        })
    }
}

/// Emit a periodic report every `period` until cancelled, then the final
/// report once the aggregator has settled.
pub fn spawn_reporter<S: ReportSink>(
    mut stats: StatsHandle,
    sink: Arc<S>,
    period: Duration,
    cancel: CancellationToken,
    gate: FinalReportGate,
) -> tokio::task::JoinHandle<Report> {
    tokio::spawn(async move {
        // First report one full period after start.
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let report = Report::from_snapshot(ReportKind::Periodic, &stats.snapshot());
                    sink.emit(&report);
                }
            }
        }

        let last = stats.settled().await;
        let report = gate.emit(sink.as_ref(), &last);
        tracing::info!("Final report: {}", report);
        report
    })
}
