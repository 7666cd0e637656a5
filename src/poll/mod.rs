//! Streaming poller: HTTP source, sample decoding, aggregation and reporting

pub mod aggregator;
pub mod decoder;
pub mod main;
pub mod reporter;
pub mod shutdown;
pub mod source;
pub mod stats;

pub use aggregator::{spawn_aggregator, StatsHandle};
pub use decoder::{decode_chunk, producer_task};
pub use main::{run, run_pipeline, RunOutcome};
pub use reporter::{spawn_reporter, ConsoleSink, FinalReportGate, MemorySink, Report, ReportKind, ReportSink, Summary};
pub use shutdown::{install_signal_handlers, ShutdownCoordinator, ShutdownReason};
pub use source::{ChunkStream, HttpSource};
pub use stats::{MovingAverage, RunningStatistics, Snapshot};
