use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::shutdown::ShutdownCoordinator;
use crate::error::PipelineError;

#[derive(Debug, Deserialize)]
struct Record {
    data: f64,
}

/// Decode one chunk. Each non-blank line must be a complete record; a single
/// bad line rejects the whole chunk.
pub fn decode_chunk(chunk: &[u8]) -> Result<Vec<f64>, PipelineError> {
    let mut samples = Vec::new();
    for line in chunk.split(|&b| b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let record: Record =
            serde_json::from_slice(line).map_err(|e| PipelineError::decode(line, e))?;
        samples.push(record.data);
    }
    Ok(samples)
}

/// Wait until the aggregator has taken every sample already sent. With a
/// one-slot handoff a free slot means the slot was drained.
async fn await_handoff(tx: &mpsc::Sender<f64>, cancel: &CancellationToken) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        permit = tx.reserve() => drop(permit),
    }
}

/// Producer stage: pull chunks, decode, hand samples to the aggregator.
///
/// Any read or decode failure, including the end of the stream, triggers
/// shutdown once the samples sent before it have been aggregated. Returns
/// the number of samples handed off.
pub async fn producer_task<S>(
    mut chunks: S,
    tx: mpsc::Sender<f64>,
    shutdown: ShutdownCoordinator,
) -> u64
where
    S: Stream<Item = Result<Bytes, PipelineError>> + Unpin,
{
    let cancel = shutdown.token();
    let mut produced = 0u64;

    let mut failure = None;

    'outer: loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Producer cancelled");
                break;
            }
            next = chunks.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                failure = Some(e);
                break;
            }
            None => {
                failure = Some(PipelineError::Eof);
                break;
            }
        };

        let samples = match decode_chunk(&chunk) {
            Ok(samples) => samples,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };

        for sample in samples {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Producer cancelled during send");
                    break 'outer;
                }
                result = tx.send(sample) => {
                    if result.is_err() {
                        tracing::warn!("Aggregator closed unexpectedly");
                        break 'outer;
                    }
                    produced += 1;
                }
            }
        }
    }

    if let Some(e) = failure {
        await_handoff(&tx, &cancel).await;
        shutdown.fatal(&e);
    }

    tracing::info!("Producer finished after {} samples", produced);
    produced
}
