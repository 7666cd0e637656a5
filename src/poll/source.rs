use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use std::time::Duration;

use crate::error::PipelineError;

/// Byte chunks as delivered by the upstream, ending at EOF.
pub type ChunkStream = BoxStream<'static, Result<Bytes, PipelineError>>;

/// Long-lived HTTP GET whose body is consumed chunk by chunk.
pub struct HttpSource {
    response: reqwest::Response,
}

impl HttpSource {
    /// Client with the pool tuning used for the feed connection.
    pub fn client() -> Result<reqwest::Client, PipelineError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(15))
            .no_proxy()
            .build()?;
        Ok(client)
    }

    pub async fn open(client: &reqwest::Client, url: &str) -> Result<Self, PipelineError> {
        tracing::info!("Opening stream {}", url);
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Status(status));
        }
        tracing::debug!("Stream open: status={}", status);
        Ok(HttpSource { response })
    }

    /// Dropping the stream closes the connection.
    pub fn into_chunks(self) -> ChunkStream {
        self.response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| PipelineError::Read(e.to_string())))
            .boxed()
    }
}
