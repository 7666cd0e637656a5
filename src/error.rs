use thiserror::Error;

/// Failure to produce a usable configuration. The pipeline never starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Fatal conditions raised inside the running pipeline.
///
/// Every variant stops the pipeline; there is no retry and no skipping.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot open stream: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("stream read failed: {0}")]
    Read(String),

    #[error("stream ended")]
    Eof,

    #[error("malformed record {preview:?}: {source}")]
    Decode {
        preview: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    pub fn decode(line: &[u8], source: serde_json::Error) -> Self {
        let text = String::from_utf8_lossy(line);
        let preview = if text.len() > 100 {
            let mut end = 100;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &text[..end])
        } else {
            text.to_string()
        };
        PipelineError::Decode { preview, source }
    }
}
