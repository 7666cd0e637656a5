pub mod config;
pub mod error;
pub mod poll;

pub use config::Config;
pub use error::{ConfigError, PipelineError};
