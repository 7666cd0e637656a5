//! One-shot shutdown trigger shared by the signal listeners and the pipeline.

use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// OS termination signal, by name.
    Signal(&'static str),
    /// Fatal transport, read or decode error.
    Fatal(String),
}

impl ShutdownReason {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShutdownReason::Fatal(_))
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "received {}", name),
            ShutdownReason::Fatal(msg) => write!(f, "fatal error: {}", msg),
        }
    }
}

/// Cheap clonable handle: every clone observes the same cancellation and
/// only the first `trigger` wins.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave Running. Returns `false` if shutdown was already triggered.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            if let Some(reason) = self.reason.get() {
                tracing::info!("Shutting down: {}", reason);
            }
            self.token.cancel();
        }
        first
    }

    pub fn fatal(&self, err: &PipelineError) -> bool {
        tracing::error!("{}", err);
        self.trigger(ShutdownReason::Fatal(err.to_string()))
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().cloned()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

/// Route SIGHUP/SIGINT/SIGTERM (and SIGQUIT on unix) into the coordinator.
///
/// Must be called at most once per process.
pub fn install_signal_handlers(coordinator: &ShutdownCoordinator) -> anyhow::Result<()> {
    let on_signal = coordinator.clone();
    ctrlc::set_handler(move || {
        on_signal.trigger(ShutdownReason::Signal("termination signal"));
    })?;

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut quit = signal(SignalKind::quit())?;
        let on_quit = coordinator.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = quit.recv() => {
                    on_quit.trigger(ShutdownReason::Signal("SIGQUIT"));
                }
                _ = on_quit.triggered() => {}
            }
        });
    }

    Ok(())
}
