//! Per-tick failure kinds of the monitor loop.

/// A tick that could not complete. The loop logs it and carries on.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("recognition failed: {0}")]
    Recognition(String),
    #[error("injection failed: {0}")]
    Injection(String),
}

impl MonitorError {
    pub fn capture(err: anyhow::Error) -> Self {
        Self::Capture(format!("{:#}", err))
    }

    pub fn recognition(err: anyhow::Error) -> Self {
        Self::Recognition(format!("{:#}", err))
    }

    pub fn injection(err: anyhow::Error) -> Self {
        Self::Injection(format!("{:#}", err))
    }
}
