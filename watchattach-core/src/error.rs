use thiserror::Error;

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, AttachError>;

#[derive(Debug, Error)]
pub enum AttachError {
    #[error("application not running: {0}")]
    NotRunning(String),
    #[error("debugger failed to attach to {target}, count: {failures}")]
    LauncherRejected { target: String, failures: u32 },
    #[error("launcher error: {0}")]
    Launcher(String),
    #[error("error count has reached {0} - stopping retry attempts")]
    RetryCeiling(u32),
    #[error("attempt superseded by a newer one")]
    Superseded,
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("other error: {0}")]
    Other(String),
}

impl AttachError {
    /// 瞬时错误留在重试循环内部；其余错误终止本轮尝试。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AttachError::NotRunning(_)
                | AttachError::LauncherRejected { .. }
                | AttachError::Launcher(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(AttachError::NotRunning("app.exe".into()).is_retryable());
        assert!(AttachError::LauncherRejected {
            target: "app.exe".into(),
            failures: 1
        }
        .is_retryable());
        assert!(!AttachError::InvalidConfig("missing program".into()).is_retryable());
        assert!(!AttachError::TaskNotFound("watch".into()).is_retryable());
        assert!(!AttachError::Superseded.is_retryable());
    }

    #[test]
    fn rejection_message_carries_count() {
        let err = AttachError::LauncherRejected {
            target: "app.exe".into(),
            failures: 3,
        };
        assert_eq!(err.to_string(), "debugger failed to attach to app.exe, count: 3");
    }
}
