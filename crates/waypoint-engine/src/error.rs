use waypoint_core::DeviceError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("no matching target for \"{0}\"")]
    NoMatchingTarget(String),

    #[error("feature already active")]
    AlreadyActive,

    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    /// True when the failure resolves by returning the session to idle,
    /// leaving the user free to retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Device(e) => e.is_recoverable(),
            Self::NoMatchingTarget(_) => true,
            Self::AlreadyActive => true,
            Self::Internal(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn device_errors_convert() {
        let err: EngineError = DeviceError::RecognitionTimeout(Duration::from_secs(8)).into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn no_match_is_recoverable() {
        assert!(EngineError::NoMatchingTarget("giraffe".into()).is_recoverable());
        assert!(!EngineError::Internal("bug".into()).is_recoverable());
    }
}
