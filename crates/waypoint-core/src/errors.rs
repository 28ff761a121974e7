use std::time::Duration;

/// Typed errors for collaborator devices (camera, detector, recognizers,
/// feedback output). Classifies failures as recoverable — the session
/// returns to idle and the user can retry — or degradable, where the
/// session continues without the capability.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DeviceError {
    // Recoverable — session returns to idle
    #[error("speech recognition timed out after {0:?}")]
    RecognitionTimeout(Duration),
    #[error("nothing recognized")]
    NothingRecognized,
    #[error("device busy: {0}")]
    Busy(String),

    // Degradable — session proceeds without the capability
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    // Operational
    #[error("cancelled")]
    Cancelled,
    #[error("device io error: {0}")]
    Io(String),
}

impl DeviceError {
    /// True when the right response is to return the session to idle and
    /// let the user retry, rather than tearing anything down.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RecognitionTimeout(_) | Self::NothingRecognized | Self::Busy(_)
        )
    }

    /// True when the session can continue without the failed capability.
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::RecognitionTimeout(_) => "recognition_timeout",
            Self::NothingRecognized => "nothing_recognized",
            Self::Busy(_) => "busy",
            Self::Unavailable(_) => "unavailable",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(DeviceError::RecognitionTimeout(Duration::from_secs(8)).is_recoverable());
        assert!(DeviceError::NothingRecognized.is_recoverable());
        assert!(DeviceError::Busy("camera".into()).is_recoverable());
        assert!(!DeviceError::Cancelled.is_recoverable());
    }

    #[test]
    fn degradable_classification() {
        assert!(DeviceError::Unavailable("torch".into()).is_degradable());
        assert!(!DeviceError::Io("disconnect".into()).is_degradable());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(DeviceError::Cancelled.error_kind(), "cancelled");
        assert_eq!(
            DeviceError::RecognitionTimeout(Duration::from_secs(1)).error_kind(),
            "recognition_timeout"
        );
    }
}
