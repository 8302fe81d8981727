use thiserror::Error;

/// Main error type for the Tempo-Tracker library
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Audio ingestion error: {0}")]
    Audio(#[from] AudioError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Streaming error: {0}")]
    Stream(#[from] StreamError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors raised while turning a file into a sample buffer
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio parameters: {details}")]
    InvalidParameters { details: String },
}

/// Errors raised by the offline analysis pipeline
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid parameter `{name}`: {details}")]
    InvalidParameter { name: String, details: String },

    #[error("Analysis failed: {reason}")]
    AnalysisFailed { reason: String },
}

/// Errors raised by a live detection session
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Audio block has {actual} samples, expected {expected}")]
    BlockSize { expected: usize, actual: usize },

    #[error("Audio device error: {reason}")]
    Device { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using TrackerError
pub type Result<T> = std::result::Result<T, TrackerError>;

impl AnalysisError {
    pub(crate) fn invalid<N: Into<String>, D: Into<String>>(name: N, details: D) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            details: details.into(),
        }
    }

    pub(crate) fn failed<S: Into<String>>(reason: S) -> Self {
        Self::AnalysisFailed {
            reason: reason.into(),
        }
    }
}

impl TrackerError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // IO errors might be temporary
            Self::Io(_) => true,
            // Loading might work on retry, a busy device might free up
            Self::Audio(AudioError::LoadFailed { .. }) => true,
            Self::Stream(StreamError::Device { .. }) => true,
            // Most other errors are permanent
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Audio(AudioError::LoadFailed { path }) => {
                format!("Could not load audio file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Audio(AudioError::UnsupportedFormat { format }) => {
                format!("Audio format '{}' is not supported. Supported formats: wav, mp3, flac, ogg, m4a, aac", format)
            }
            Self::Analysis(AnalysisError::AnalysisFailed { reason }) => {
                format!("No tempo could be estimated: {}", reason)
            }
            Self::Stream(StreamError::Device { reason }) => {
                format!("Could not open the input device ({}). Is a microphone connected?", reason)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_errors_convert_into_tracker_error() {
        let err: TrackerError = AnalysisError::invalid("hop_size", "must be positive").into();
        assert!(matches!(
            err,
            TrackerError::Analysis(AnalysisError::InvalidParameter { ref name, .. }) if name == "hop_size"
        ));
        assert!(err.to_string().contains("hop_size"));
    }

    #[test]
    fn test_recoverability() {
        let load: TrackerError = AudioError::LoadFailed { path: "a.wav".into() }.into();
        assert!(load.is_recoverable());

        let block: TrackerError = StreamError::BlockSize { expected: 1024, actual: 7 }.into();
        assert!(!block.is_recoverable());
    }

    #[test]
    fn test_user_message_mentions_path() {
        let err: TrackerError = AudioError::LoadFailed { path: "song.mp3".into() }.into();
        assert!(err.user_message().contains("song.mp3"));
    }
}
