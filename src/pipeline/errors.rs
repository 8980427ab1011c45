// Error types for the download pipeline

use thiserror::Error;

use super::models::TrackKind;
use super::resolver::ResolveReason;

/// Everything that can go wrong between a pasted URL and delivered bytes.
///
/// Kinds are distinguished so callers can decide programmatically whether a
/// failure is worth retrying (transient network, provider hiccup) or not
/// (missing executable, bad itag).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input does not parse as an http(s) URL; nothing was spawned
    #[error("invalid video URL: {0}")]
    InvalidUrl(String),

    /// The metadata provider could not describe the source
    #[error("could not fetch video details: {reason}")]
    Resolve {
        reason: ResolveReason,
        /// First useful lines of the provider's diagnostic output
        detail: String,
    },

    /// Neither the Python module nor the native extraction binary is present
    #[error("extraction tool not found: {0}")]
    ToolNotFound(String),

    /// An explicit itag did not match any resolved stream
    #[error("no stream with itag {0}")]
    UnknownStream(u32),

    /// A split selection is missing one of its halves
    #[error("no {0} stream available for this video")]
    MissingTrack(TrackKind),

    /// Network failure while copying stream bytes to disk
    #[error("download failed: {0}")]
    Fetch(String),

    /// The encoder executable is not on this host
    #[error("encoder not found: {0}")]
    EncoderNotFound(String),

    /// The encoder ran and rejected the inputs
    #[error("merge failed (exit status {status})")]
    MergeFailed {
        status: i32,
        /// Captured encoder diagnostics
        stderr: String,
    },

    /// Temp directory or artifact file could not be created/read
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl PipelineError {
    /// True when trying the same request again might succeed unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Resolve { reason, .. } => reason.is_retryable(),
            Self::Fetch(_) => true,
            _ => false,
        }
    }

    /// True for failures the caller themselves can fix (bad input),
    /// as opposed to host or upstream problems.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_) | Self::UnknownStream(_) | Self::MissingTrack(_)
        ) || matches!(
            self,
            Self::Resolve { reason, .. } if reason.is_input_error()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_is_retryable() {
        assert!(PipelineError::Fetch("connection reset".to_string()).is_retryable());
    }

    #[test]
    fn test_tooling_is_not_retryable() {
        assert!(!PipelineError::EncoderNotFound("ffmpeg".to_string()).is_retryable());
        assert!(!PipelineError::ToolNotFound("yt-dlp".to_string()).is_retryable());
    }

    #[test]
    fn test_retryable_follows_resolve_reason() {
        let transient = PipelineError::Resolve {
            reason: ResolveReason::NetworkTimeout,
            detail: String::new(),
        };
        assert!(transient.is_retryable());

        let gone = PipelineError::Resolve {
            reason: ResolveReason::Unavailable,
            detail: String::new(),
        };
        assert!(!gone.is_retryable());
    }

    #[test]
    fn test_input_error_classification() {
        assert!(PipelineError::UnknownStream(137).is_input_error());
        assert!(PipelineError::InvalidUrl("ftp://x".to_string()).is_input_error());
        assert!(!PipelineError::EncoderNotFound("ffmpeg".to_string()).is_input_error());
    }
}
