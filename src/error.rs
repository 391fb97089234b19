// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the pose decoder.

use std::fmt;

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, PoseError>;

/// Main error type for the pose decoder.
///
/// Every variant is a precondition failure detected before any map is scanned.
/// Missing candidates and degenerate limbs are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoseError {
    /// Heatmap and PAF stacks disagree on width/height, or a stack has the wrong rank.
    ShapeMismatch(String),
    /// A stack has fewer channels than the skeleton references.
    ChannelMismatch(String),
    /// Invalid skeleton topology.
    SkeletonError(String),
    /// Invalid configuration provided.
    ConfigError(String),
}

impl fmt::Display for PoseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch(msg) => write!(f, "Shape mismatch: {msg}"),
            Self::ChannelMismatch(msg) => write!(f, "Channel mismatch: {msg}"),
            Self::SkeletonError(msg) => write!(f, "Skeleton error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for PoseError {}

impl From<rayon::ThreadPoolBuildError> for PoseError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ConfigError(format!("failed to build thread pool: {err}"))
    }
}
