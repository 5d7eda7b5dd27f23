//! Error handling for Deckflow
//!
//! Control-path operations return [`Result`]. The real-time read path never
//! surfaces these: faults there degrade to silence.

use thiserror::Error;

/// Result type alias for Deckflow operations
pub type Result<T> = std::result::Result<T, DeckflowError>;

/// Main error type for Deckflow operations
#[derive(Error, Debug)]
pub enum DeckflowError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio { reason: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Parameter Errors
    #[error("Invalid parameter {param}={value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Timeline Errors
    #[error("Invalid transition bounds: end {end} must be after start {start}")]
    InvalidTransitionBounds { start: u64, end: u64 },

    #[error("Transition {outgoing} -> {incoming} overlaps an existing transition on the same track")]
    TransitionOverlap { outgoing: String, incoming: String },

    #[error("Lane not found: {lane_id}")]
    LaneNotFound { lane_id: String },

    // Output Errors
    #[error("No audio output device found")]
    NoDevice,

    #[error("Audio device not found: {name}")]
    DeviceNotFound { name: String },

    #[error("No driver found for {mode} output")]
    NoDriver { mode: String },

    #[error("{mode} output is not available in this build")]
    BackendUnavailable { mode: String },

    #[error("Failed to build audio stream: {reason}")]
    StreamBuild { reason: String },

    #[error("Failed to control audio stream: {reason}")]
    StreamControl { reason: String },

    #[error("Output sink has not been initialized")]
    SinkNotInitialized,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeckflowError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            DeckflowError::FileNotFound { .. } => "FILE_NOT_FOUND",
            DeckflowError::InvalidAudio { .. } => "INVALID_AUDIO",
            DeckflowError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            DeckflowError::InvalidParameter { .. } => "INVALID_PARAMETER",
            DeckflowError::InvalidTransitionBounds { .. } => "INVALID_TRANSITION_BOUNDS",
            DeckflowError::TransitionOverlap { .. } => "TRANSITION_OVERLAP",
            DeckflowError::LaneNotFound { .. } => "LANE_NOT_FOUND",
            DeckflowError::NoDevice => "NO_DEVICE",
            DeckflowError::DeviceNotFound { .. } => "DEVICE_NOT_FOUND",
            DeckflowError::NoDriver { .. } => "NO_DRIVER",
            DeckflowError::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            DeckflowError::StreamBuild { .. } => "STREAM_BUILD",
            DeckflowError::StreamControl { .. } => "STREAM_CONTROL",
            DeckflowError::SinkNotInitialized => "SINK_NOT_INITIALIZED",
            DeckflowError::Io(_) => "IO_ERROR",
            DeckflowError::Wav(_) => "WAV_ERROR",
            DeckflowError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Device-level failures are recoverable because the sink factory can
    /// still fall back to a more compatible output tier.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DeckflowError::FileNotFound { .. }
                | DeckflowError::InvalidAudio { .. }
                | DeckflowError::UnsupportedFormat { .. }
                | DeckflowError::InvalidParameter { .. }
                | DeckflowError::TransitionOverlap { .. }
                | DeckflowError::NoDriver { .. }
                | DeckflowError::DeviceNotFound { .. }
                | DeckflowError::StreamBuild { .. }
                | DeckflowError::BackendUnavailable { .. }
        )
    }

    /// Whether the error came from the output device layer
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            DeckflowError::NoDevice
                | DeckflowError::DeviceNotFound { .. }
                | DeckflowError::NoDriver { .. }
                | DeckflowError::BackendUnavailable { .. }
                | DeckflowError::StreamBuild { .. }
                | DeckflowError::StreamControl { .. }
        )
    }
}
