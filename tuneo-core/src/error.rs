//! Error types shared by the whole tuner core.

use thiserror::Error;

/// Errors produced by the tuner core.
///
/// Only capture errors are fatal to a session. Estimator errors are
/// contained per frame by the driver and never escape a running session.
#[derive(Error, Debug)]
pub enum TunerError {
    #[error("No input device available")]
    NoInputDevice,
    #[error("Unsupported input sample format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to query input device: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),
    #[error("Failed to get default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("Failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("Failed to start input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("Input stream failed: {0}")]
    Stream(#[from] cpal::StreamError),
    #[error("Capture stopped before delivering a sample rate")]
    CaptureStopped,

    #[error("Pitch estimation failed: {0}")]
    Estimator(String),

    #[error("Unknown note: {0:?}")]
    UnknownNote(String),
    #[error("Invalid tuning: {0}")]
    InvalidTuning(String),
    #[error("Invalid pipeline config: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn pipeline thread: {0}")]
    Spawn(std::io::Error),
    #[error("Pipeline worker panicked")]
    WorkerPanicked,
}

impl TunerError {
    /// True for the failures shown to the user as "microphone access required".
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            TunerError::NoInputDevice
                | TunerError::UnsupportedFormat(_)
                | TunerError::DeviceName(_)
                | TunerError::DefaultConfig(_)
                | TunerError::BuildStream(_)
                | TunerError::PlayStream(_)
                | TunerError::Stream(_)
                | TunerError::CaptureStopped
        )
    }
}

pub type Result<T> = std::result::Result<T, TunerError>;
