// Error handling for the playback engine

/// Playback engine error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    /// The source could not be opened, demuxed or prepared for decoding
    #[error("Open error: {0}")]
    Open(String),

    /// The underlying seek was rejected; player state is unchanged
    #[error("Seek error: {0}")]
    Seek(String),

    /// A sink could not be initialized (e.g. no audio device)
    #[error("Sink initialization error: {0}")]
    SinkInit(String),

    /// Operation not legal in the current player state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Rejected configuration value (zero capacity, bad tolerance, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Device error (hardware issues)
    #[error("Device error: {0}")]
    Device(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, PlayerError>;

impl From<std::io::Error> for PlayerError {
    fn from(err: std::io::Error) -> Self {
        PlayerError::Io(err.to_string())
    }
}
