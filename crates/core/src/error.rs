/// Result alias that carries the custom [`LaserError`] type.
pub type Result<T> = std::result::Result<T, LaserError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LaserError {
    /// Every slot in the pool is occupied, even after compaction. The
    /// descriptor is dropped; callers treat this as a warning.
    #[error("oscillator pool is full ({capacity} slots)")]
    CapacityExceeded { capacity: usize },
    /// The descriptor violates a structural invariant of the pool.
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),
    /// The instruction file could not be parsed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spectrum analysis failed: {0}")]
    Fft(#[from] realfft::FftError),
}

impl LaserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn malformed<T: Into<String>>(reason: T) -> Self {
        Self::MalformedDescriptor(reason.into())
    }

    pub(crate) fn parse<T: Into<String>>(line: usize, message: T) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Returns true for failures the caller can log and move past.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

impl From<&str> for LaserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LaserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
