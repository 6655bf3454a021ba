/// Crate-wide result alias.
pub type ReelResult<T> = Result<T, ReelError>;

/// Error taxonomy shared by the player, the capture pipeline and the muxer.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Malformed or unreachable source document.
    #[error("load error: {0}")]
    Load(String),

    /// Invalid options or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// Snapshot or frame serialization failure.
    #[error("render error: {0}")]
    Render(String),

    /// Audio channel failure (autoplay rejection, undecodable source).
    #[error("audio error: {0}")]
    Audio(String),

    /// External encoder process failure.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Capture was cancelled before playback reached the end.
    #[error("capture cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }
}
