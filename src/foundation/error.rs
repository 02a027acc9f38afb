/// Result type used across the public wavereel API.
pub type ReelResult<T> = Result<T, ReelError>;

/// Top-level error taxonomy for wavereel.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid configuration (frame rate, colormap, output format, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed input recording (shapes, timestamps, annotations).
    #[error("data error: {0}")]
    Data(String),

    /// Failure while turning a frame plan into pixels.
    #[error("render error: {0}")]
    Render(String),

    /// Failure while writing rendered frames.
    #[error("encode error: {0}")]
    Encode(String),

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other error propagated from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::Data`].
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Build a [`ReelError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`ReelError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`ReelError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ReelError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(ReelError::data("x").to_string().contains("data error:"));
        assert!(ReelError::render("x").to_string().contains("render error:"));
        assert!(ReelError::encode("x").to_string().contains("encode error:"));
        assert!(
            ReelError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ReelError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
