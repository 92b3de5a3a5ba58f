/// Boxed error carried by [`TranscodeError::Emission`].
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type shared by the transcoder, its sinks and the streaming pipeline.
///
/// Marker problems are deliberately absent: an unmatched marker degrades to
/// literal text and is only logged.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("stream already finished")]
    StreamClosed,
    #[error("failed to emit event: {0}")]
    Emission(#[source] SinkError),
    #[error("upstream stream error: {0}")]
    Upstream(String),
}

impl TranscodeError {
    pub(crate) fn emission<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TranscodeError::Emission(Box::new(err))
    }

    /// Whether retrying the same call could ever succeed.
    ///
    /// `StreamClosed` is a caller bug; the other kinds depend on I/O.
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(self, TranscodeError::StreamClosed)
    }
}
