//! Error types for the content cache

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while materializing an artifact
///
/// Toutes ces erreurs sont locales à une piste : l'appelant saute l'élément
/// et la rotation continue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Metadata probe failed
    #[error("metadata fetch failed: {0}")]
    Metadata(#[source] adjmedia::Error),

    /// Audio download failed
    #[error("download failed: {0}")]
    Download(#[source] adjmedia::Error),

    /// Transcode to the canonical format failed
    #[error("transcode failed: {0}")]
    Transcode(#[source] adjmedia::Error),

    /// IO error while placing the artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
