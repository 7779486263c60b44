//! Error types for the external media tools

/// Result type alias for media tool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when driving the media fetcher or the encoder
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Metadata probe failed
    #[error("metadata probe failed for {reference}: {detail}")]
    Metadata { reference: String, detail: String },

    /// Audio download failed
    #[error("download failed for {reference}: {detail}")]
    Download { reference: String, detail: String },

    /// Playlist expansion failed
    #[error("playlist expansion failed for {reference}: {detail}")]
    Playlist { reference: String, detail: String },

    /// One-shot transcode failed
    #[error("transcode of {input} failed: {detail}")]
    Transcode { input: String, detail: String },

    /// The reference does not exist upstream (distinct from a failure)
    #[error("source not found: {0}")]
    NotFound(String),

    /// The external tool did not finish within its timeout
    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    /// The external tool binary could not be spawned
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing of tool output failed
    #[error("unreadable tool output: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Vrai si l'erreur signifie « la référence n'existe pas en amont »
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
