//! Error types for the relay engine

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the relay engine
///
/// Seule [`Error::NoSourcesConfigured`] est fatale ; tout le reste est
/// contenu localement (piste sautée, processus relancé, tick ignoré).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The rotation expanded to zero tracks — fatal at startup
    #[error("no rotation sources configured")]
    NoSourcesConfigured,

    /// The pipe write failed after exhausting its retries — skip the item
    #[error("pipe write failed after {attempts} attempts: {source}")]
    PipeWrite {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// The persistent encoder could not be spawned
    #[error("relay process error: {0}")]
    Process(#[from] adjmedia::Error),

    /// The pipe endpoint could not be created
    #[error("failed to create pipe endpoint {path}: {detail}")]
    PipeEndpoint { path: String, detail: String },

    /// Pushing now-playing metadata to the broadcast server failed
    /// (swallowed at the synchronizer boundary)
    #[error("metadata sync failed: {0}")]
    MetadataSync(reqwest::Error),

    /// Polling broadcast stats failed (swallowed at the synchronizer boundary)
    #[error("listener poll failed: {0}")]
    ListenerPoll(reqwest::Error),

    /// The engine is shutting down; no new work is started
    #[error("engine is shutting down")]
    Shutdown,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
