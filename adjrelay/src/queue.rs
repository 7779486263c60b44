//! Résolution de la rotation
//!
//! Développe les entrées configurées (références directes et playlists) en
//! une séquence plate de [`TrackReference`]. L'échec du développement d'une
//! playlist n'avorte jamais la résolution : l'entrée est conservée comme
//! référence opaque unique et c'est le fetch qui tranchera.

use crate::error::{Error, Result};
use adjmedia::{MediaFetcher, TrackReference};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, warn};

/// Résolveur des sources configurées
pub struct QueueResolver {
    fetcher: Arc<dyn MediaFetcher>,
    sources: Vec<String>,
}

/// Heuristique : l'entrée désigne-t-elle une playlist ?
fn is_playlist_reference(source: &str) -> bool {
    source.contains("list=") || source.contains("/playlist") || source.contains("/sets/")
}

impl QueueResolver {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, sources: Vec<String>) -> Self {
        Self { fetcher, sources }
    }

    /// Développe les sources en une séquence plate de références
    ///
    /// Échoue avec [`Error::NoSourcesConfigured`] si le résultat est vide.
    pub async fn resolve(&self) -> Result<Vec<TrackReference>> {
        let mut tracks = Vec::new();

        for source in &self.sources {
            let reference = TrackReference::new(source.clone());
            if !is_playlist_reference(source) {
                tracks.push(reference);
                continue;
            }

            match self.fetcher.list_playlist(&reference).await {
                Ok(items) if !items.is_empty() => {
                    debug!(source = %source, count = items.len(), "Playlist expanded");
                    tracks.extend(items);
                }
                Ok(_) => {
                    warn!(source = %source, "Playlist expanded to nothing, keeping as opaque reference");
                    tracks.push(reference);
                }
                Err(err) => {
                    // Ne pas avorter : l'entrée reste une référence opaque
                    warn!(source = %source, error = %err, "Playlist expansion failed, keeping as opaque reference");
                    tracks.push(reference);
                }
            }
        }

        if tracks.is_empty() {
            return Err(Error::NoSourcesConfigured);
        }
        Ok(tracks)
    }

    /// Mélange uniforme, appliqué à chaque rotation
    pub fn shuffle(queue: &mut [TrackReference]) {
        queue.shuffle(&mut rand::rng());
    }
}
