//! Extension pour intégrer le cache de pistes dans adjconfig
//!
//! Ce module fournit le trait `TrackCacheConfigExt` qui permet d'ajouter
//! facilement des méthodes de gestion du cache à `adjconfig::Config`.
//!
//! # Exemple
//!
//! ```rust,ignore
//! use adjconfig::get_config;
//! use adjcache::TrackCacheConfigExt;
//!
//! let config = get_config();
//! let cache = config.create_track_cache(fetcher, transcoder, 128)?;
//! ```

use crate::TrackCache;
use adjconfig::Config;
use adjmedia::{MediaFetcher, Transcoder};
use anyhow::Result;
use std::sync::Arc;

const DEFAULT_CACHE_DIR: &str = "cache_audio";
const DEFAULT_SCRATCH_DIR: &str = "scratch";

/// Trait d'extension pour gérer le cache de pistes dans adjconfig
pub trait TrackCacheConfigExt {
    /// Récupère le répertoire des artefacts (default: `cache_audio`)
    fn get_cache_dir(&self) -> Result<String>;

    /// Définit le répertoire des artefacts
    fn set_cache_dir(&self, directory: String) -> Result<()>;

    /// Récupère le répertoire de travail (default: `scratch`)
    fn get_scratch_dir(&self) -> Result<String>;

    /// Crée une instance du cache configurée
    fn create_track_cache(
        &self,
        fetcher: Arc<dyn MediaFetcher>,
        transcoder: Arc<dyn Transcoder>,
        bitrate: u32,
    ) -> Result<Arc<TrackCache>>;
}

impl TrackCacheConfigExt for Config {
    fn get_cache_dir(&self) -> Result<String> {
        self.get_managed_dir(&["cache", "directory"], DEFAULT_CACHE_DIR)
    }

    fn set_cache_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(&["cache", "directory"], directory)
    }

    fn get_scratch_dir(&self) -> Result<String> {
        self.get_managed_dir(&["cache", "scratch_directory"], DEFAULT_SCRATCH_DIR)
    }

    fn create_track_cache(
        &self,
        fetcher: Arc<dyn MediaFetcher>,
        transcoder: Arc<dyn Transcoder>,
        bitrate: u32,
    ) -> Result<Arc<TrackCache>> {
        let dir = self.get_cache_dir()?;
        let scratch = self.get_scratch_dir()?;
        Ok(Arc::new(TrackCache::new(
            dir, scratch, bitrate, fetcher, transcoder,
        )?))
    }
}
