//! Module de gestion du cache de pistes
//!
//! Ce module matérialise une [`TrackReference`] en un artefact local prêt à
//! streamer, adressé par son nom canonique « Uploader - Titre ». Un hit ne
//! coûte ni réseau ni transcodage ; un miss télécharge le meilleur flux
//! audio via le fetcher, le convertit au format canonique via l'encodeur,
//! puis le place atomiquement dans le répertoire du cache.
//!
//! Les entrées persistent indéfiniment : la réutilisation prime sur la
//! fraîcheur, aucune éviction automatique.
//!
//! # Single-flight
//!
//! Pour une même clé, au plus un téléchargement/transcodage est en vol dans
//! tout le système. Les demandes concurrentes pour la même clé attendent le
//! premier vol au lieu de dupliquer le travail (verrou par clé, vérification
//! du chemin une fois le verrou acquis).

use crate::error::{Error, Result};
use crate::naming::canonical_key;
use adjmedia::{MediaFetcher, TrackReference, Transcoder};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Extension des artefacts canoniques
const ARTIFACT_EXTENSION: &str = "mp3";

/// Entrée matérialisée du cache
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Clé canonique (aussi le libellé « now playing »)
    pub key: String,
    /// Chemin de l'artefact prêt à streamer
    pub artifact_path: PathBuf,
    /// Date de matérialisation
    pub created_at: DateTime<Utc>,
}

/// Cache de pistes adressé par nom canonique
///
/// Conçu pour être partagé derrière un `Arc` ; la synchronisation interne
/// couvre la map des vols en cours.
pub struct TrackCache {
    /// Répertoire des artefacts canoniques
    dir: PathBuf,
    /// Répertoire de travail (téléchargements et conversions en cours)
    scratch_dir: PathBuf,
    /// Bitrate cible du format canonique (kbit/s)
    bitrate: u32,
    fetcher: Arc<dyn MediaFetcher>,
    transcoder: Arc<dyn Transcoder>,
    /// Verrous par clé des matérialisations en cours
    in_flight: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl TrackCache {
    /// Crée un cache ; les deux répertoires sont créés si nécessaire
    pub fn new(
        dir: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        bitrate: u32,
        fetcher: Arc<dyn MediaFetcher>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self> {
        let dir = dir.into();
        let scratch_dir = scratch_dir.into();
        std::fs::create_dir_all(&dir)?;
        std::fs::create_dir_all(&scratch_dir)?;

        Ok(Self {
            dir,
            scratch_dir,
            bitrate,
            fetcher,
            transcoder,
            in_flight: RwLock::new(HashMap::new()),
        })
    }

    /// Répertoire des artefacts
    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    /// Chemin canonique d'une clé
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ARTIFACT_EXTENSION))
    }

    /// Garantit qu'un artefact prêt à streamer existe pour `track`
    ///
    /// Sonde les métadonnées, dérive la clé canonique, et retourne
    /// immédiatement sur hit. Sur miss : téléchargement vers le scratch,
    /// transcodage, placement atomique, nettoyage du scratch.
    pub async fn ensure_artifact(&self, track: &TrackReference) -> Result<CacheEntry> {
        let probe = self
            .fetcher
            .probe(track)
            .await
            .map_err(Error::Metadata)?;
        let key = canonical_key(&probe.uploader, &probe.title);
        let artifact_path = self.artifact_path(&key);

        // Fast path : l'artefact existe déjà, aucun coût réseau/transcodage
        if artifact_path.exists() {
            debug!(key=%key, "Cache hit");
            return Self::entry_from_existing(key, artifact_path).await;
        }

        // Un seul vol par clé : les demandes concurrentes attendent ici
        let flight = {
            let mut in_flight = self.in_flight.write().await;
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = flight.lock().await;

        // Revérifier une fois le verrou acquis : le vol précédent a pu
        // matérialiser l'artefact pendant notre attente
        if artifact_path.exists() {
            debug!(key=%key, "Cache hit after awaited flight");
            return Self::entry_from_existing(key, artifact_path).await;
        }

        info!(key=%key, reference=%track, "Cache miss, materializing");
        let entry = self.materialize(track, &key, &artifact_path).await?;

        // Le vol a abouti : retirer le verrou de la map. Les attendeurs
        // encore accrochés à l'ancien Arc verront le chemin exister.
        // En cas d'échec l'entrée reste en place pour la prochaine rotation.
        self.in_flight.write().await.remove(&key);

        Ok(entry)
    }

    async fn entry_from_existing(key: String, artifact_path: PathBuf) -> Result<CacheEntry> {
        let created_at = tokio::fs::metadata(&artifact_path)
            .await?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(CacheEntry {
            key,
            artifact_path,
            created_at,
        })
    }

    /// Téléchargement + transcodage + placement atomique
    async fn materialize(
        &self,
        track: &TrackReference,
        key: &str,
        artifact_path: &Path,
    ) -> Result<CacheEntry> {
        let source_path = self.scratch_dir.join(format!("{}.source", key));
        let part_path = self
            .scratch_dir
            .join(format!("{}.{}.part", key, ARTIFACT_EXTENSION));

        let result = self
            .materialize_inner(track, &source_path, &part_path, artifact_path)
            .await;

        // Nettoyage du scratch dans tous les cas (ignorer un fichier absent)
        for leftover in [&source_path, &part_path] {
            if let Err(err) = tokio::fs::remove_file(leftover).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!(path=%leftover.display(), error=%err, "Failed to clean scratch file");
                }
            }
        }

        result?;
        info!(key=%key, path=%artifact_path.display(), "Artifact materialized");
        Ok(CacheEntry {
            key: key.to_string(),
            artifact_path: artifact_path.to_path_buf(),
            created_at: Utc::now(),
        })
    }

    async fn materialize_inner(
        &self,
        track: &TrackReference,
        source_path: &Path,
        part_path: &Path,
        artifact_path: &Path,
    ) -> Result<()> {
        self.fetcher
            .download(track, source_path)
            .await
            .map_err(Error::Download)?;

        self.transcoder
            .transcode(source_path, part_path, self.bitrate)
            .await
            .map_err(Error::Transcode)?;

        // Placement atomique : le cache ne contient jamais d'artefact partiel.
        // Scratch et cache sont supposés sur le même système de fichiers.
        tokio::fs::rename(part_path, artifact_path).await?;
        Ok(())
    }
}
