//! Séquenceur de lecture
//!
//! Machine à états explicite : `Resolving → Fetching(i) → BumperInject →
//! Streaming → …`, avec retour à `Resolving` (et remélange) quand la
//! rotation est épuisée. Aucun état terminal en fonctionnement normal : une
//! frontière d'erreur de haut niveau attrape tout échec non prévu, loggue,
//! attend, et reprend à `Resolving` au lieu de tomber.
//!
//! Un échec de fetch saute la piste et reste dans la rotation ; un échec
//! d'écriture après épuisement des réessais saute la piste de la même
//! façon. Seule une rotation vide est fatale.

use crate::bumper::BumperSet;
use crate::error::{Error, Result};
use crate::queue::QueueResolver;
use crate::state::SharedState;
use crate::writer::ArtifactSink;
use adjcache::{CacheEntry, TrackCache};
use adjmedia::TrackReference;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pauses du séquenceur
#[derive(Debug, Clone, Copy)]
pub struct SequencerPauses {
    /// Après une piste sautée, avant de passer à la suivante
    pub skip: Duration,
    /// Après une erreur attrapée par la frontière de haut niveau
    pub recover: Duration,
}

impl Default for SequencerPauses {
    fn default() -> Self {
        Self {
            skip: Duration::from_secs(2),
            recover: Duration::from_secs(5),
        }
    }
}

/// États de la machine de lecture
#[derive(Debug)]
enum Phase {
    /// Résoudre et mélanger la rotation
    Resolving,
    /// Matérialiser l'élément `i` de la rotation
    Fetching(usize),
    /// Injecter le prochain bumper avant l'élément `i`
    BumperInject { index: usize, entry: CacheEntry },
    /// Streamer l'élément `i`
    Streaming { index: usize, entry: CacheEntry },
}

/// Pilote de la boucle de diffusion
pub struct PlaybackSequencer {
    resolver: QueueResolver,
    cache: Arc<TrackCache>,
    sink: Arc<dyn ArtifactSink>,
    bumpers: BumperSet,
    state: SharedState,
    token: CancellationToken,
    pauses: SequencerPauses,
    /// Rotation courante, remélangée à chaque passage par `Resolving`
    queue: Vec<TrackReference>,
}

impl PlaybackSequencer {
    pub fn new(
        resolver: QueueResolver,
        cache: Arc<TrackCache>,
        sink: Arc<dyn ArtifactSink>,
        bumpers: BumperSet,
        state: SharedState,
        token: CancellationToken,
    ) -> Self {
        Self {
            resolver,
            cache,
            sink,
            bumpers,
            state,
            token,
            pauses: SequencerPauses::default(),
            queue: Vec::new(),
        }
    }

    pub fn with_pauses(mut self, pauses: SequencerPauses) -> Self {
        self.pauses = pauses;
        self
    }

    /// Boucle de diffusion ; ne retourne qu'à l'annulation ou sur erreur fatale
    pub async fn run(mut self) -> Result<()> {
        let mut phase = Phase::Resolving;
        while !self.token.is_cancelled() {
            match self.step(phase).await {
                Ok(next) => phase = next,
                Err(Error::NoSourcesConfigured) => {
                    error!("Rotation is empty, stopping the engine");
                    return Err(Error::NoSourcesConfigured);
                }
                Err(err) => {
                    // Frontière d'erreur : tout le reste se résorbe en
                    // reprenant une rotation fraîche
                    error!(error = %err, "Sequencer error, resuming rotation after pause");
                    self.pause(self.pauses.recover).await;
                    phase = Phase::Resolving;
                }
            }
        }
        info!("Sequencer stopped");
        Ok(())
    }

    /// Une transition de la machine à états
    async fn step(&mut self, phase: Phase) -> Result<Phase> {
        match phase {
            Phase::Resolving => {
                let mut queue = self.resolver.resolve().await?;
                QueueResolver::shuffle(&mut queue);
                info!(tracks = queue.len(), "Rotation resolved and shuffled");
                self.queue = queue;
                Ok(Phase::Fetching(0))
            }

            Phase::Fetching(index) => {
                let Some(track) = self.queue.get(index).cloned() else {
                    debug!("Rotation exhausted, reshuffling");
                    return Ok(Phase::Resolving);
                };
                match self.cache.ensure_artifact(&track).await {
                    Ok(entry) => Ok(Phase::BumperInject { index, entry }),
                    Err(err) => {
                        // Sauter l'élément, rester dans la rotation
                        warn!(reference = %track, error = %err, "Track unavailable, skipping");
                        self.pause(self.pauses.skip).await;
                        Ok(Phase::Fetching(index + 1))
                    }
                }
            }

            Phase::BumperInject { index, entry } => {
                match self.bumpers.next() {
                    Some(bumper) if bumper.exists() => {
                        if let Err(err) = self.sink.write_artifact(&bumper).await {
                            warn!(bumper = %bumper.display(), error = %err, "Bumper write failed");
                        }
                    }
                    Some(bumper) => {
                        // Fichier manquant : repli sur le silence
                        warn!(bumper = %bumper.display(), "Bumper file missing, writing silence instead");
                        if let Err(err) = self.sink.write_silence().await {
                            warn!(error = %err, "Silence write failed");
                        }
                    }
                    None => {
                        if let Err(err) = self.sink.write_silence().await {
                            warn!(error = %err, "Silence write failed");
                        }
                    }
                }
                Ok(Phase::Streaming { index, entry })
            }

            Phase::Streaming { index, entry } => {
                // Marquer le titre AVANT l'écriture : le tampon de
                // l'encodeur retarde l'antenne, pas l'inverse
                self.state.set_now_playing(&entry.key);
                info!(title = %entry.key, "Streaming track");
                if let Err(err) = self.sink.write_artifact(&entry.artifact_path).await {
                    // Réessais épuisés côté writer : sauter la piste
                    warn!(title = %entry.key, error = %err, "Stream write failed, skipping item");
                }
                Ok(Phase::Fetching(index + 1))
            }
        }
    }

    /// Pause interruptible par l'annulation
    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}
