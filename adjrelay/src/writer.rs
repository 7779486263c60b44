//! Écrivain du pipe alimentant l'encodeur persistant
//!
//! Le moteur possède exactement un handle d'écriture sur le pipe, gardé
//! ouvert entre les pistes : le fermer signalerait une fin de flux à
//! l'encodeur, qui sortirait. Chaque écriture commence par un tampon de
//! silence qui masque la latence de démarrage de l'encodeur aux frontières
//! de pistes (les décodeurs MP3 se resynchronisent sur le prochain en-tête
//! de trame, le remplissage à zéro est inaudible).
//!
//! Une tentative échouée repart toujours de l'octet zéro du fichier — pas
//! de reprise partielle. Sur récupération, l'auditeur peut entendre un bref
//! doublon audio ; compromis assumé.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::supervisor::RelaySupervisor;
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Taille du tampon de silence de garde
const SILENCE_LEN: usize = 16 * 1024;

/// Silence de garde écrit avant chaque artefact
static SILENCE: [u8; SILENCE_LEN] = [0u8; SILENCE_LEN];

/// Délai maximal d'ouverture du pipe (l'ouverture en écriture bloque tant
/// qu'aucun lecteur n'est attaché)
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Taille du tampon de copie fichier → pipe
const COPY_BUF_LEN: usize = 64 * 1024;

/// Destination d'artefacts du séquenceur
///
/// Le [`PipeWriter`] est l'implémentation de production ; les tests du
/// séquenceur utilisent un enregistreur.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Écrit le silence de garde puis l'intégralité de l'artefact
    async fn write_artifact(&self, path: &Path) -> Result<()>;

    /// Écrit uniquement le silence de garde (repli d'un bumper manquant)
    async fn write_silence(&self) -> Result<()>;
}

/// Handle d'écriture raccroché à une génération de processus
struct WriterHandle {
    generation: u64,
    file: tokio::fs::File,
}

/// Écrivain unique du pipe, avec réessai sur échec d'E/S
pub struct PipeWriter {
    supervisor: Arc<RelaySupervisor>,
    retry: RetryPolicy,
    handle: Mutex<Option<WriterHandle>>,
}

impl PipeWriter {
    pub fn new(supervisor: Arc<RelaySupervisor>, retry: RetryPolicy) -> Self {
        Self {
            supervisor,
            retry,
            handle: Mutex::new(None),
        }
    }

    /// Une tentative : encodeur vivant, handle frais, silence + artefact
    async fn try_write(&self, artifact: Option<&Path>) -> io::Result<()> {
        let generation = self
            .supervisor
            .ensure_running()
            .await
            .map_err(io::Error::other)?;

        let mut guard = self.handle.lock().await;

        // (Ré)ouvrir si aucun handle, ou si le handle appartient à une
        // génération de processus déjà remplacée
        let stale = guard.as_ref().map(|h| h.generation != generation).unwrap_or(true);
        if stale {
            debug!(generation, pipe = %self.supervisor.pipe_path().display(), "Opening pipe write handle");
            let mut open_options = tokio::fs::OpenOptions::new();
            open_options.append(true);
            let open = open_options.open(self.supervisor.pipe_path());
            let file = tokio::time::timeout(OPEN_TIMEOUT, open)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "pipe open timed out"))??;
            *guard = Some(WriterHandle { generation, file });
        }
        let handle = guard.as_mut().expect("handle just installed");

        handle.file.write_all(&SILENCE).await?;

        if let Some(artifact) = artifact {
            // Toujours depuis l'octet zéro, jamais de reprise partielle
            let mut source = tokio::fs::File::open(artifact).await?;
            let mut buf = vec![0u8; COPY_BUF_LEN];
            loop {
                let n = source.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                handle.file.write_all(&buf[..n]).await?;
            }
        }
        handle.file.flush().await?;
        Ok(())
    }

    /// Boucle de réessai commune aux deux écritures
    async fn write_with_retries(&self, artifact: Option<&Path>) -> Result<()> {
        let mut last_error: Option<io::Error> = None;
        for attempt in 1..=self.retry.attempts {
            match self.try_write(artifact).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        attempt,
                        max_attempts = self.retry.attempts,
                        error = %err,
                        "Pipe write failed, recycling relay process"
                    );
                    last_error = Some(err);
                    // Jeter le handle et relancer l'encodeur avant de réessayer
                    *self.handle.lock().await = None;
                    self.supervisor.request_restart().await;
                    self.retry.pause().await;
                }
            }
        }
        Err(Error::PipeWrite {
            attempts: self.retry.attempts,
            source: last_error
                .unwrap_or_else(|| io::Error::other("write attempted zero times")),
        })
    }
}

#[async_trait]
impl ArtifactSink for PipeWriter {
    async fn write_artifact(&self, path: &Path) -> Result<()> {
        self.write_with_retries(Some(path)).await
    }

    async fn write_silence(&self) -> Result<()> {
        self.write_with_retries(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SharedState;
    use adjmedia::{Result as MediaResult, Transcoder};
    use std::process::Stdio;
    use tokio::process::{Child, Command};
    use tokio_util::sync::CancellationToken;

    struct LongLivedStub;

    #[async_trait]
    impl Transcoder for LongLivedStub {
        async fn transcode(
            &self,
            _input: &Path,
            _output: &Path,
            _bitrate: u32,
        ) -> MediaResult<()> {
            unreachable!("writer tests never transcode")
        }

        fn spawn_relay(&self, _pipe: &Path, _ingest: &str, _bitrate: u32) -> MediaResult<Child> {
            Ok(Command::new("sleep")
                .arg("30")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .unwrap())
        }
    }

    /// Un fichier régulier tient lieu de pipe : mêmes écritures, pas de
    /// sémantique bloquante, le contenu reste vérifiable
    #[tokio::test]
    async fn writes_guard_silence_then_artifact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let pipe = dir.path().join("relay.pipe");
        std::fs::write(&pipe, b"").unwrap();

        let artifact = dir.path().join("track.mp3");
        std::fs::write(&artifact, b"MP3DATA").unwrap();

        let token = CancellationToken::new();
        let supervisor = RelaySupervisor::new(
            Arc::new(LongLivedStub),
            &pipe,
            "icecast://source:pw@localhost:8000/live",
            128,
            RetryPolicy::fixed(3, Duration::from_millis(10)),
            SharedState::new(),
            token.clone(),
        );
        let writer = PipeWriter::new(
            supervisor.clone(),
            RetryPolicy::fixed(3, Duration::from_millis(10)),
        );

        writer.write_artifact(&artifact).await.unwrap();

        let written = std::fs::read(&pipe).unwrap();
        assert_eq!(written.len(), SILENCE_LEN + b"MP3DATA".len());
        assert!(written[..SILENCE_LEN].iter().all(|b| *b == 0));
        assert_eq!(&written[SILENCE_LEN..], b"MP3DATA");

        token.cancel();
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn missing_artifact_exhausts_retries() {
        let dir = tempfile::tempdir().unwrap();
        let pipe = dir.path().join("relay.pipe");
        std::fs::write(&pipe, b"").unwrap();

        let token = CancellationToken::new();
        let supervisor = RelaySupervisor::new(
            Arc::new(LongLivedStub),
            &pipe,
            "icecast://source:pw@localhost:8000/live",
            128,
            RetryPolicy::fixed(2, Duration::from_millis(10)),
            SharedState::new(),
            token.clone(),
        );
        let writer = PipeWriter::new(
            supervisor.clone(),
            RetryPolicy::fixed(2, Duration::from_millis(10)),
        );

        let missing = dir.path().join("nowhere.mp3");
        let err = writer.write_artifact(&missing).await.unwrap_err();
        assert!(matches!(err, Error::PipeWrite { attempts: 2, .. }));

        token.cancel();
        supervisor.shutdown().await;
    }
}
