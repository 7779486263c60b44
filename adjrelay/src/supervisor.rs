//! Superviseur du processus encodeur persistant
//!
//! Invariant : au plus un encodeur vivant à tout instant, en continu jusqu'à
//! l'arrêt complet du moteur. Le cycle de vie est une machine à états
//! explicite (Idle/Starting/Running/Restarting) pilotée par des
//! notifications de sortie : chaque processus lancé est surveillé par une
//! tâche moniteur qui possède le handle enfant et publie un [`ExitEvent`]
//! sur un canal mpsc. La boucle de relance consomme ces événements, attend
//! le backoff, et relance — sans plafond, le moteur doit tourner
//! indéfiniment.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::state::SharedState;
use adjmedia::Transcoder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Phase du cycle de vie du processus relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessPhase {
    /// Aucun processus, aucune relance en attente
    Idle,
    /// Spawn en cours (pipe + processus)
    Starting,
    /// Processus vivant
    Running,
    /// Sortie constatée, relance programmée
    Restarting,
}

/// Notification de sortie émise par la tâche moniteur
#[derive(Debug)]
struct ExitEvent {
    generation: u64,
    status: Option<std::process::ExitStatus>,
}

struct SupervisorInner {
    phase: ProcessPhase,
    /// Incrémentée à chaque spawn ; les handles d'écriture s'y raccrochent
    generation: u64,
    /// Canal d'extinction du processus courant
    kill_tx: Option<oneshot::Sender<()>>,
}

/// Superviseur de l'encodeur persistant lié au pipe et à l'URL d'ingest
pub struct RelaySupervisor {
    transcoder: Arc<dyn Transcoder>,
    pipe_path: PathBuf,
    ingest_url: String,
    bitrate: u32,
    backoff: RetryPolicy,
    state: SharedState,
    token: CancellationToken,
    inner: Mutex<SupervisorInner>,
    exit_tx: mpsc::UnboundedSender<ExitEvent>,
    /// Réceptacle pris par `spawn_restart_loop`
    exit_rx: Mutex<Option<mpsc::UnboundedReceiver<ExitEvent>>>,
}

impl RelaySupervisor {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        pipe_path: impl Into<PathBuf>,
        ingest_url: impl Into<String>,
        bitrate: u32,
        backoff: RetryPolicy,
        state: SharedState,
        token: CancellationToken,
    ) -> Arc<Self> {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            transcoder,
            pipe_path: pipe_path.into(),
            ingest_url: ingest_url.into(),
            bitrate,
            backoff,
            state,
            token,
            inner: Mutex::new(SupervisorInner {
                phase: ProcessPhase::Idle,
                generation: 0,
                kill_tx: None,
            }),
            exit_tx,
            exit_rx: Mutex::new(Some(exit_rx)),
        })
    }

    /// Chemin du pipe nommé alimentant l'encodeur
    pub fn pipe_path(&self) -> &Path {
        &self.pipe_path
    }

    /// Phase courante (instantanée)
    pub async fn phase(&self) -> ProcessPhase {
        self.inner.lock().await.phase
    }

    /// Génération du processus courant
    pub async fn generation(&self) -> u64 {
        self.inner.lock().await.generation
    }

    /// Garantit qu'un encodeur est vivant ; retourne sa génération
    ///
    /// Idempotent : si un processus tourne déjà, aucun effet. Sinon le pipe
    /// est (re)créé s'il manque et un nouveau processus est lancé.
    pub async fn ensure_running(&self) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        if inner.phase == ProcessPhase::Running {
            return Ok(inner.generation);
        }
        if self.token.is_cancelled() {
            return Err(Error::Shutdown);
        }

        inner.phase = ProcessPhase::Starting;
        if let Err(err) = self.ensure_pipe().await {
            inner.phase = ProcessPhase::Idle;
            return Err(err);
        }

        let child = match self
            .transcoder
            .spawn_relay(&self.pipe_path, &self.ingest_url, self.bitrate)
        {
            Ok(child) => child,
            Err(err) => {
                inner.phase = ProcessPhase::Idle;
                return Err(err.into());
            }
        };

        inner.generation += 1;
        let generation = inner.generation;
        let (kill_tx, kill_rx) = oneshot::channel();
        inner.kill_tx = Some(kill_tx);
        inner.phase = ProcessPhase::Running;
        self.state.set_relay_up(true);
        info!(generation, pid = ?child.id(), "Relay encoder running");

        tokio::spawn(monitor_child(child, generation, kill_rx, self.exit_tx.clone()));
        Ok(generation)
    }

    /// Demande l'extinction du processus courant (le writer l'appelle après
    /// un échec d'écriture) ; la relance passe par la boucle d'événements
    pub async fn request_restart(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(kill) = inner.kill_tx.take() {
            debug!(generation = inner.generation, "Restart requested, killing relay encoder");
            let _ = kill.send(());
        }
    }

    /// Boucle de relance : consomme les sorties, attend le backoff, relance
    ///
    /// À lancer une seule fois, au démarrage du moteur.
    pub fn spawn_restart_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let supervisor = self.clone();
        let mut exit_rx = self
            .exit_rx
            .try_lock()
            .expect("restart loop spawned twice")
            .take()
            .expect("restart loop spawned twice");

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = supervisor.token.cancelled() => break,
                    event = exit_rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                {
                    let mut inner = supervisor.inner.lock().await;
                    // Sortie d'une génération déjà remplacée : ignorer
                    if event.generation != inner.generation {
                        continue;
                    }
                    inner.phase = ProcessPhase::Restarting;
                    inner.kill_tx = None;
                }
                supervisor.state.record_relay_restart();
                warn!(
                    generation = event.generation,
                    status = ?event.status,
                    "Relay encoder exited, restarting after backoff"
                );

                // Relance inconditionnelle, sans plafond de tentatives
                loop {
                    supervisor.backoff.pause().await;
                    if supervisor.token.is_cancelled() {
                        return;
                    }
                    match supervisor.ensure_running().await {
                        Ok(_) => break,
                        Err(err) => {
                            error!(error = %err, "Relay respawn failed, retrying after backoff");
                        }
                    }
                }
            }
            debug!("Restart loop stopped");
        })
    }

    /// Éteint le processus et invalide l'état ; utilisé à l'arrêt du moteur
    ///
    /// Le token d'annulation doit déjà être annulé pour que la boucle de
    /// relance ne redémarre pas le processus tué ici.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(kill) = inner.kill_tx.take() {
            info!(generation = inner.generation, "Stopping relay encoder");
            let _ = kill.send(());
        }
        inner.phase = ProcessPhase::Idle;
        self.state.set_relay_up(false);
    }

    /// (Re)crée le pipe nommé s'il est absent
    async fn ensure_pipe(&self) -> Result<()> {
        if self.pipe_path.exists() {
            return Ok(());
        }
        info!(path = %self.pipe_path.display(), "Creating pipe endpoint");
        let status = Command::new("mkfifo")
            .arg(&self.pipe_path)
            .status()
            .await
            .map_err(|err| Error::PipeEndpoint {
                path: self.pipe_path.display().to_string(),
                detail: err.to_string(),
            })?;
        if !status.success() {
            return Err(Error::PipeEndpoint {
                path: self.pipe_path.display().to_string(),
                detail: format!("mkfifo exited with {}", status),
            });
        }
        Ok(())
    }
}

/// Tâche moniteur : possède le handle enfant, publie sa sortie
///
/// L'extinction demandée passe par le même canal de sortie ; la boucle de
/// relance distingue les deux cas via le token d'annulation.
async fn monitor_child(
    mut child: Child,
    generation: u64,
    kill_rx: oneshot::Receiver<()>,
    exit_tx: mpsc::UnboundedSender<ExitEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status.ok(),
        _ = kill_rx => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            None
        }
    };
    let _ = exit_tx.send(ExitEvent { generation, status });
}
