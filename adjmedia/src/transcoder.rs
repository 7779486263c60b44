//! Encodeur externe (ffmpeg)
//!
//! Deux modes, correspondant aux deux usages du moteur :
//! - [`Transcoder::transcode`] : conversion one-shot d'un fichier téléchargé
//!   vers le format canonique du cache ;
//! - [`Transcoder::spawn_relay`] : le processus encodeur persistant, qui lit
//!   le pipe nommé et pousse le flux vers le point d'ingest. Il tourne
//!   jusqu'à être tué (ou jusqu'au refus de l'ingest) ; sa surveillance
//!   appartient au superviseur, pas à ce module.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::debug;

/// Default encoder binary
pub const DEFAULT_BINARY: &str = "ffmpeg";

/// Timeout d'une conversion one-shot (10 minutes)
pub const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 600;

/// Interface de l'encodeur externe
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convertit `input` vers `output` au bitrate demandé (kbit/s)
    async fn transcode(&self, input: &Path, output: &Path, bitrate: u32) -> Result<()>;

    /// Lance l'encodeur persistant : lit `pipe`, émet vers `ingest_url`
    ///
    /// Retourne le handle du processus ; l'appelant en devient propriétaire.
    fn spawn_relay(&self, pipe: &Path, ingest_url: &str, bitrate: u32) -> Result<Child>;
}

/// Encodeur de production pilotant le binaire `ffmpeg`
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
    transcode_timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            transcode_timeout: Duration::from_secs(DEFAULT_TRANSCODE_TIMEOUT_SECS),
        }
    }

    fn transcode_args(input: &Path, output: &Path, bitrate: u32) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            format!("{}k", bitrate),
            "-f".to_string(),
            "mp3".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn relay_args(pipe: &Path, ingest_url: &str, bitrate: u32) -> Vec<String> {
        // -re : cadence temps réel, l'ingest reçoit le flux au rythme de
        // diffusion même si le pipe est alimenté plus vite
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "warning".to_string(),
            "-re".to_string(),
            "-f".to_string(),
            "mp3".to_string(),
            "-i".to_string(),
            pipe.to_string_lossy().to_string(),
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            format!("{}k", bitrate),
            "-content_type".to_string(),
            "audio/mpeg".to_string(),
            "-f".to_string(),
            "mp3".to_string(),
            ingest_url.to_string(),
        ]
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, bitrate: u32) -> Result<()> {
        let args = Self::transcode_args(input, output, bitrate);
        debug!(binary=%self.binary, input=%input.display(), output=%output.display(), "Transcoding");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output_result = match tokio::time::timeout(self.transcode_timeout, cmd.output()).await {
            Ok(Ok(out)) => out,
            Ok(Err(source)) => {
                return Err(Error::Spawn {
                    tool: self.binary.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(Error::Timeout {
                    tool: self.binary.clone(),
                    seconds: self.transcode_timeout.as_secs(),
                });
            }
        };

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            return Err(Error::Transcode {
                input: input.display().to_string(),
                detail: stderr.trim().lines().last().unwrap_or("unknown").to_string(),
            });
        }
        Ok(())
    }

    fn spawn_relay(&self, pipe: &Path, ingest_url: &str, bitrate: u32) -> Result<Child> {
        let args = Self::relay_args(pipe, ingest_url, bitrate);
        debug!(binary=%self.binary, pipe=%pipe.display(), "Spawning persistent relay encoder");

        Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                tool: self.binary.clone(),
                source,
            })
    }
}
