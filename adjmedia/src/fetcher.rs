//! Media fetcher backed by the yt-dlp binary
//!
//! This module provides the [`MediaFetcher`] seam the rest of the engine is
//! written against, plus [`YtDlpFetcher`], the production implementation that
//! shells out to `yt-dlp`. Every call runs under a timeout and the child is
//! killed if the future is dropped, so a wedged tool can never stall the
//! rotation.
//!
//! # Example
//!
//! ```no_run
//! use adjmedia::{MediaFetcher, TrackReference, YtDlpFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = YtDlpFetcher::builder().build();
//!     let probe = fetcher
//!         .probe(&TrackReference::new("https://www.youtube.com/watch?v=abc123"))
//!         .await?;
//!     println!("{} - {}", probe.uploader, probe.title);
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::track::{TrackProbe, TrackReference};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default fetcher binary
pub const DEFAULT_BINARY: &str = "yt-dlp";

/// Default timeout for a single fetcher invocation (5 minutes — a download
/// of a long track over a slow link is still a success, not a hang)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Interface du « media fetcher » externe
///
/// Chaque méthode doit distinguer « la référence n'existe pas »
/// ([`Error::NotFound`]) d'un échec de l'outil ou du réseau.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Sonde les métadonnées d'une référence sans rien télécharger
    async fn probe(&self, track: &TrackReference) -> Result<TrackProbe>;

    /// Télécharge le meilleur flux audio disponible vers `target`
    async fn download(&self, track: &TrackReference, target: &Path) -> Result<()>;

    /// Développe une playlist en une liste plate de références
    async fn list_playlist(&self, playlist: &TrackReference) -> Result<Vec<TrackReference>>;
}

/// Fetcher de production pilotant le binaire `yt-dlp`
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary: String,
    cookies_file: Option<PathBuf>,
    timeout: Duration,
}

/// Builder for [`YtDlpFetcher`]
#[derive(Debug, Default)]
pub struct YtDlpFetcherBuilder {
    binary: Option<String>,
    cookies_file: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl YtDlpFetcherBuilder {
    /// Binaire à invoquer (défaut: `yt-dlp` dans le PATH)
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Fichier de cookies opaque transmis tel quel à l'outil
    pub fn cookies_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_file = Some(path.into());
        self
    }

    /// Timeout par invocation
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> YtDlpFetcher {
        YtDlpFetcher {
            binary: self.binary.unwrap_or_else(|| DEFAULT_BINARY.to_string()),
            cookies_file: self.cookies_file,
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

impl YtDlpFetcher {
    /// Create a fetcher with default settings
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the fetcher
    pub fn builder() -> YtDlpFetcherBuilder {
        YtDlpFetcherBuilder::default()
    }

    /// Arguments communs à toutes les invocations
    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string(), "--no-progress".to_string()];
        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }
        args
    }

    fn probe_args(&self, track: &TrackReference) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "--dump-single-json".to_string(),
            "--no-playlist".to_string(),
            "--skip-download".to_string(),
            track.as_str().to_string(),
        ]);
        args
    }

    fn download_args(&self, track: &TrackReference, target: &Path) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "--no-playlist".to_string(),
            "-o".to_string(),
            target.to_string_lossy().to_string(),
            track.as_str().to_string(),
        ]);
        args
    }

    fn playlist_args(&self, playlist: &TrackReference) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "--flat-playlist".to_string(),
            "--dump-single-json".to_string(),
            playlist.as_str().to_string(),
        ]);
        args
    }

    /// Lance le binaire et attend sa sortie, sous timeout
    async fn run(&self, args: &[String]) -> Result<std::process::Output> {
        debug!(binary=%self.binary, ?args, "Running fetcher");
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(Error::Spawn {
                tool: self.binary.clone(),
                source,
            }),
            Err(_) => Err(Error::Timeout {
                tool: self.binary.clone(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Marqueurs stderr signalant une référence inexistante côté source
const NOT_FOUND_MARKERS: &[&str] = &[
    "Video unavailable",
    "This video is not available",
    "Private video",
    "does not exist",
    "HTTP Error 404",
];

fn stderr_means_not_found(stderr: &str) -> bool {
    NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m))
}

fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .find(|l| l.contains("ERROR"))
        .or_else(|| stderr.lines().last())
        .unwrap_or("tool failed without diagnostics")
        .trim()
        .to_string()
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn probe(&self, track: &TrackReference) -> Result<TrackProbe> {
        let output = self.run(&self.probe_args(track)).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr_means_not_found(&stderr) {
                return Err(Error::NotFound(track.to_string()));
            }
            return Err(Error::Metadata {
                reference: track.to_string(),
                detail: first_error_line(&stderr),
            });
        }

        let doc: Value = serde_json::from_slice(&output.stdout)?;
        Ok(TrackProbe {
            title: doc
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Title")
                .to_string(),
            uploader: doc
                .get("uploader")
                .or_else(|| doc.get("channel"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown Uploader")
                .to_string(),
            id: doc
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn download(&self, track: &TrackReference, target: &Path) -> Result<()> {
        let output = self.run(&self.download_args(track, target)).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr_means_not_found(&stderr) {
                return Err(Error::NotFound(track.to_string()));
            }
            return Err(Error::Download {
                reference: track.to_string(),
                detail: first_error_line(&stderr),
            });
        }
        // yt-dlp peut réussir sans produire le fichier demandé (extracteur
        // exotique) : on le traite comme un échec de téléchargement
        if !target.exists() {
            return Err(Error::Download {
                reference: track.to_string(),
                detail: "tool exited successfully but produced no file".to_string(),
            });
        }
        Ok(())
    }

    async fn list_playlist(&self, playlist: &TrackReference) -> Result<Vec<TrackReference>> {
        let output = self.run(&self.playlist_args(playlist)).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr_means_not_found(&stderr) {
                return Err(Error::NotFound(playlist.to_string()));
            }
            return Err(Error::Playlist {
                reference: playlist.to_string(),
                detail: first_error_line(&stderr),
            });
        }

        let doc: Value = serde_json::from_slice(&output.stdout)?;
        let entries = match doc.get("entries").and_then(Value::as_array) {
            Some(entries) => entries,
            None => {
                // Référence directe passée par erreur : la garder telle quelle
                warn!(reference=%playlist, "No playlist entries in tool output");
                return Ok(vec![playlist.clone()]);
            }
        };

        let tracks: Vec<TrackReference> = entries
            .iter()
            .filter_map(|entry| {
                entry
                    .get("url")
                    .or_else(|| entry.get("webpage_url"))
                    .and_then(Value::as_str)
                    .map(TrackReference::new)
            })
            .collect();
        debug!(reference=%playlist, count = tracks.len(), "Expanded playlist");
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_args_carry_reference_and_json_flag() {
        let fetcher = YtDlpFetcher::new();
        let args = fetcher.probe_args(&TrackReference::new("https://x/watch?v=1"));
        assert!(args.contains(&"--dump-single-json".to_string()));
        assert!(args.contains(&"--skip-download".to_string()));
        assert_eq!(args.last().unwrap(), "https://x/watch?v=1");
    }

    #[test]
    fn cookies_file_is_forwarded() {
        let fetcher = YtDlpFetcher::builder().cookies_file("/tmp/cookies.txt").build();
        let args = fetcher.probe_args(&TrackReference::new("ref"));
        let pos = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[pos + 1], "/tmp/cookies.txt");
    }

    #[test]
    fn not_found_markers_detected() {
        assert!(stderr_means_not_found("ERROR: [youtube] abc: Video unavailable"));
        assert!(!stderr_means_not_found("ERROR: network is unreachable"));
    }

    #[test]
    fn first_error_line_prefers_error_marker() {
        let stderr = "WARNING: something\nERROR: it broke\ntrailing";
        assert_eq!(first_error_line(stderr), "ERROR: it broke");
    }
}
