//! Extension pour intégrer les outils médias dans adjconfig
//!
//! Ce module fournit le trait `MediaToolsConfigExt` qui permet d'ajouter
//! facilement des méthodes de configuration des outils externes à
//! `adjconfig::Config`.
//!
//! # Exemple
//!
//! ```rust,ignore
//! use adjconfig::get_config;
//! use adjmedia::MediaToolsConfigExt;
//!
//! let config = get_config();
//! let fetcher = config.create_fetcher();
//! let transcoder = config.create_transcoder();
//! ```

use crate::{FfmpegTranscoder, YtDlpFetcher};
use adjconfig::Config;
use serde_yaml::Value;
use std::time::Duration;

/// Binaire fetcher par défaut
const DEFAULT_FETCHER_BINARY: &str = "yt-dlp";

/// Binaire encodeur par défaut
const DEFAULT_ENCODER_BINARY: &str = "ffmpeg";

/// Timeout par défaut d'une invocation du fetcher (secondes)
const DEFAULT_FETCHER_TIMEOUT_SECS: u64 = 300;

/// Trait d'extension pour configurer les outils médias externes
pub trait MediaToolsConfigExt {
    /// Récupère le binaire du fetcher (default: `yt-dlp`)
    fn get_fetcher_binary(&self) -> String;

    /// Récupère le fichier de cookies opaque du fetcher, s'il est configuré
    fn get_fetcher_cookies_file(&self) -> Option<String>;

    /// Récupère le timeout d'une invocation du fetcher
    fn get_fetcher_timeout(&self) -> Duration;

    /// Récupère le binaire de l'encodeur (default: `ffmpeg`)
    fn get_encoder_binary(&self) -> String;

    /// Crée un fetcher configuré
    fn create_fetcher(&self) -> YtDlpFetcher;

    /// Crée un encodeur configuré
    fn create_transcoder(&self) -> FfmpegTranscoder;
}

fn string_or(config: &Config, path: &[&str], default: &str) -> String {
    match config.get_value(path) {
        Ok(Value::String(s)) if !s.is_empty() => s,
        _ => default.to_string(),
    }
}

impl MediaToolsConfigExt for Config {
    fn get_fetcher_binary(&self) -> String {
        string_or(self, &["fetcher", "binary"], DEFAULT_FETCHER_BINARY)
    }

    fn get_fetcher_cookies_file(&self) -> Option<String> {
        match self.get_value(&["fetcher", "cookies_file"]) {
            Ok(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    fn get_fetcher_timeout(&self) -> Duration {
        let secs = match self.get_value(&["fetcher", "timeout_secs"]) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap(),
            _ => DEFAULT_FETCHER_TIMEOUT_SECS,
        };
        Duration::from_secs(secs)
    }

    fn get_encoder_binary(&self) -> String {
        string_or(self, &["encoder", "binary"], DEFAULT_ENCODER_BINARY)
    }

    fn create_fetcher(&self) -> YtDlpFetcher {
        let mut builder = YtDlpFetcher::builder()
            .binary(self.get_fetcher_binary())
            .timeout(self.get_fetcher_timeout());
        if let Some(cookies) = self.get_fetcher_cookies_file() {
            builder = builder.cookies_file(cookies);
        }
        builder.build()
    }

    fn create_transcoder(&self) -> FfmpegTranscoder {
        FfmpegTranscoder::with_binary(self.get_encoder_binary())
    }
}
