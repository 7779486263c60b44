//! # adjmedia
//!
//! Intégration des outils médias externes d'AutoDJ : le « media fetcher »
//! (yt-dlp) et l'encodeur (ffmpeg). Le reste du moteur ne voit que les
//! traits [`MediaFetcher`] et [`Transcoder`] ; les implémentations de
//! production pilotent les binaires via des sous-processus sous timeout.

mod config_ext;
mod error;
mod fetcher;
mod track;
mod transcoder;

pub use config_ext::MediaToolsConfigExt;
pub use error::{Error, Result};
pub use fetcher::{MediaFetcher, YtDlpFetcher, YtDlpFetcherBuilder};
pub use track::{TrackProbe, TrackReference};
pub use transcoder::{FfmpegTranscoder, Transcoder};
