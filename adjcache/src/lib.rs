//! # adjcache
//!
//! Cache de contenu d'AutoDJ : matérialise les références de pistes en
//! artefacts locaux prêts à streamer, adressés par nom canonique, avec
//! single-flight par clé et sans éviction.

mod cache;
mod config_ext;
mod error;
pub mod naming;

pub use cache::{CacheEntry, TrackCache};
pub use config_ext::TrackCacheConfigExt;
pub use error::{Error, Result};
