//! # adjrelay
//!
//! Moteur de relais média continu d'AutoDJ : superviseur de l'encodeur
//! persistant, écrivain du pipe, résolveur de rotation, séquenceur de
//! lecture et synchroniseur du serveur de diffusion.
//!
//! Le point d'entrée est [`RelayEngine`] : il câble les composants, les
//! démarre, et porte l'arrêt ordonné. Chaque composant reste utilisable
//! isolément (et testé isolément).

mod bumper;
mod config_ext;
mod engine;
mod error;
mod icecast;
mod queue;
mod retry;
mod sequencer;
mod state;
mod supervisor;
mod sync;
mod writer;

pub use bumper::BumperSet;
pub use config_ext::RelayConfigExt;
pub use engine::{RelayEngine, RelaySettings};
pub use error::{Error, Result};
pub use icecast::{IcecastAdmin, parse_listeners};
pub use queue::QueueResolver;
pub use retry::RetryPolicy;
pub use sequencer::{PlaybackSequencer, SequencerPauses};
pub use state::{SharedState, StatusSnapshot};
pub use supervisor::{ProcessPhase, RelaySupervisor};
pub use sync::Synchronizer;
pub use writer::{ArtifactSink, PipeWriter};
