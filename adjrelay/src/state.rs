//! État de lecture partagé
//!
//! Le séquenceur et le synchroniseur écrivent chacun leur partie ; le point
//! de statut HTTP ne fait que lire. Verrou `std::sync::RwLock` : les
//! sections critiques sont de pures copies de champs, jamais d'attente
//! au travers d'un `.await`, donc les lectures ne bloquent pas sur les
//! écritures en pratique.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// État mutable du moteur
#[derive(Debug, Default)]
struct PlaybackState {
    /// Titre en cours de diffusion (clé canonique)
    current_title: Option<String>,
    /// Dernier changement de titre
    last_updated: Option<DateTime<Utc>>,
    /// Auditeurs du mount, `None` = inconnu (panne de poll comprise)
    listeners: Option<u32>,
    /// Vrai si l'encodeur persistant est vivant
    relay_up: bool,
    /// Nombre de relances de l'encodeur depuis le démarrage
    relay_restarts: u64,
}

/// Photographie sérialisable de l'état, exposée au point de statut
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub current_title: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub listeners: Option<u32>,
    pub relay_up: bool,
    pub relay_restarts: u64,
}

/// Poignée clonable sur l'état partagé
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<PlaybackState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre le titre en cours ; appelé AVANT le début de l'écriture
    /// dans le pipe (le tampon de l'encodeur retarde l'antenne)
    pub fn set_now_playing(&self, title: &str) {
        let mut state = self.inner.write().unwrap();
        state.current_title = Some(title.to_string());
        state.last_updated = Some(Utc::now());
    }

    /// Met à jour le compteur d'auditeurs (`None` = mesure indisponible)
    pub fn set_listeners(&self, listeners: Option<u32>) {
        self.inner.write().unwrap().listeners = listeners;
    }

    pub fn set_relay_up(&self, up: bool) {
        self.inner.write().unwrap().relay_up = up;
    }

    pub fn record_relay_restart(&self) {
        let mut state = self.inner.write().unwrap();
        state.relay_up = false;
        state.relay_restarts += 1;
    }

    /// Titre courant, tel que poussé vers le serveur de diffusion
    pub fn current_title(&self) -> Option<String> {
        self.inner.read().unwrap().current_title.clone()
    }

    /// Photographie cohérente de l'état complet
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.inner.read().unwrap();
        StatusSnapshot {
            current_title: state.current_title.clone(),
            last_updated: state.last_updated,
            listeners: state.listeners,
            relay_up: state.relay_up,
            relay_restarts: state.relay_restarts,
        }
    }
}
