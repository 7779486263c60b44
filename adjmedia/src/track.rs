//! Référence de piste et métadonnées sondées
//!
//! Une [`TrackReference`] est un localisateur opaque (URL ou chemin local)
//! produit par la résolution de la rotation. Le moteur ne l'interprète
//! jamais : seul le fetcher sait le résoudre.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Localisateur opaque et immuable d'une piste (URL ou chemin local)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackReference(String);

impl TrackReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Métadonnées structurées retournées par le probe du fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackProbe {
    /// Titre brut tel que publié par la source
    pub title: String,
    /// Nom du compte ayant publié la piste
    pub uploader: String,
    /// Identifiant amont de la piste
    pub id: String,
}
