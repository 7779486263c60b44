//! Rotation des jingles de station
//!
//! Les bumpers sont de courts artefacts pré-produits injectés entre les
//! pistes. Le curseur avance de façon monotone modulo la taille du jeu,
//! indépendamment du sort de la piste qui suit.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Jeu ordonné de bumpers, parcouru en alternance
#[derive(Debug, Default)]
pub struct BumperSet {
    files: Vec<PathBuf>,
    cursor: AtomicUsize,
}

impl BumperSet {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Prochain bumper de la rotation ; `None` si le jeu est vide
    pub fn next(&self) -> Option<PathBuf> {
        if self.files.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.files.len();
        Some(self.files[index].clone())
    }
}
