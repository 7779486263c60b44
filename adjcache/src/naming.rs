//! Dérivation du nom canonique d'une piste
//!
//! Le cache est adressé par le nom de fichier « Uploader - Titre » dérivé des
//! métadonnées sondées. La dérivation est déterministe et idempotente : les
//! mêmes métadonnées produisent toujours le même chemin. Deux titres bruts
//! différents qui se normalisent vers le même texte entrent délibérément en
//! collision — c'est un hit de cache, pas un bug.

/// Longueur maximale (en caractères) d'une clé canonique
const MAX_KEY_CHARS: usize = 120;

/// Mots signalant qu'un segment entre crochets/parenthèses est du bruit
/// marketing et non une partie du titre
const NOISE_WORDS: &[&str] = &[
    "official",
    "video",
    "lyric",
    "lyrics",
    "audio",
    "visualizer",
    "visualiser",
    "hd",
    "hq",
    "4k",
    "remaster",
    "remastered",
    "mv",
    "m/v",
    "free download",
    "out now",
];

/// Supprime les segments `[...]` et `(...)` dont le contenu est du bruit
///
/// Les segments porteurs de sens (ex: `(acoustic)`, `[feat. X]`) sont
/// conservés tels quels.
fn strip_noise_segments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        let closing = match c {
            '[' => Some(']'),
            '(' => Some(')'),
            _ => None,
        };
        let Some(closing) = closing else {
            out.push(c);
            continue;
        };

        // Collecter le segment jusqu'au délimiteur fermant
        let mut segment = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == closing {
                closed = true;
                break;
            }
            segment.push(inner);
        }

        let lowered = segment.to_lowercase();
        let is_noise = NOISE_WORDS.iter().any(|w| lowered.contains(w));
        if !is_noise {
            out.push(c);
            out.push_str(&segment);
            if closed {
                out.push(closing);
            }
        }
    }

    out
}

/// Remplace les caractères interdits dans un nom de fichier
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = false;
    for c in raw.chars() {
        let mapped = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => ' ',
            c => c,
        };
        // Compresser les espaces successifs
        if mapped == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(mapped);
    }
    out.trim_matches(|c: char| c == ' ' || c == '.').to_string()
}

/// Nettoie un titre brut : segments de bruit retirés, espaces normalisés
pub fn clean_title(raw: &str) -> String {
    let stripped = strip_noise_segments(raw);
    sanitize(&stripped)
}

/// Dérive la clé canonique « Uploader - Titre » d'une piste
///
/// La clé est tronquée à une longueur raisonnable pour rester un nom de
/// fichier valide sur tous les systèmes.
pub fn canonical_key(uploader: &str, title: &str) -> String {
    let uploader = {
        let cleaned = clean_title(uploader);
        if cleaned.is_empty() { "Unknown".to_string() } else { cleaned }
    };
    let title = {
        let cleaned = clean_title(title);
        if cleaned.is_empty() { "Untitled".to_string() } else { cleaned }
    };

    let key = format!("{} - {}", uploader, title);
    if key.chars().count() <= MAX_KEY_CHARS {
        key
    } else {
        key.chars().take(MAX_KEY_CHARS).collect::<String>().trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_idempotent() {
        let a = canonical_key("Some Artist", "Great Song [Official Video]");
        let b = canonical_key("Some Artist", "Great Song [Official Video]");
        assert_eq!(a, b);
        assert_eq!(a, "Some Artist - Great Song");
    }

    #[test]
    fn marketing_noise_is_stripped() {
        assert_eq!(clean_title("Song (Official Audio)"), "Song");
        assert_eq!(clean_title("Song [HD] [Lyrics]"), "Song");
        // un segment porteur de sens survit
        assert_eq!(clean_title("Song (acoustic)"), "Song (acoustic)");
    }

    #[test]
    fn filesystem_unsafe_characters_are_replaced() {
        let key = canonical_key("AC/DC", "Back: In Black?");
        assert!(!key.contains('/'));
        assert!(!key.contains(':'));
        assert!(!key.contains('?'));
    }

    #[test]
    fn distinct_raw_titles_may_collide() {
        // Collision volontaire : même texte une fois le bruit retiré
        let a = canonical_key("Artist", "Song (Official Video)");
        let b = canonical_key("Artist", "Song [official audio]");
        assert_eq!(a, b);
    }

    #[test]
    fn long_keys_are_capped() {
        let title = "x".repeat(500);
        let key = canonical_key("Artist", &title);
        assert!(key.chars().count() <= 120);
    }

    #[test]
    fn empty_metadata_falls_back() {
        assert_eq!(canonical_key("", ""), "Unknown - Untitled");
    }
}
