//! Text folding and tokenization shared by every store client.

use std::collections::BTreeSet;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Normalized query/title tokens. Ordered so derivation is deterministic.
pub type TokenSet = BTreeSet<String>;

/// Tokens with this many characters or fewer are dropped.
pub const MIN_TOKEN_LEN: usize = 3;

/// Articles, prepositions and packaging words that carry no product identity.
pub const STOP_WORDS: &[&str] = &[
    "de", "del", "la", "el", "los", "las", "y", "o", "con", "para", "por", "un", "una", "pliego",
    "caja", "unidad", "unidades", "pack", "set", "pz", "pzas", "x", "bolsa",
];

/// Fold `text` to lowercase ASCII words separated by single spaces.
///
/// Accented letters are decomposed and their marks dropped; anything outside
/// `[a-z0-9]` becomes a separator.
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        for lc in c.to_lowercase() {
            if lc.is_ascii_lowercase() || lc.is_ascii_digit() {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(lc);
            } else {
                pending_space = true;
            }
        }
    }

    out
}

/// Derive the token set of `text`. Empty input yields an empty set.
pub fn normalize(text: &str) -> TokenSet {
    fold(text)
        .split_whitespace()
        .filter(|w| w.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Whether `phrase` occurs in `text` on word boundaries, after folding both.
///
/// Used by block-lists so that "ver" rejects "Ver más" but not "Cuaderno verde".
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    let phrase = fold(phrase);
    if phrase.is_empty() {
        return false;
    }
    let haystack = format!(" {} ", fold(text));
    haystack.contains(&format!(" {} ", phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_accents_and_punctuation() {
        assert_eq!(fold("Lápiz  GRAFITO N°2"), "lapiz grafito n 2");
        assert_eq!(fold("Cuaderno Universitario 100 hjs."), "cuaderno universitario 100 hjs");
        assert_eq!(fold("  ¡Ñandú!  "), "nandu");
        assert_eq!(fold(""), "");
    }

    #[test]
    fn drops_short_tokens_and_stop_words() {
        let tokens = normalize("Caja de lápices de colores x 12");
        let expected: TokenSet = ["colores", "lapices"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn empty_input_is_empty_set() {
        assert!(normalize("").is_empty());
        assert!(normalize("de la x 1").is_empty());
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = normalize("Témpera 12 colores Artel");
        let b = normalize("témpera 12 COLORES artel");
        assert_eq!(a, b);
    }

    #[test]
    fn phrase_matching_respects_word_boundaries() {
        assert!(contains_phrase("Ver más productos", "ver mas"));
        assert!(contains_phrase("Mi Cuenta", "mi cuenta"));
        assert!(!contains_phrase("Cuaderno verde", "ver"));
        assert!(!contains_phrase("Cuaderno", ""));
    }
}
