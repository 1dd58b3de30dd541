//! Text folding helpers shared by header normalization and label matching

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Remove diacritics from Latin letters (`Dirección` -> `Direccion`, `ñ` -> `n`)
pub fn fold_diacritics(value: &str) -> String {
    value.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lowercased, diacritic-free form used for case-insensitive label comparison
pub fn fold_label(value: &str) -> String {
    fold_diacritics(value.trim()).to_lowercase()
}
