// Value and key normalization applied before any comparison.
// Null stays null; everything else is trimmed. Case folding (keys only) and
// NFKC normalization are opt-in.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use unicode_normalization::UnicodeNormalization;

// Key part encoding for a null key value.
pub const NULL_KEY: &str = "\0";
// Separator between parts of a composite key value.
pub const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalizer {
    pub case_insensitive_keys: bool,
    pub unicode_nfkc: bool,
}

impl Normalizer {
    pub fn new(case_insensitive_keys: bool, unicode_nfkc: bool) -> Self {
        Self {
            case_insensitive_keys,
            unicode_nfkc,
        }
    }

    pub fn value<'a>(&self, raw: Option<&'a str>) -> Option<Cow<'a, str>> {
        let trimmed = raw?.trim();
        if self.unicode_nfkc {
            Some(Cow::Owned(trimmed.nfkc().collect()))
        } else {
            Some(Cow::Borrowed(trimmed))
        }
    }

    // Normalized values of the key columns, joined into one lookup string.
    // `positions` holds the key column positions within `values`; a missing
    // position is treated as null.
    pub fn key(&self, values: &[Option<String>], positions: &[Option<usize>]) -> String {
        let mut out = String::new();
        for (i, pos) in positions.iter().enumerate() {
            if i > 0 {
                out.push(KEY_SEPARATOR);
            }
            let raw = pos.and_then(|p| values.get(p)).and_then(|v| v.as_deref());
            match self.value(raw) {
                None => out.push_str(NULL_KEY),
                Some(v) if self.case_insensitive_keys => out.push_str(&v.to_lowercase()),
                Some(v) => out.push_str(&v),
            }
        }
        out
    }
}
