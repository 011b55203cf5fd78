// ============================================================
// Layer 3 — Tokenizer
// ============================================================
// Splits raw text into symbols. This experiment works at the
// character level, so a symbol is one `char`.
//
// The tokenizer is a configuration choice (`tokenizer` setting),
// so it is serialisable and recorded in the run snapshot.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tokenizer {
    /// One symbol per Unicode scalar value.
    #[default]
    Character,
}

impl Tokenizer {
    pub fn symbols<'a>(&self, text: &'a str) -> impl Iterator<Item = char> + 'a {
        match self {
            Tokenizer::Character => text.chars(),
        }
    }
}
