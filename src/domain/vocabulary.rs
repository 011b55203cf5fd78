// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Bidirectional mapping between symbols and integer indices.
//
//   - Built once from the symbols observed in train + valid text
//   - Indices follow the sorted order of distinct symbols, so the
//     same corpus always yields the same assignment
//   - Immutable after construction
//
// Only the symbol list is serialised; the reverse index is rebuilt
// on load.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("symbol {0:?} is not in the vocabulary")]
pub struct UnknownSymbol(pub char);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<char>", into = "Vec<char>")]
pub struct Vocabulary {
    itos: Vec<char>,
    stoi: HashMap<char, u32>,
}

impl Vocabulary {
    /// Collect the distinct symbols of every source.
    pub fn build<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = char>,
    {
        let distinct: BTreeSet<char> = symbols.into_iter().collect();
        Self::from(distinct.into_iter().collect::<Vec<_>>())
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    pub fn index(&self, symbol: char) -> Option<u32> {
        self.stoi.get(&symbol).copied()
    }

    pub fn symbol(&self, index: u32) -> Option<char> {
        self.itos.get(index as usize).copied()
    }

    /// Map symbols to indices, failing on the first unknown symbol.
    pub fn encode<I>(&self, symbols: I) -> Result<Vec<u32>, UnknownSymbol>
    where
        I: IntoIterator<Item = char>,
    {
        symbols
            .into_iter()
            .map(|c| self.index(c).ok_or(UnknownSymbol(c)))
            .collect()
    }
}

impl From<Vec<char>> for Vocabulary {
    fn from(itos: Vec<char>) -> Self {
        let stoi = itos
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u32))
            .collect();
        Self { itos, stoi }
    }
}

impl From<Vocabulary> for Vec<char> {
    fn from(v: Vocabulary) -> Self {
        v.itos
    }
}
