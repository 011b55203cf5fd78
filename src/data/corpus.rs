// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads the two raw text files of the source-code corpus:
//
//   <data_path>/train.py   → training split
//   <data_path>/valid.py   → validation split
//
// Both are read fully into memory once, at startup. The vocabulary
// is built from the symbols of BOTH splits so that every index in
// either sequence is in [0, vocabulary.len()).
//
// A missing or empty file is a fatal data error.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{ensure, Context, Result};
use std::{fs, path::Path, sync::Arc};

use crate::domain::tokenizer::Tokenizer;
use crate::domain::vocabulary::Vocabulary;

#[derive(Debug)]
pub struct Corpus {
    tokenizer:  Tokenizer,
    vocabulary: Vocabulary,
    train:      Arc<[u32]>,
    valid:      Arc<[u32]>,
}

impl Corpus {
    /// Load `train_file` and `valid_file` from `dir`.
    pub fn load(
        dir:        impl AsRef<Path>,
        train_file: &str,
        valid_file: &str,
        tokenizer:  Tokenizer,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let train = read_split(&dir.join(train_file))?;
        let valid = read_split(&dir.join(valid_file))?;

        let corpus = Self::from_texts(&train, &valid, tokenizer)?;
        tracing::info!(
            "Loaded corpus from '{}': {} train / {} valid symbols, vocabulary of {}",
            dir.display(),
            corpus.train.len(),
            corpus.valid.len(),
            corpus.vocabulary.len()
        );
        Ok(corpus)
    }

    /// Build a corpus from in-memory text.
    pub fn from_texts(train: &str, valid: &str, tokenizer: Tokenizer) -> Result<Self> {
        ensure!(!train.is_empty(), "training text is empty");
        ensure!(!valid.is_empty(), "validation text is empty");

        let vocabulary = Vocabulary::build(
            tokenizer.symbols(train).chain(tokenizer.symbols(valid)),
        );
        // Every symbol was just added to the vocabulary, so encoding cannot fail.
        let train = vocabulary.encode(tokenizer.symbols(train))?;
        let valid = vocabulary.encode(tokenizer.symbols(valid))?;

        Ok(Self {
            tokenizer,
            vocabulary,
            train: train.into(),
            valid: valid.into(),
        })
    }

    pub fn tokenizer(&self) -> Tokenizer {
        self.tokenizer
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn n_tokens(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn train(&self) -> Arc<[u32]> {
        self.train.clone()
    }

    pub fn valid(&self) -> Arc<[u32]> {
        self.valid.clone()
    }
}

fn read_split(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read corpus file '{}'", path.display()))?;
    ensure!(!text.is_empty(), "Corpus file '{}' is empty", path.display());
    tracing::debug!("Read {} bytes from '{}'", text.len(), path.display());
    Ok(text)
}
