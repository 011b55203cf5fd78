// ============================================================
// Layer 5 — Greedy Sampler
// ============================================================
// Probes the model once per epoch by continuing a fixed prompt.
// For each step:
//
//   1. Tokenise the text so far and keep the last `seq_len` symbols
//   2. Encode through the vocabulary → [len, 1] tensor
//   3. Forward from a fresh state
//   4. Append the argmax symbol at the final position
//
// Always greedy, so the same model and prompt give the same text.
// The caller passes an inference-mode model (model.valid()); the
// sampler never touches parameters.

use burn::prelude::*;
use thiserror::Error;

use crate::domain::tokenizer::Tokenizer;
use crate::domain::tracking::{Style, StyledText};
use crate::domain::vocabulary::{UnknownSymbol, Vocabulary};
use crate::ml::model::CharModel;

pub const DEFAULT_PROMPT: &str = "def train(";
pub const DEFAULT_STEPS: usize = 25;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("prompt cannot be encoded: {0}")]
    Encode(#[from] UnknownSymbol),

    #[error("model predicted index {0}, outside the vocabulary")]
    Decode(u32),
}

/// A prompt and the symbols generated after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub prompt:    String,
    pub generated: Vec<char>,
}

impl Sample {
    pub fn text(&self) -> String {
        let mut text = self.prompt.clone();
        text.extend(&self.generated);
        text
    }

    /// The prompt in subtle style, then each generated symbol as a value.
    pub fn styled(&self) -> StyledText {
        std::iter::once((self.prompt.clone(), Style::Subtle))
            .chain(self.generated.iter().map(|c| (c.to_string(), Style::Value)))
            .collect()
    }
}

pub struct GreedySampler<'a> {
    vocabulary: &'a Vocabulary,
    tokenizer:  Tokenizer,
    seq_len:    usize,
    steps:      usize,
}

impl<'a> GreedySampler<'a> {
    pub fn new(vocabulary: &'a Vocabulary, tokenizer: Tokenizer, seq_len: usize, steps: usize) -> Self {
        Self { vocabulary, tokenizer, seq_len: seq_len.max(1), steps }
    }

    pub fn sample<B, M>(&self, model: &M, prompt: &str, device: &B::Device) -> Result<Sample, SampleError>
    where
        B: Backend,
        M: CharModel<B>,
    {
        let mut symbols: Vec<char> = self.tokenizer.symbols(prompt).collect();
        if symbols.is_empty() {
            return Err(SampleError::EmptyPrompt);
        }
        let context = model.max_context().map_or(self.seq_len, |m| m.min(self.seq_len));
        let mut generated = Vec::with_capacity(self.steps);

        for _ in 0..self.steps {
            let tail    = &symbols[symbols.len().saturating_sub(context)..];
            let indices = self.vocabulary.encode(tail.iter().copied())?;
            let next    = self.predict_next(model, &indices, device);
            let symbol  = self.vocabulary.symbol(next).ok_or(SampleError::Decode(next))?;
            symbols.push(symbol);
            generated.push(symbol);
        }

        Ok(Sample { prompt: prompt.to_string(), generated })
    }

    fn predict_next<B: Backend, M: CharModel<B>>(&self, model: &M, indices: &[u32], device: &B::Device) -> u32 {
        let len  = indices.len();
        let flat: Vec<i32> = indices.iter().map(|&x| x as i32).collect();
        let input = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([len, 1]);

        let scores = model.forward(input, None).scores; // [len, 1, V]
        let [_, _, n_tokens] = scores.dims();
        let last = scores.slice([len - 1..len, 0..1, 0..n_tokens]);
        last.argmax(2).into_scalar().elem::<i64>() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::LstmModelConfig;
    use burn::backend::NdArray;

    type B = NdArray;

    fn vocabulary() -> Vocabulary {
        Vocabulary::build("def train(self):\n    pass\n".chars())
    }

    #[test]
    fn test_greedy_is_deterministic() {
        let device = Default::default();
        let vocab  = vocabulary();
        let model  = LstmModelConfig::new(vocab.len(), 8, 8, 1).init::<B>(&device);
        let sampler = GreedySampler::new(&vocab, Tokenizer::Character, 16, DEFAULT_STEPS);

        let a = sampler.sample::<B, _>(&model, DEFAULT_PROMPT, &device).unwrap();
        let b = sampler.sample::<B, _>(&model, DEFAULT_PROMPT, &device).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.generated.len(), 25);
        assert!(a.text().starts_with(DEFAULT_PROMPT));
    }

    #[test]
    fn test_styled_fragments() {
        let s = Sample { prompt: "ab".into(), generated: vec!['c', 'd'] };
        assert_eq!(
            s.styled(),
            vec![
                ("ab".to_string(), Style::Subtle),
                ("c".to_string(), Style::Value),
                ("d".to_string(), Style::Value),
            ]
        );
    }

    #[test]
    fn test_unknown_prompt_symbol() {
        let device = Default::default();
        let vocab  = vocabulary();
        let model  = LstmModelConfig::new(vocab.len(), 4, 4, 1).init::<B>(&device);
        let sampler = GreedySampler::new(&vocab, Tokenizer::Character, 16, 3);

        let err = sampler.sample::<B, _>(&model, "xyz", &device).unwrap_err();
        assert!(matches!(err, SampleError::Encode(UnknownSymbol('x'))));
        assert!(matches!(
            sampler.sample::<B, _>(&model, "", &device),
            Err(SampleError::EmptyPrompt)
        ));
    }
}
