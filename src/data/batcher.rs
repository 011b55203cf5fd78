// ============================================================
// Layer 4 — Sequential Batch Source
// ============================================================
// Cuts one index sequence into (seq_len, batch_size) windows that
// keep temporal order ACROSS batches, so a recurrent model can carry
// its hidden state from one window to the next.
//
// How it works, for L symbols, batch B and window T:
//
//   1. Split the sequence into B contiguous sub-streams of
//      n = floor(L / B) symbols (the tail beyond B·n is dropped)
//
//        stream 0: s[0   .. n  ]
//        stream 1: s[n   .. 2n ]
//        ...
//
//   2. Window w takes rows w·T .. w·T+T of every stream, so column b
//      of consecutive windows is one unbroken slice of stream b
//
//   3. floor(n / T) windows per pass; a final partial window is dropped
//
// Targets are the next symbol in the full sequence. The very last
// symbol has no successor: when B·n == L it is still read as an
// input, its target slot holds symbol 0 and the position is marked
// as not kept, so loss and accuracy skip it.
//
// Reference: Burn Book §4 (Batcher)

use anyhow::{ensure, Result};
use burn::prelude::*;
use std::sync::Arc;

/// One (seq_len, batch_size) block of inputs and next-symbol targets,
/// stored row-major: element (t, b) is at `t * batch_size + b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub seq_len:    usize,
    pub batch_size: usize,
    pub inputs:     Vec<u32>,
    pub targets:    Vec<u32>,
    /// False where the target is not a real next symbol.
    pub keep:       Vec<bool>,
}

impl Window {
    pub fn shape(&self) -> (usize, usize) {
        (self.seq_len, self.batch_size)
    }

    pub fn input(&self, t: usize, b: usize) -> u32 {
        self.inputs[t * self.batch_size + b]
    }

    pub fn target(&self, t: usize, b: usize) -> u32 {
        self.targets[t * self.batch_size + b]
    }

    /// Integer tensors of shape [seq_len, batch_size] on `device`.
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 2, Int>, Tensor<B, 2, Int>) {
        let shape = [self.seq_len, self.batch_size];
        let to_tensor = |values: &[u32]| {
            let flat: Vec<i32> = values.iter().map(|&x| x as i32).collect();
            Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape(shape)
        };
        (to_tensor(&self.inputs), to_tensor(&self.targets))
    }

    /// Per-position loss weights [seq_len, batch_size]: 1.0 kept, 0.0 skipped.
    pub fn weights<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let (t, b) = self.shape();
        let flat: Vec<f32> = self.keep.iter().map(|&k| if k { 1.0 } else { 0.0 }).collect();
        Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([t, b])
    }
}

#[derive(Debug, Clone)]
pub struct SequentialBatches {
    data:       Arc<[u32]>,
    batch_size: usize,
    seq_len:    usize,
    stream_len: usize,
}

impl SequentialBatches {
    pub fn new(data: Arc<[u32]>, batch_size: usize, seq_len: usize) -> Result<Self> {
        ensure!(batch_size > 0, "batch_size must be positive");
        ensure!(seq_len > 0, "seq_len must be positive");
        let stream_len = data.len() / batch_size;
        Ok(Self { data, batch_size, seq_len, stream_len })
    }

    /// Windows per pass: floor(floor(L / B) / T).
    pub fn len(&self) -> usize {
        self.stream_len / self.seq_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a fresh pass. Each pass is consumed once.
    pub fn windows(&self) -> Windows<'_> {
        Windows { source: self, next: 0 }
    }

    fn window(&self, w: usize) -> Window {
        let (t_len, b_len) = (self.seq_len, self.batch_size);
        let total = self.data.len();
        let mut inputs  = Vec::with_capacity(t_len * b_len);
        let mut targets = Vec::with_capacity(t_len * b_len);
        let mut keep    = Vec::with_capacity(t_len * b_len);
        for t in 0..t_len {
            for b in 0..b_len {
                let at = b * self.stream_len + w * t_len + t;
                inputs.push(self.data[at]);
                targets.push(self.data[(at + 1) % total]);
                keep.push(at + 1 < total);
            }
        }
        Window { seq_len: t_len, batch_size: b_len, inputs, targets, keep }
    }
}

/// Lazy iterator over one pass of windows.
pub struct Windows<'a> {
    source: &'a SequentialBatches,
    next:   usize,
}

impl Iterator for Windows<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.next >= self.source.len() {
            return None;
        }
        let w = self.source.window(self.next);
        self.next += 1;
        Some(w)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.source.len().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Windows<'_> {}
