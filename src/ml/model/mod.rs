// ============================================================
// Layer 5 — Model Adapters
// ============================================================
// Three swappable next-symbol predictors behind one contract:
//
//   forward(indices [T, B], state) → (scores [T, B, V], state)
//
//   lstm.rs        — embedding → stacked LSTM → linear
//   highway.rs     — embedding → stacked recurrent-highway cells
//                    (coupled carry gate) → linear
//   transformer.rs — token + learned position embedding →
//                    causally masked encoder → linear
//
// The state is opaque to the training loop. Recurrent variants
// return their last hidden state so the next window continues
// where this one stopped; the transformer carries nothing.
//
// The variant is picked once, at configuration time, as a
// `ModelSpec`. The training loop is generic over `CharModel` and
// is monomorphised for whichever variant was chosen.
//
// Reference: Burn Book §3 (Building Blocks)

use burn::prelude::*;
use serde::{Deserialize, Serialize};

pub mod highway;
pub mod lstm;
pub mod transformer;

pub use highway::{HighwayModel, HighwayModelConfig};
pub use lstm::{LstmModel, LstmModelConfig};
pub use transformer::{TransformerModel, TransformerModelConfig};

/// State handed from one window to the next.
pub trait CarriedState: Clone + Send {
    /// Cut the state loose from the autodiff graph, so backward on
    /// the next window stops at the window boundary.
    fn detach(self) -> Self;
}

impl CarriedState for () {
    fn detach(self) -> Self {}
}

pub struct ModelOutput<B: Backend, S> {
    /// [seq_len, batch, n_tokens]
    pub scores: Tensor<B, 3>,
    pub state:  S,
}

pub trait CharModel<B: Backend>: Module<B> {
    type State: CarriedState;

    /// `input` is [seq_len, batch]. `None` starts from a fresh state.
    fn forward(&self, input: Tensor<B, 2, Int>, state: Option<Self::State>) -> ModelOutput<B, Self::State>;

    /// Longest context the model accepts, if bounded.
    fn max_context(&self) -> Option<usize> {
        None
    }
}

/// Which variant to build, with its hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Lstm(LstmModelConfig),
    Rhn(HighwayModelConfig),
    Transformer(TransformerModelConfig),
}

impl ModelSpec {
    pub fn name(&self) -> &'static str {
        match self {
            ModelSpec::Lstm(_)        => "lstm",
            ModelSpec::Rhn(_)         => "rhn",
            ModelSpec::Transformer(_) => "transformer",
        }
    }

    pub fn n_tokens(&self) -> usize {
        match self {
            ModelSpec::Lstm(c)        => c.n_tokens,
            ModelSpec::Rhn(c)         => c.n_tokens,
            ModelSpec::Transformer(c) => c.n_tokens,
        }
    }
}

/// [batch, seq, d] → [seq, batch, d]
pub(crate) fn time_major<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 3> {
    x.swap_dims(0, 1)
}
