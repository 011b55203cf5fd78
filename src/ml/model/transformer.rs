use burn::{
    nn::{
        attention::generate_autoregressive_mask,
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

use super::{time_major, CharModel, ModelOutput};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct TransformerModelConfig {
    pub n_tokens: usize,
    /// Number of learned positions; windows and prompts are cut to this.
    pub max_len:  usize,
    pub d_model:  usize,
    pub n_heads:  usize,
    pub n_layers: usize,
    pub d_ff:     usize,
    #[config(default = 0.1)]
    pub dropout:  f64,
}

impl TransformerModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.n_tokens, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_len, self.d_model).init(device);
        let encoder = TransformerEncoderConfig::new(self.d_model, self.d_ff, self.n_heads, self.n_layers)
            .with_dropout(self.dropout)
            .init(device);
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let head       = LinearConfig::new(self.d_model, self.n_tokens).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        TransformerModel {
            token_embedding, position_embedding, encoder,
            final_norm, head, dropout,
            max_len: self.max_len,
        }
    }
}

#[derive(Module, Debug)]
pub struct TransformerModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub encoder:            TransformerEncoder<B>,
    pub final_norm:         LayerNorm<B>,
    pub head:               Linear<B>,
    pub dropout:            Dropout,
    pub max_len:            usize,
}

impl<B: Backend> CharModel<B> for TransformerModel<B> {
    type State = ();

    fn forward(&self, input: Tensor<B, 2, Int>, _state: Option<()>) -> ModelOutput<B, ()> {
        let input = input.swap_dims(0, 1);
        let [batch, seq_len] = input.dims();
        let device = input.device();

        let tok_emb = self.token_embedding.forward(input);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        // Position i attends to positions ≤ i only.
        let mask = generate_autoregressive_mask::<B>(batch, seq_len, &device);
        let x = self.dropout.forward(tok_emb + pos_emb);
        let x = self.encoder.forward(TransformerEncoderInput::new(x).mask_attn(mask));
        let x = self.final_norm.forward(x);

        ModelOutput { scores: time_major(self.head.forward(x)), state: () }
    }

    fn max_context(&self) -> Option<usize> {
        Some(self.max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn tiny(device: &<B as Backend>::Device) -> TransformerModel<B> {
        TransformerModelConfig::new(5, 8, 16, 2, 1, 32).with_dropout(0.0).init(device)
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let model  = tiny(&device);
        let input  = Tensor::<B, 1, Int>::from_ints([0, 1, 2, 3, 4, 0], &device).reshape([3, 2]);
        let out = model.forward(input, None);
        assert_eq!(out.scores.dims(), [3, 2, 5]);
        assert_eq!(model.max_context(), Some(8));
    }

    #[test]
    fn test_prefix_is_not_affected_by_later_symbols() {
        let device = Default::default();
        let model  = tiny(&device);

        let a = Tensor::<B, 1, Int>::from_ints([1, 2, 3], &device).reshape([3, 1]);
        let b = Tensor::<B, 1, Int>::from_ints([1, 2, 4], &device).reshape([3, 1]);
        let first = |x: Tensor<B, 2, Int>| -> Vec<f32> {
            model.forward(x, None).scores.slice([0..2, 0..1, 0..5]).into_data().to_vec().unwrap()
        };

        let (sa, sb) = (first(a), first(b));
        for (x, y) in sa.iter().zip(&sb) {
            assert!((x - y).abs() < 1e-5);
        }
    }
}
