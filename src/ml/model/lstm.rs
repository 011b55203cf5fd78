use burn::{
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
        Lstm, LstmConfig, LstmState,
    },
    prelude::*,
};

use super::{time_major, CarriedState, CharModel, ModelOutput};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct LstmModelConfig {
    pub n_tokens:    usize,
    pub d_embedding: usize,
    pub d_lstm:      usize,
    pub n_layers:    usize,
    #[config(default = 0.0)]
    pub dropout:     f64,
}

impl LstmModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LstmModel<B> {
        let embedding = EmbeddingConfig::new(self.n_tokens, self.d_embedding).init(device);
        let layers = (0..self.n_layers)
            .map(|i| {
                let d_input = if i == 0 { self.d_embedding } else { self.d_lstm };
                LstmConfig::new(d_input, self.d_lstm, true).init(device)
            })
            .collect();
        let head    = LinearConfig::new(self.d_lstm, self.n_tokens).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        LstmModel { embedding, layers, head, dropout }
    }
}

#[derive(Module, Debug)]
pub struct LstmModel<B: Backend> {
    pub embedding: Embedding<B>,
    pub layers:    Vec<Lstm<B>>,
    pub head:      Linear<B>,
    pub dropout:   Dropout,
}

/// Cell and hidden state of every layer, each [batch, d_lstm].
#[derive(Debug, Clone)]
pub struct LstmCarry<B: Backend> {
    cells:   Vec<Tensor<B, 2>>,
    hiddens: Vec<Tensor<B, 2>>,
}

impl<B: Backend> CarriedState for LstmCarry<B> {
    fn detach(self) -> Self {
        Self {
            cells:   self.cells.into_iter().map(Tensor::detach).collect(),
            hiddens: self.hiddens.into_iter().map(Tensor::detach).collect(),
        }
    }
}

impl<B: Backend> CharModel<B> for LstmModel<B> {
    type State = LstmCarry<B>;

    fn forward(&self, input: Tensor<B, 2, Int>, state: Option<LstmCarry<B>>) -> ModelOutput<B, LstmCarry<B>> {
        // burn's Lstm is batch-first.
        let mut x = self.dropout.forward(self.embedding.forward(input.swap_dims(0, 1)));

        let mut previous = state.map(|s| s.cells.into_iter().zip(s.hiddens));
        let mut cells    = Vec::with_capacity(self.layers.len());
        let mut hiddens  = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let init = previous
                .as_mut()
                .and_then(Iterator::next)
                .map(|(cell, hidden)| LstmState::new(cell, hidden));
            let (output, last) = layer.forward(x, init);
            cells.push(last.cell);
            hiddens.push(last.hidden);
            x = self.dropout.forward(output);
        }

        let scores = time_major(self.head.forward(x));
        ModelOutput { scores, state: LstmCarry { cells, hiddens } }
    }
}
