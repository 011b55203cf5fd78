// Recurrent highway network (Zilly et al., 2017) with a coupled
// carry gate. One time step of one layer runs `depth` micro-steps:
//
//   h = tanh(R_h s + [l = 0] W_h x)
//   t = σ(R_t s + [l = 0] W_t x)
//   s = s + (h - s) * t            (carry gate c = 1 - t)
//
// The input only enters at the first micro-step.

use burn::{
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{sigmoid, tanh},
};

use super::{time_major, CarriedState, CharModel, ModelOutput};

#[derive(Config, Debug)]
pub struct HighwayModelConfig {
    pub n_tokens:    usize,
    pub d_embedding: usize,
    pub d_hidden:    usize,
    pub n_layers:    usize,
    #[config(default = 3)]
    pub depth:       usize,
    #[config(default = 0.0)]
    pub dropout:     f64,
}

impl HighwayModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> HighwayModel<B> {
        let embedding = EmbeddingConfig::new(self.n_tokens, self.d_embedding).init(device);
        let layers = (0..self.n_layers)
            .map(|i| {
                let d_input = if i == 0 { self.d_embedding } else { self.d_hidden };
                self.build_layer(d_input, device)
            })
            .collect();
        let head    = LinearConfig::new(self.d_hidden, self.n_tokens).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        HighwayModel { embedding, layers, head, dropout, d_hidden: self.d_hidden }
    }

    fn build_layer<B: Backend>(&self, d_input: usize, device: &B::Device) -> HighwayLayer<B> {
        // Both gates are computed by one projection and split afterwards.
        let input = LinearConfig::new(d_input, 2 * self.d_hidden).init(device);
        let recurrent = (0..self.depth.max(1))
            .map(|_| LinearConfig::new(self.d_hidden, 2 * self.d_hidden).init(device))
            .collect();
        HighwayLayer { input, recurrent, d_hidden: self.d_hidden }
    }
}

#[derive(Module, Debug)]
pub struct HighwayLayer<B: Backend> {
    pub input:     Linear<B>,
    pub recurrent: Vec<Linear<B>>,
    pub d_hidden:  usize,
}

impl<B: Backend> HighwayLayer<B> {
    /// x: [batch, seq, d_input], s: [batch, d_hidden]
    /// → outputs [batch, seq, d_hidden], last state [batch, d_hidden]
    pub fn forward(&self, x: Tensor<B, 3>, mut s: Tensor<B, 2>) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let [batch, seq_len, _] = x.dims();
        let d = self.d_hidden;
        let projected = self.input.forward(x); // [batch, seq, 2d]

        let mut outputs = Vec::with_capacity(seq_len);
        for t in 0..seq_len {
            let x_t = projected
                .clone()
                .slice([0..batch, t..t + 1, 0..2 * d])
                .reshape([batch, 2 * d]);

            for (l, recurrent) in self.recurrent.iter().enumerate() {
                let mut gates = recurrent.forward(s.clone());
                if l == 0 {
                    gates = gates + x_t.clone();
                }
                let h    = tanh(gates.clone().slice([0..batch, 0..d]));
                let gate = sigmoid(gates.slice([0..batch, d..2 * d]));
                s = s.clone() + (h - s) * gate;
            }
            outputs.push(s.clone());
        }

        (Tensor::stack(outputs, 1), s)
    }
}

#[derive(Module, Debug)]
pub struct HighwayModel<B: Backend> {
    pub embedding: Embedding<B>,
    pub layers:    Vec<HighwayLayer<B>>,
    pub head:      Linear<B>,
    pub dropout:   Dropout,
    pub d_hidden:  usize,
}

/// Last state of every layer, each [batch, d_hidden].
#[derive(Debug, Clone)]
pub struct HighwayCarry<B: Backend> {
    layers: Vec<Tensor<B, 2>>,
}

impl<B: Backend> CarriedState for HighwayCarry<B> {
    fn detach(self) -> Self {
        Self { layers: self.layers.into_iter().map(Tensor::detach).collect() }
    }
}

impl<B: Backend> CharModel<B> for HighwayModel<B> {
    type State = HighwayCarry<B>;

    fn forward(&self, input: Tensor<B, 2, Int>, state: Option<HighwayCarry<B>>) -> ModelOutput<B, HighwayCarry<B>> {
        let [_, batch] = input.dims();
        let device = input.device();
        let mut x = self.dropout.forward(self.embedding.forward(input.swap_dims(0, 1)));

        let mut previous = state.map(|s| s.layers.into_iter());
        let mut last     = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let s = previous
                .as_mut()
                .and_then(Iterator::next)
                .unwrap_or_else(|| Tensor::zeros([batch, self.d_hidden], &device));
            let (output, s) = layer.forward(x, s);
            last.push(s);
            x = self.dropout.forward(output);
        }

        let scores = time_major(self.head.forward(x));
        ModelOutput { scores, state: HighwayCarry { layers: last } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_output_shape_and_state() {
        let device = Default::default();
        let model: HighwayModel<B> = HighwayModelConfig::new(9, 6, 10, 2).with_depth(2).init(&device);

        let input = Tensor::<B, 1, Int>::from_ints([0, 1, 2, 3, 4, 5, 6, 7], &device).reshape([4, 2]);
        let out = model.forward(input.clone(), None);
        assert_eq!(out.scores.dims(), [4, 2, 9]);
        assert_eq!(out.state.layers.len(), 2);
        assert_eq!(out.state.layers[1].dims(), [2, 10]);

        let next = model.forward(input, Some(out.state.detach()));
        assert_eq!(next.scores.dims(), [4, 2, 9]);
    }

    #[test]
    fn test_closed_gate_keeps_state() {
        // With zero weights the gate is σ(0) = 0.5 and h = 0, so each
        // micro-step halves the state.
        let device = Default::default();
        let layer: HighwayLayer<B> = HighwayModelConfig::new(1, 2, 2, 1)
            .with_depth(1)
            .build_layer(2, &device);
        let layer = HighwayLayer {
            input:     zeroed(layer.input),
            recurrent: layer.recurrent.into_iter().map(zeroed).collect(),
            d_hidden:  2,
        };

        let x = Tensor::<B, 3>::zeros([1, 1, 2], &device);
        let s = Tensor::<B, 2>::ones([1, 2], &device);
        let (_, last) = layer.forward(x, s);
        let values: Vec<f32> = last.into_data().to_vec().unwrap();
        assert_eq!(values, vec![0.5, 0.5]);
    }

    fn zeroed(linear: Linear<B>) -> Linear<B> {
        let device = Default::default();
        let [d_in, d_out] = linear.weight.dims();
        LinearConfig::new(d_in, d_out)
            .with_initializer(burn::nn::Initializer::Zeros)
            .init(&device)
    }
}
