// ============================================================
// Layer 5 — Loss and Accuracy
// ============================================================
// Both take scores [T, B, V], targets [T, B] and per-position
// weights [T, B] (1.0 kept, 0.0 skipped), flattened to [T·B, ...]:
//
//   loss     = mean cross-entropy over the kept positions
//   accuracy = fraction of kept positions whose argmax equals the target
//
// Reference: Burn Book §5 (Tensor ops)

use burn::{prelude::*, tensor::activation::log_softmax};

/// Mean negative log-likelihood of `targets`, shape [1].
pub fn cross_entropy<B: Backend>(
    scores:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    weights: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let (scores, targets, weights) = flatten(scores, targets, weights);
    let picked = log_softmax(scores, 1)
        .gather(1, targets.unsqueeze_dim::<2>(1))
        .flatten::<1>(0, 1);
    let kept = weights.clone().sum().clamp_min(1.0);
    picked.mul(weights).sum().neg().div(kept)
}

/// Fraction of correct argmax predictions, in [0, 1].
pub fn accuracy<B: Backend>(scores: Tensor<B, 3>, targets: Tensor<B, 2, Int>, weights: Tensor<B, 2>) -> f64 {
    let (scores, targets, weights) = flatten(scores, targets, weights);
    let kept: f64 = weights.clone().sum().into_scalar().elem::<f64>();
    if kept == 0.0 {
        return 0.0;
    }
    // argmax(1) returns [n, 1] — squeeze to [n] before comparing
    let predicted = scores.argmax(1).flatten::<1>(0, 1);
    let correct: f64 = predicted
        .equal(targets)
        .float().mul(weights).sum().into_scalar().elem::<f64>();
    correct / kept
}

fn flatten<B: Backend>(
    scores:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    weights: Tensor<B, 2>,
) -> (Tensor<B, 2>, Tensor<B, 1, Int>, Tensor<B, 1>) {
    let [t, b, v] = scores.dims();
    (scores.reshape([t * b, v]), targets.reshape([t * b]), weights.reshape([t * b]))
}
