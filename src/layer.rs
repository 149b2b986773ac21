use ndarray::{Array, Array1, Array2, ArrayView1};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::activation::Activation;

/// Step size of the two-point finite difference standing in for an
/// analytic activation derivative.
const FINITE_DIFF_STEP: f64 = 1e-5;

pub enum LayerKind {
    /// Weighted sum of inputs per output unit, no bias, no activation.
    Linear { weights: Array2<f64> },
    /// Dimension-preserving elementwise activation, no weights.
    Nonlinear { activation: Box<dyn Activation> },
}

pub struct Layer {
    kind: LayerKind,
    input_dim: usize,
    output_dim: usize,
    output: Array1<f64>,
}

impl Layer {
    /// Linear layer with weights of shape `(input_dim, output_dim)` drawn
    /// independently and uniformly from `[low, high)` using the caller's rng.
    pub fn linear<R: Rng>(
        input_dim: usize,
        output_dim: usize,
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> Self {
        let weights = Array::random_using((input_dim, output_dim), Uniform::new(low, high), rng);
        Layer::linear_with_weights(weights)
    }

    /// Linear layer around a fixed weight matrix; dimensions are taken from
    /// its shape.
    pub fn linear_with_weights(weights: Array2<f64>) -> Self {
        let (input_dim, output_dim) = weights.dim();
        Self {
            kind: LayerKind::Linear { weights },
            input_dim,
            output_dim,
            output: Array1::zeros(output_dim),
        }
    }

    /// Elementwise activation layer over `size` units. The stored input
    /// dimension is a fixed placeholder of 1; the layer consumes and
    /// produces `size` values.
    pub fn nonlinear<A: Activation + 'static>(size: usize, activation: A) -> Self {
        Self {
            kind: LayerKind::Nonlinear {
                activation: Box::new(activation),
            },
            input_dim: 1,
            output_dim: size,
            output: Array1::zeros(size),
        }
    }

    pub fn dimension(&self) -> (usize, usize) {
        (self.input_dim, self.output_dim)
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.kind, LayerKind::Linear { .. })
    }

    /// Length the previous layer's output must have for `forward` to be
    /// well-formed: `input_dim` for linear layers, `output_dim` for
    /// nonlinear ones (which pass their size through unchanged).
    pub fn expected_input_dim(&self) -> usize {
        match self.kind {
            LayerKind::Linear { .. } => self.input_dim,
            LayerKind::Nonlinear { .. } => self.output_dim,
        }
    }

    pub fn output(&self) -> ArrayView1<f64> {
        self.output.view()
    }

    pub fn weights(&self) -> Option<&Array2<f64>> {
        match &self.kind {
            LayerKind::Linear { weights } => Some(weights),
            LayerKind::Nonlinear { .. } => None,
        }
    }

    /// Evaluates the layer against the previous layer's output, stores the
    /// result in the output buffer and returns a copy of it.
    ///
    /// The caller is responsible for `prev.len() == self.expected_input_dim()`.
    pub fn forward(&mut self, prev: ArrayView1<f64>) -> Array1<f64> {
        self.output = match &self.kind {
            LayerKind::Linear { weights } => prev.dot(weights),
            LayerKind::Nonlinear { activation } => prev.map(|&v| activation.apply(v)),
        };
        self.output.to_owned()
    }

    /// Zeroes the output buffer; weights are untouched.
    pub fn reset(&mut self) {
        self.output.fill(0.0);
    }

    /// Derivative of the activation at `z`: 1 for linear layers, otherwise
    /// the finite difference `(f(z + h) - f(z)) / h` with `h = 1e-5`.
    ///
    /// The gradient pass feeds this the *stored post-activation* output, not
    /// the pre-activation input. Textbook backprop differentiates at the
    /// pre-activation value; the two agree only where the activation maps the
    /// probe point onto its own curve with the same local slope (identity
    /// everywhere, ReLU away from sign changes). This engine keeps the
    /// post-activation probe as a deliberate behavior, not a bug.
    pub fn activation_slope(&self, z: f64) -> f64 {
        match &self.kind {
            LayerKind::Linear { .. } => 1.0,
            LayerKind::Nonlinear { activation } => {
                (activation.apply(z + FINITE_DIFF_STEP) - activation.apply(z)) / FINITE_DIFF_STEP
            }
        }
    }

    /// Gradient-descent step: `w[i][j] -= learning_rate * delta[j] * prev[i]`.
    /// No-op for nonlinear layers.
    pub fn update_weights(
        &mut self,
        learning_rate: f64,
        delta: ArrayView1<f64>,
        prev: ArrayView1<f64>,
    ) {
        if let LayerKind::Linear { weights } = &mut self.kind {
            for (i, mut row) in weights.rows_mut().into_iter().enumerate() {
                for (j, w) in row.iter_mut().enumerate() {
                    *w -= learning_rate * delta[j] * prev[i];
                }
            }
        }
    }
}
