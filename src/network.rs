use ndarray::{Array1, ArrayView1};
use ndarray_rand::rand::Rng;

use crate::activation::Activation;
use crate::error::NetworkError;
use crate::layer::Layer;

/// Outcome of appending a layer to a network with fixed layer capacity.
/// `CapacityExceeded` means the network was left unchanged.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    CapacityExceeded,
}

/// An ordered chain of linear and nonlinear layers between a fixed-size
/// input buffer and a fixed-size output buffer.
///
/// Layers are appended one at a time up to the capacity fixed at
/// construction. `validate` checks that the dimensions chain; `forward`
/// and `backward` assume a chain that validates.
pub struct Network {
    input: Array1<f64>,
    layers: Vec<Layer>,
    max_hidden_layers: usize,
    output: Array1<f64>,
}

impl Network {
    pub fn new(input_size: usize, output_size: usize, max_hidden_layers: usize) -> Self {
        Self {
            input: Array1::zeros(input_size),
            layers: Vec::with_capacity(max_hidden_layers),
            max_hidden_layers,
            output: Array1::zeros(output_size),
        }
    }

    /// Appends an already-constructed layer, respecting the capacity fixed
    /// at construction. At capacity the network is left unchanged.
    pub fn append_layer(&mut self, layer: Layer) -> AppendOutcome {
        if self.layers.len() >= self.max_hidden_layers {
            return AppendOutcome::CapacityExceeded;
        }
        self.layers.push(layer);
        AppendOutcome::Appended
    }

    /// Appends a linear layer with weights drawn uniformly from `[0, 1)`.
    pub fn append_linear<R: Rng>(
        &mut self,
        input_dim: usize,
        output_dim: usize,
        rng: &mut R,
    ) -> AppendOutcome {
        if self.layers.len() >= self.max_hidden_layers {
            return AppendOutcome::CapacityExceeded;
        }
        self.append_layer(Layer::linear(input_dim, output_dim, 0.0, 1.0, rng))
    }

    /// Appends an elementwise activation layer. Its size is inferred from
    /// the previous layer's output dimension, or from the input layer if
    /// this is the first layer.
    pub fn append_nonlinear<A: Activation + 'static>(&mut self, activation: A) -> AppendOutcome {
        let size = match self.layers.last() {
            Some(prev) => prev.dimension().1,
            None => self.input.len(),
        };
        self.append_layer(Layer::nonlinear(size, activation))
    }

    /// Number of layers appended so far.
    pub fn hidden_size(&self) -> usize {
        self.layers.len()
    }

    pub fn max_hidden_layers(&self) -> usize {
        self.max_hidden_layers
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The output buffer, overwritten by every `forward` call.
    pub fn output(&self) -> ArrayView1<f64> {
        self.output.view()
    }

    /// Checks that the layer dimensions form a chain: each layer's effective
    /// input dimension equals the previous layer's output dimension (the
    /// input layer's size for the first layer), and the last layer's output
    /// dimension equals the output buffer size. Reports the first failure;
    /// never mutates.
    pub fn validate(&self) -> Result<(), NetworkError> {
        for (i, layer) in self.layers.iter().enumerate() {
            let upstream = match i {
                0 => self.input.len(),
                _ => self.layers[i - 1].dimension().1,
            };
            let (input_dim, output_dim) = layer.dimension();
            if layer.is_linear() {
                if input_dim != upstream {
                    return Err(NetworkError::LinearInputMismatch {
                        layer: i,
                        expected: input_dim,
                        actual: upstream,
                    });
                }
            } else if output_dim != upstream {
                return Err(NetworkError::NonlinearSizeMismatch {
                    layer: i,
                    expected: upstream,
                    actual: output_dim,
                });
            }
        }

        if let Some(last) = self.layers.last() {
            if last.dimension().1 != self.output.len() {
                return Err(NetworkError::OutputSizeMismatch {
                    expected: self.output.len(),
                    actual: last.dimension().1,
                });
            }
        }

        log::info!("network validation passed");
        Ok(())
    }

    /// Copies `input` into the input buffer, evaluates every layer in order
    /// and copies the last layer's output into the output buffer. With zero
    /// layers the input is passed through unchanged (sizes must match).
    ///
    /// Layer input dimensions are re-checked on the way, so running an
    /// unvalidated network degrades to an error rather than a panic.
    pub fn forward(&mut self, input: ArrayView1<f64>) -> Result<(), NetworkError> {
        if input.len() != self.input.len() {
            return Err(NetworkError::InputLengthMismatch {
                expected: self.input.len(),
                actual: input.len(),
            });
        }
        self.input.assign(&input);

        let mut prev = self.input.to_owned();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            let expected = layer.expected_input_dim();
            if expected != prev.len() {
                return Err(if layer.is_linear() {
                    NetworkError::LinearInputMismatch {
                        layer: i,
                        expected,
                        actual: prev.len(),
                    }
                } else {
                    NetworkError::NonlinearSizeMismatch {
                        layer: i,
                        expected: prev.len(),
                        actual: expected,
                    }
                });
            }
            prev = layer.forward(prev.view());
        }

        if prev.len() != self.output.len() {
            return Err(NetworkError::OutputSizeMismatch {
                expected: self.output.len(),
                actual: prev.len(),
            });
        }
        self.output.assign(&prev);
        Ok(())
    }

    /// Zeroes every layer's output buffer. Weights and the input/output
    /// buffers are untouched.
    pub fn reset_values(&mut self) {
        for layer in &mut self.layers {
            layer.reset();
        }
    }

    /// One step of backpropagation with plain gradient descent.
    ///
    /// The per-output error is `output[i] - target[i]`, not halved and not
    /// averaged. Activation derivatives come from the finite-difference
    /// probe (`Layer::activation_slope`) applied to the values stored by the
    /// last `forward` call. Expects a network that validates and has run
    /// `forward` at least once; a network with zero layers is rejected.
    pub fn backward(
        &mut self,
        target: ArrayView1<f64>,
        learning_rate: f64,
    ) -> Result<(), NetworkError> {
        let n = self.layers.len();
        if n == 0 {
            return Err(NetworkError::EmptyNetwork);
        }
        if target.len() != self.output.len() {
            return Err(NetworkError::TargetLengthMismatch {
                expected: self.output.len(),
                actual: target.len(),
            });
        }
        let last_dim = self.layers[n - 1].dimension().1;
        if last_dim != self.output.len() {
            return Err(NetworkError::OutputSizeMismatch {
                expected: self.output.len(),
                actual: last_dim,
            });
        }

        // Scratch state, one delta per unit per layer.
        let mut deltas: Vec<Array1<f64>> = self
            .layers
            .iter()
            .map(|layer| Array1::zeros(layer.dimension().1))
            .collect();

        let last = &self.layers[n - 1];
        for i in 0..last_dim {
            let error = self.output[i] - target[i];
            deltas[n - 1][i] = error * last.activation_slope(last.output()[i]);
        }

        for idx in (0..n - 1).rev() {
            let curr = &self.layers[idx];
            let next = &self.layers[idx + 1];
            for i in 0..curr.dimension().1 {
                // A linear successor spreads the delta through its weight
                // row; a nonlinear one passes it through unchanged.
                let sum: f64 = match next.weights() {
                    Some(weights) => (0..next.dimension().1)
                        .map(|j| weights[[i, j]] * deltas[idx + 1][j])
                        .sum(),
                    None => deltas[idx + 1][i],
                };
                deltas[idx][i] = sum * curr.activation_slope(curr.output()[i]);
            }
        }

        for idx in 0..n {
            if !self.layers[idx].is_linear() {
                continue;
            }
            let prev = match idx {
                0 => self.input.to_owned(),
                _ => self.layers[idx - 1].output().to_owned(),
            };
            self.layers[idx].update_weights(learning_rate, deltas[idx].view(), prev.view());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::activation::Relu;
    use crate::loss::sum_squared_error;
    use crate::{assert_rel_eq_arr1, assert_rel_eq_arr2};

    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};
    use ndarray_rand::rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn push_linear_with_weights(network: &mut Network, weights: ndarray::Array2<f64>) {
        assert_eq!(
            network.append_layer(Layer::linear_with_weights(weights)),
            AppendOutcome::Appended
        );
    }

    #[test]
    fn validate_accepts_chained_dimensions() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 4);
        assert_eq!(network.append_linear(3, 64, &mut rng), AppendOutcome::Appended);
        assert_eq!(network.append_nonlinear(Relu), AppendOutcome::Appended);
        assert_eq!(network.append_linear(64, 2, &mut rng), AppendOutcome::Appended);
        assert_eq!(network.append_nonlinear(Relu), AppendOutcome::Appended);
        assert!(network.validate().is_ok());
    }

    #[test]
    fn validate_rejects_linear_dimension_mismatch() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 2);
        let _ = network.append_linear(3, 64, &mut rng);
        let _ = network.append_linear(32, 2, &mut rng);
        assert_eq!(
            network.validate(),
            Err(NetworkError::LinearInputMismatch {
                layer: 1,
                expected: 32,
                actual: 64,
            })
        );
    }

    #[test]
    fn validate_rejects_first_layer_not_matching_input() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 1);
        let _ = network.append_linear(5, 2, &mut rng);
        assert_eq!(
            network.validate(),
            Err(NetworkError::LinearInputMismatch {
                layer: 0,
                expected: 5,
                actual: 3,
            })
        );
    }

    #[test]
    fn validate_rejects_last_layer_not_matching_output() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 1);
        let _ = network.append_linear(3, 4, &mut rng);
        assert_eq!(
            network.validate(),
            Err(NetworkError::OutputSizeMismatch {
                expected: 2,
                actual: 4,
            })
        );
    }

    #[test]
    fn first_nonlinear_layer_takes_input_size() {
        let mut network = Network::new(3, 3, 1);
        let _ = network.append_nonlinear(Relu);
        assert_eq!(network.layers()[0].dimension(), (1, 3));
        assert!(network.validate().is_ok());
    }

    #[test]
    fn append_beyond_capacity_is_a_checked_no_op() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 1);
        assert_eq!(network.append_linear(3, 2, &mut rng), AppendOutcome::Appended);
        assert_eq!(
            network.append_linear(2, 2, &mut rng),
            AppendOutcome::CapacityExceeded
        );
        assert_eq!(network.append_nonlinear(Relu), AppendOutcome::CapacityExceeded);
        assert_eq!(network.hidden_size(), 1);
        assert!(network.validate().is_ok());
    }

    #[test]
    fn forward_through_fixed_weights() {
        let mut network = Network::new(3, 2, 2);
        push_linear_with_weights(
            &mut network,
            arr2(&[[1.0, 2.0], [-1.0, -1.0], [0.5, 2.0]]),
        );
        assert_eq!(
            network.append_layer(Layer::nonlinear(2, Relu)),
            AppendOutcome::Appended
        );
        network.validate().unwrap();

        network.forward(arr1(&[1.0, 0.5, -1.0]).view()).unwrap();
        // Linear: [0.0, -0.5]; ReLU clamps the negative unit.
        assert_rel_eq_arr1!(network.output(), arr1(&[0.0, 0.0]));

        network.forward(arr1(&[1.0, 0.5, 0.5]).view()).unwrap();
        assert_rel_eq_arr1!(network.output(), arr1(&[0.75, 2.5]));
    }

    #[test]
    fn forward_twice_is_bit_identical() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 2);
        let _ = network.append_linear(3, 8, &mut rng);
        let _ = network.append_linear(8, 2, &mut rng);
        network.validate().unwrap();

        let input = arr1(&[0.5, -0.3, 1.2]);
        network.forward(input.view()).unwrap();
        let first = network.output().to_owned();
        network.forward(input.view()).unwrap();
        assert_eq!(first, network.output().to_owned());
    }

    #[test]
    fn forward_with_zero_layers_is_passthrough() {
        let mut network = Network::new(3, 3, 2);
        network.validate().unwrap();
        network.forward(arr1(&[1.0, -2.0, 3.0]).view()).unwrap();
        assert_rel_eq_arr1!(network.output(), arr1(&[1.0, -2.0, 3.0]));

        let mut mismatched = Network::new(3, 2, 2);
        assert_eq!(
            mismatched.forward(arr1(&[1.0, 2.0, 3.0]).view()),
            Err(NetworkError::OutputSizeMismatch {
                expected: 2,
                actual: 3,
            })
        );
    }

    #[test]
    fn forward_rejects_wrong_input_length() {
        let mut network = Network::new(3, 3, 0);
        assert_eq!(
            network.forward(arr1(&[1.0, 2.0]).view()),
            Err(NetworkError::InputLengthMismatch {
                expected: 3,
                actual: 2,
            })
        );
    }

    #[test]
    fn forward_rejects_an_unvalidated_broken_chain() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 2);
        let _ = network.append_linear(3, 64, &mut rng);
        let _ = network.append_linear(32, 2, &mut rng);
        assert_eq!(
            network.forward(arr1(&[1.0, 2.0, 3.0]).view()),
            Err(NetworkError::LinearInputMismatch {
                layer: 1,
                expected: 32,
                actual: 64,
            })
        );
    }

    #[test]
    fn reset_values_preserves_weights_and_results() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 2);
        let _ = network.append_linear(3, 4, &mut rng);
        let _ = network.append_linear(4, 2, &mut rng);
        network.validate().unwrap();

        let input = arr1(&[0.5, -0.3, 1.2]);
        network.forward(input.view()).unwrap();
        let before = network.output().to_owned();

        network.reset_values();
        for layer in network.layers() {
            assert!(layer.output().iter().all(|&v| v == 0.0));
        }

        network.forward(input.view()).unwrap();
        assert_eq!(before, network.output().to_owned());
    }

    #[test]
    fn backward_rejects_empty_network() {
        let mut network = Network::new(2, 2, 0);
        assert_eq!(
            network.backward(arr1(&[0.0, 0.0]).view(), 0.01),
            Err(NetworkError::EmptyNetwork)
        );
    }

    #[test]
    fn backward_rejects_wrong_target_length() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 1);
        let _ = network.append_linear(3, 2, &mut rng);
        assert_eq!(
            network.backward(arr1(&[0.8]).view(), 0.01),
            Err(NetworkError::TargetLengthMismatch {
                expected: 2,
                actual: 1,
            })
        );
    }

    #[test]
    fn single_backward_step_on_fixed_weights() {
        let mut network = Network::new(2, 1, 1);
        push_linear_with_weights(&mut network, arr2(&[[0.5], [0.25]]));
        network.validate().unwrap();

        network.forward(arr1(&[1.0, 2.0]).view()).unwrap();
        assert_relative_eq!(network.output()[0], 1.0);

        // error = 1.0 - 0.5 = 0.5; w[i][0] -= 0.1 * 0.5 * input[i]
        network.backward(arr1(&[0.5]).view(), 0.1).unwrap();
        let weights = network.layers()[0].weights().unwrap();
        assert_rel_eq_arr2!(*weights, arr2(&[[0.45], [0.15]]));
    }

    #[test]
    fn gradient_descent_strictly_decreases_loss() {
        let mut rng = rng();
        let mut network = Network::new(3, 2, 1);
        let _ = network.append_linear(3, 2, &mut rng);
        network.validate().unwrap();

        let input = arr1(&[0.5, -0.3, 1.2]);
        let target = arr1(&[0.8, 0.4]);

        network.forward(input.view()).unwrap();
        let mut prev_loss = sum_squared_error(network.output(), target.view());
        let initial_error = network.output().to_owned() - &target;

        for _ in 0..50 {
            network.backward(target.view(), 0.01).unwrap();
            network.forward(input.view()).unwrap();
            let loss = sum_squared_error(network.output(), target.view());
            assert!(loss < prev_loss);
            prev_loss = loss;
        }

        let final_error = network.output().to_owned() - &target;
        for (f, i) in final_error.iter().zip(initial_error.iter()) {
            assert!(f.abs() < i.abs());
        }
    }
}
