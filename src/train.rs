//! Single-sample training loop: plain gradient descent, one forward and one
//! backward pass per epoch.

use ndarray::ArrayView1;

use crate::error::NetworkError;
use crate::loss::sum_squared_error;
use crate::network::Network;

/// Loss before the first and after the last weight update.
#[derive(Debug, Clone, Copy)]
pub struct TrainReport {
    pub initial_loss: f64,
    pub final_loss: f64,
}

/// Trains `network` on one input/target pair for `epochs` epochs and
/// reports the loss before and after. Per-epoch loss is logged at debug
/// level. The network must validate; a network with zero layers fails on
/// the first backward pass.
pub fn train(
    network: &mut Network,
    input: ArrayView1<f64>,
    target: ArrayView1<f64>,
    learning_rate: f64,
    epochs: usize,
) -> Result<TrainReport, NetworkError> {
    network.forward(input)?;
    let initial_loss = sum_squared_error(network.output(), target);

    for epoch in 0..epochs {
        let loss = sum_squared_error(network.output(), target);
        log::debug!("epoch {}: loss {}", epoch, loss);
        network.backward(target, learning_rate)?;
        network.forward(input)?;
    }

    let final_loss = sum_squared_error(network.output(), target);
    Ok(TrainReport {
        initial_loss,
        final_loss,
    })
}
