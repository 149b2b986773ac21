/// A pure scalar activation function.
///
/// Layers never ask for an analytic derivative; the gradient pass probes
/// `apply` with a two-point finite difference instead. Implementations must
/// be deterministic for that probe to mean anything.
pub trait Activation {
    fn apply(&self, x: f64) -> f64;
}

pub struct Relu;

impl Activation for Relu {
    fn apply(&self, x: f64) -> f64 {
        if x > 0.0 {
            x
        } else {
            0.0
        }
    }
}

pub struct Sigmoid;

impl Activation for Sigmoid {
    fn apply(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }
}

pub struct Identity;

impl Activation for Identity {
    fn apply(&self, x: f64) -> f64 {
        x
    }
}
