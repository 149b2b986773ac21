//! Structural errors reported by network validation and the numeric passes.

use thiserror::Error;

/// Inconsistencies in how a network was assembled or driven. These are
/// programmer errors, not runtime-data errors: the caller decides whether to
/// abort, but there is nothing to retry or recover.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error(
        "linear layer {layer} expects input dim {expected} but its upstream provides {actual}"
    )]
    LinearInputMismatch {
        layer: usize,
        expected: usize,
        actual: usize,
    },

    #[error("nonlinear layer {layer} has size {actual} but its upstream provides {expected}")]
    NonlinearSizeMismatch {
        layer: usize,
        expected: usize,
        actual: usize,
    },

    #[error("output layer size {expected} doesn't match last hidden layer output {actual}")]
    OutputSizeMismatch { expected: usize, actual: usize },

    #[error("input vector has length {actual} but the input layer has size {expected}")]
    InputLengthMismatch { expected: usize, actual: usize },

    #[error("target vector has length {actual} but the output layer has size {expected}")]
    TargetLengthMismatch { expected: usize, actual: usize },

    #[error("network has no layers; backpropagation needs at least one")]
    EmptyNetwork,
}
