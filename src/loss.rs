use ndarray::{ArrayView1, Zip};

/// Sum of squared per-output errors, `Σ_i (output[i] - target[i])²`.
///
/// Deliberately not averaged: the backward pass works with the raw
/// `output - target` error, and this is the matching quantity to watch
/// while training.
pub fn sum_squared_error(output: ArrayView1<f64>, target: ArrayView1<f64>) -> f64 {
    assert_eq!(output.len(), target.len());
    Zip::from(&output)
        .and(&target)
        .fold(0.0, |loss, &output, &target| {
            loss + (output - target).powi(2)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn sums_squared_differences() {
        let output = arr1(&[1.0, 0.5, -0.1]);
        let target = arr1(&[1.0, 0.0, 0.0]);
        assert_relative_eq!(sum_squared_error(output.view(), target.view()), 0.26);
    }

    #[test]
    fn zero_for_exact_match() {
        let v = arr1(&[0.8, 0.4]);
        assert_relative_eq!(sum_squared_error(v.view(), v.view()), 0.0);
    }
}
