//! Order-independent summary statistics.
//!
//! Every aggregate in the engine goes through these helpers so the result is
//! bit-identical no matter what order the inputs were gathered in: values are
//! sorted with `f64::total_cmp` before summation.

/// Sum after sorting ascending.
pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.iter().sum()
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    stable_sum(values) / values.len() as f64
}

/// Population standard deviation; 0.0 for fewer than two values.
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let squares: Vec<f64> = values.iter().map(|v| (v - m) * (v - m)).collect();
    (stable_sum(&squares) / values.len() as f64).sqrt()
}

/// Largest value; 0.0 for an empty slice.
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}
