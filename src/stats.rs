//! Small numeric helpers shared by the feature and decisioning stages.

/// Guard added to the normalization denominator so a constant-valued
/// column divides cleanly instead of by zero.
const NORMALIZE_EPSILON: f64 = 1e-9;

/// Percentile by linear interpolation between closest ranks.
///
/// `q` is a fraction in `[0, 1]`. The rank position is `h = (n - 1) * q`;
/// the result interpolates between the values at `floor(h)` and `ceil(h)`.
/// Returns NaN for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Median as the 50th percentile (averages the middle pair for even counts).
pub fn median(values: &[f64]) -> f64 {
    percentile(values, 0.5)
}

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Min-max normalization over the full slice: `(v - min) / (max - min + eps)`.
///
/// The epsilon keeps the result defined when every value is identical, in
/// which case all outputs are ~0 rather than an error.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min + NORMALIZE_EPSILON;
    values.iter().map(|v| (v - min) / span).collect()
}
