//! Sample statistics shared by the statistical algorithms and backtest metrics.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Standardized distance of `value` from the sample mean.
/// `None` when the sample has no dispersion.
pub fn z_score(value: f64, sample: &[f64]) -> Option<f64> {
    let sd = std_dev(sample);
    if sd < 1e-12 {
        return None;
    }
    Some((value - mean(sample)) / sd)
}
