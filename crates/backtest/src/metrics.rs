//! Report statistics over equity curves and trade returns.

/// Largest peak-to-trough decline as a positive fraction, clamped to [0, 1].
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd.clamp(0.0, 1.0)
}

/// Mean of per-trade returns divided by their population standard deviation.
///
/// Zero with fewer than two trades or zero variance. No annualization and no
/// risk-free rate.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std < 1e-12 {
        return 0.0;
    }
    mean / std
}
