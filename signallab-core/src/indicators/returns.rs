//! Simple returns.

/// One-period percentage change: `v[i] / v[i-1] - 1`.
///
/// Index 0 is `None`, as is any position where either value is missing or
/// the previous value is zero.
pub fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    out.extend(values.first().map(|_| None));
    out.extend(values.windows(2).map(|w| ratio_return(w[0], w[1])));
    out
}

/// Next-period return: `v[i+1] / v[i] - 1`. The last index is `None`.
///
/// Used as a training label; it looks one step ahead by construction.
pub fn forward_return(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out: Vec<Option<f64>> = values
        .windows(2)
        .map(|w| ratio_return(w[0], w[1]))
        .collect();
    if !values.is_empty() {
        out.push(None);
    }
    out
}

fn ratio_return(prev: Option<f64>, curr: Option<f64>) -> Option<f64> {
    let (prev, curr) = (prev?, curr?);
    if prev == 0.0 || !prev.is_finite() || !curr.is_finite() {
        return None;
    }
    Some(curr / prev - 1.0)
}
