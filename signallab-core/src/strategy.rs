//! Combining the SMA signal with model price predictions.

use crate::domain::Signal;

/// Merge an SMA signal with model predictions of the next price.
///
/// Buy wins if the SMA says buy or any prediction is above `price`; then
/// sell if the SMA says sell or any prediction is below `price`; otherwise
/// hold. Missing and NaN predictions are ignored.
pub fn combine(sma_signal: Signal, predictions: &[Option<f64>], price: f64) -> Signal {
    let mut usable = predictions.iter().flatten().filter(|p| !p.is_nan());

    if sma_signal == Signal::Buy || usable.clone().any(|&p| p > price) {
        Signal::Buy
    } else if sma_signal == Signal::Sell || usable.any(|&p| p < price) {
        Signal::Sell
    } else {
        Signal::Hold
    }
}
