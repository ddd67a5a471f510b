//! Latest-bar advice: SMA signal, model predictions, and the combined call.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use signallab_core::domain::{decide, Bar, Signal};
use signallab_core::features::prepare_features;
use signallab_core::indicators::sma;
use signallab_core::model::{ModelError, Predictor};
use signallab_core::strategy::combine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdviceError {
    #[error("no bar with a valid close")]
    NoValidClose,

    #[error(transparent)]
    Indicator(#[from] signallab_core::indicators::IndicatorError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub model: String,
    /// Predicted next price, or `None` when features were unavailable.
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub average: Option<f64>,
    pub sma_signal: Signal,
    pub predictions: Vec<Prediction>,
    pub signal: Signal,
}

/// Evaluate the last bar with a valid close.
///
/// Predictors output the next-bar return; it is turned into a price as
/// `close * (1 + return)` against the latest complete feature row.
pub fn evaluate_latest(
    bars: &[Bar],
    window: usize,
    predictors: &[&dyn Predictor],
) -> Result<Advice, AdviceError> {
    let mut sorted = bars.to_vec();
    sorted.sort_by_key(|b| b.timestamp);

    let closes: Vec<Option<f64>> = sorted.iter().map(Bar::valid_close).collect();
    let averages = sma(&closes, window)?;
    let idx = closes
        .iter()
        .rposition(Option::is_some)
        .ok_or(AdviceError::NoValidClose)?;
    let price = closes[idx].ok_or(AdviceError::NoValidClose)?;
    let average = averages[idx];
    let sma_signal = decide(Some(price), average);

    // Feature rows need a next bar for their target, so the latest row is
    // one bar behind the price being evaluated.
    let rows = prepare_features(&sorted);
    let latest = rows.last();

    let mut predictions = Vec::with_capacity(predictors.len());
    for predictor in predictors {
        let price = match latest {
            Some(row) => Some(row.close * (1.0 + predictor.predict_row(row)?)),
            None => None,
        };
        predictions.push(Prediction {
            model: predictor.name().to_string(),
            price,
        });
    }

    let predicted: Vec<Option<f64>> = predictions.iter().map(|p| p.price).collect();
    Ok(Advice {
        timestamp: sorted[idx].timestamp,
        price,
        average,
        sma_signal,
        signal: combine(sma_signal, &predicted, price),
        predictions,
    })
}
