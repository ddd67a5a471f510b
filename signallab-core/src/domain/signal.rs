//! Signal and the moving-average decision rule.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading signal produced by comparing a price to a reference average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal '{0}' (expected BUY, SELL or HOLD)")]
pub struct ParseSignalError(String);

impl FromStr for Signal {
    type Err = ParseSignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "HOLD" => Ok(Signal::Hold),
            _ => Err(ParseSignalError(s.to_string())),
        }
    }
}

/// Simple moving-average decision rule.
///
/// Total: a missing input, or one that is not a real number (NaN), yields
/// `Hold`. Otherwise price above the average is `Buy`, below is `Sell`,
/// and equality is `Hold`.
pub fn decide(current_price: Option<f64>, reference_average: Option<f64>) -> Signal {
    let (Some(price), Some(average)) = (current_price, reference_average) else {
        return Signal::Hold;
    };
    if price > average {
        Signal::Buy
    } else if price < average {
        Signal::Sell
    } else {
        // Equal, or at least one side is NaN.
        Signal::Hold
    }
}

/// [`decide`] over textual inputs. Anything that fails to parse as `f64` is missing.
pub fn decide_raw(current_price: &str, reference_average: &str) -> Signal {
    decide(parse_real(current_price), parse_real(reference_average))
}

fn parse_real(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}
