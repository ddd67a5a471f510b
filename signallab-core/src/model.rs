//! Price predictors consumed by the combined strategy.
//!
//! The shipped implementation is a standardised linear model exported as
//! JSON: per-feature mean and scale, one coefficient per feature, and an
//! intercept.

use crate::features::{FeatureRow, FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("dimension mismatch: expected {expected} values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Anything that maps a feature row to a predicted value.
pub trait Predictor: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;

    fn predict_row(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        self.predict(&row.feature_vector())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default = "default_feature_names")]
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

fn default_feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

impl LinearModel {
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// All vectors must have one entry per feature.
    pub fn validate(&self) -> Result<(), ModelError> {
        let expected = self.coefficients.len();
        for len in [self.feature_names.len(), self.mean.len(), self.scale.len()] {
            if len != expected {
                return Err(ModelError::DimensionMismatch { expected, got: len });
            }
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.coefficients.len()
    }
}

impl Predictor for LinearModel {
    fn name(&self) -> &str {
        "linear"
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.dimension() {
            return Err(ModelError::DimensionMismatch {
                expected: self.dimension(),
                got: features.len(),
            });
        }
        let dot: f64 = features
            .iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .zip(&self.coefficients)
            .map(|(((x, mean), scale), coef)| {
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                coef * (x - mean) / scale
            })
            .sum();
        Ok(self.intercept + dot)
    }
}
