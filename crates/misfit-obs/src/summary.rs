// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use misfit_core::MisfitError;
use std::str::FromStr;

/// How the standard deviation of a history observation is derived.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// `std = error`
    #[default]
    Abs,
    /// `std = error * value`
    Rel,
    /// `std = max(error * value, error_min)`
    RelMin,
}

impl FromStr for ErrorMode {
    type Err = MisfitError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ABS" => Ok(Self::Abs),
            "REL" => Ok(Self::Rel),
            "RELMIN" => Ok(Self::RelMin),
            _ => Err(MisfitError::invalid_input(format!(
                "unknown error mode '{raw}'; expected ABS, REL or RELMIN"
            ))),
        }
    }
}

/// Observed values of one summary vector, indexed by report step.
///
/// Defaulted steps carry no information and score zero.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryObservation {
    summary_key: String,
    value: Vec<f64>,
    std: Vec<f64>,
    default_used: Vec<bool>,
}

impl SummaryObservation {
    fn checked(
        summary_key: String,
        value: Vec<f64>,
        std: Vec<f64>,
        default_used: Vec<bool>,
    ) -> Result<Self, MisfitError> {
        if summary_key.trim().is_empty() {
            return Err(MisfitError::invalid_input("summary key must be non-empty"));
        }
        for (step, (&deviation, &defaulted)) in std.iter().zip(&default_used).enumerate() {
            if !defaulted && !(deviation.is_finite() && deviation > 0.0) {
                return Err(MisfitError::invalid_input(format!(
                    "observation '{summary_key}' has std={deviation} at active step {step}; expected a positive finite value"
                )));
            }
        }
        Ok(Self {
            summary_key,
            value,
            std,
            default_used,
        })
    }

    /// Observation following a historical time series, one entry per step.
    pub fn from_history(
        summary_key: impl Into<String>,
        values: Vec<f64>,
        default_used: Vec<bool>,
        error: f64,
        error_min: f64,
        mode: ErrorMode,
    ) -> Result<Self, MisfitError> {
        if values.len() != default_used.len() {
            return Err(MisfitError::size_mismatch(format!(
                "history has {} values but {} default flags",
                values.len(),
                default_used.len()
            )));
        }
        let std = values
            .iter()
            .map(|&value| match mode {
                ErrorMode::Abs => error,
                ErrorMode::Rel => error * value,
                ErrorMode::RelMin => (error * value).max(error_min),
            })
            .collect();
        Self::checked(summary_key.into(), values, std, default_used)
    }

    /// Observation active at a single report step; every other step is
    /// defaulted to value 0 and std 1.
    pub fn single(
        summary_key: impl Into<String>,
        size: usize,
        restart: usize,
        value: f64,
        error: f64,
    ) -> Result<Self, MisfitError> {
        let summary_key = summary_key.into();
        if restart >= size {
            return Err(MisfitError::invalid_input(format!(
                "observation '{summary_key}' occurs at step {restart}, but history has only {size} steps"
            )));
        }
        let mut values = vec![0.0; size];
        let mut std = vec![1.0; size];
        let mut default_used = vec![true; size];
        values[restart] = value;
        std[restart] = error;
        default_used[restart] = false;
        Self::checked(summary_key, values, std, default_used)
    }

    pub fn summary_key(&self) -> &str {
        &self.summary_key
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Steps past the end of the observation count as defaulted.
    pub fn is_active(&self, step: usize) -> bool {
        self.default_used.get(step).is_some_and(|defaulted| !defaulted)
    }

    pub fn value(&self, step: usize) -> Option<f64> {
        self.value.get(step).copied()
    }

    pub fn std(&self, step: usize) -> Option<f64> {
        self.std.get(step).copied()
    }

    pub fn active_steps(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&step| self.is_active(step))
    }

    /// `((simulated - value) / std)^2`, or zero when the step is defaulted.
    pub fn chi2(&self, step: usize, simulated: f64) -> f64 {
        if !self.is_active(step) {
            return 0.0;
        }
        let residual = (simulated - self.value[step]) / self.std[step];
        residual * residual
    }
}
