// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use misfit_core::{MisfitError, StateKind};
use std::path::PathBuf;

/// Settings for populating a misfit table.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MisfitConfig {
    /// Ensemble state the simulated responses are compared from.
    pub compare_state: StateKind,
}

impl MisfitConfig {
    #[cfg(feature = "serde")]
    pub fn from_json_str(raw: &str) -> Result<Self, MisfitError> {
        serde_json::from_str(raw)
            .map_err(|err| MisfitError::invalid_input(format!("invalid misfit config JSON: {err}")))
    }
}

/// Declarative description of a misfit ranking over an inclusive step window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankingRequest {
    pub ranking_key: String,
    pub sort_keys: Vec<String>,
    pub step1: usize,
    pub step2: usize,
    /// Optional path for the text report.
    #[cfg_attr(feature = "serde", serde(default))]
    pub report: Option<PathBuf>,
}

impl RankingRequest {
    /// Checks the request against a table's history length.
    pub fn validate(&self, history_length: usize) -> Result<(), MisfitError> {
        if self.ranking_key.trim().is_empty() {
            return Err(MisfitError::invalid_input("ranking_key must be non-empty"));
        }
        if self.step1 > self.step2 {
            return Err(MisfitError::invalid_input(format!(
                "step1={} must be <= step2={}",
                self.step1, self.step2
            )));
        }
        if self.step2 > history_length {
            return Err(MisfitError::size_mismatch(format!(
                "step2={} exceeds history_length={history_length}",
                self.step2
            )));
        }
        Ok(())
    }
}
