// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use misfit_core::{MisfitError, NodeId, NodeValue, ScalarAccessor, StateKind};
use std::collections::BTreeMap;

type MemberSeries = BTreeMap<(usize, StateKind), Vec<Option<f64>>>;

/// Simulated summary responses for every member of an ensemble.
///
/// Each (summary key, member, state) holds one value per report step;
/// `None` marks a step the simulation did not produce.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForecastEnsemble {
    ens_size: usize,
    responses: BTreeMap<String, MemberSeries>,
}

impl ForecastEnsemble {
    pub fn new(ens_size: usize) -> Self {
        Self {
            ens_size,
            responses: BTreeMap::new(),
        }
    }

    pub fn ens_size(&self) -> usize {
        self.ens_size
    }

    pub fn has_key(&self, summary_key: &str) -> bool {
        self.responses.contains_key(summary_key)
    }

    pub fn summary_keys(&self) -> impl Iterator<Item = &str> {
        self.responses.keys().map(String::as_str)
    }

    /// Stores the series for one member, replacing any previous one.
    pub fn insert(
        &mut self,
        summary_key: impl Into<String>,
        iens: usize,
        state: StateKind,
        values: Vec<Option<f64>>,
    ) -> Result<(), MisfitError> {
        if iens >= self.ens_size {
            return Err(MisfitError::size_mismatch(format!(
                "member {iens} is outside ensemble of {} members",
                self.ens_size
            )));
        }
        if state == StateKind::Both {
            return Err(MisfitError::invalid_input(
                "responses are stored as forecast or analyzed, not both",
            ));
        }
        self.responses
            .entry(summary_key.into())
            .or_default()
            .insert((iens, state), values);
        Ok(())
    }

    /// Stores a gap-free series.
    pub fn insert_complete(
        &mut self,
        summary_key: impl Into<String>,
        iens: usize,
        state: StateKind,
        values: &[f64],
    ) -> Result<(), MisfitError> {
        self.insert(summary_key, iens, state, values.iter().copied().map(Some).collect())
    }

    /// `StateKind::Both` prefers the analyzed value and falls back to the
    /// forecast.
    pub fn get(
        &self,
        summary_key: &str,
        report_step: usize,
        iens: usize,
        state: StateKind,
    ) -> Option<f64> {
        let series = self.responses.get(summary_key)?;
        let lookup = |state: StateKind| {
            series
                .get(&(iens, state))
                .and_then(|values| values.get(report_step).copied().flatten())
        };
        match state {
            StateKind::Both => lookup(StateKind::Analyzed).or_else(|| lookup(StateKind::Forecast)),
            state => lookup(state),
        }
    }
}

impl ScalarAccessor for ForecastEnsemble {
    /// `key_index` names the summary key; an unknown key is an error while a
    /// gap for one member is `Ok(None)`.
    fn get_value(
        &self,
        key_index: &str,
        node_id: NodeId,
    ) -> Result<Option<NodeValue>, MisfitError> {
        if !self.has_key(key_index) {
            return Err(MisfitError::missing_key(format!(
                "forecast ensemble has no summary key '{key_index}'"
            )));
        }
        Ok(self
            .get(key_index, node_id.report_step, node_id.iens, node_id.state)
            .map(NodeValue::F64))
    }
}
