// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{ForecastEnsemble, SummaryObservation};
use indexmap::IndexMap;
use misfit_core::{Chi2Matrix, Chi2Request, MisfitError, ObservationSource};
use tracing::debug;

/// Named summary observations scored against one forecast ensemble.
#[derive(Clone, Debug)]
pub struct SummaryObservationSet<'a> {
    forecasts: &'a ForecastEnsemble,
    observations: IndexMap<String, SummaryObservation>,
}

impl<'a> SummaryObservationSet<'a> {
    pub fn new(forecasts: &'a ForecastEnsemble) -> Self {
        Self {
            forecasts,
            observations: IndexMap::new(),
        }
    }

    pub fn forecasts(&self) -> &'a ForecastEnsemble {
        self.forecasts
    }

    pub fn insert(
        &mut self,
        obs_key: impl Into<String>,
        observation: SummaryObservation,
    ) -> Result<(), MisfitError> {
        let obs_key = obs_key.into();
        if self.observations.contains_key(&obs_key) {
            return Err(MisfitError::invalid_input(format!(
                "observation key '{obs_key}' is already registered"
            )));
        }
        self.observations.insert(obs_key, observation);
        Ok(())
    }

    pub fn get(&self, obs_key: &str) -> Option<&SummaryObservation> {
        self.observations.get(obs_key)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl ObservationSource for SummaryObservationSet<'_> {
    fn observation_keys(&self) -> Vec<String> {
        self.observations.keys().cloned().collect()
    }

    /// A member missing the forecast at any active step is flagged invalid
    /// and its column is left at zero.
    fn evaluate_chi2(
        &self,
        request: &Chi2Request<'_>,
        valid: &mut [bool],
        out: &mut Chi2Matrix,
    ) -> Result<(), MisfitError> {
        let observation = self.observations.get(request.obs_key).ok_or_else(|| {
            MisfitError::evaluation(format!("unknown observation key '{}'", request.obs_key))
        })?;
        if request.step_to >= out.steps() || request.member_to > out.members() {
            return Err(MisfitError::size_mismatch(format!(
                "chi2 output is {}x{}; request needs steps ..={} and members ..{}",
                out.steps(),
                out.members(),
                request.step_to,
                request.member_to
            )));
        }
        if request.member_to > valid.len() {
            return Err(MisfitError::size_mismatch(format!(
                "validity mask has {} members; request needs {}",
                valid.len(),
                request.member_to
            )));
        }

        let summary_key = observation.summary_key();
        for iens in request.member_from..request.member_to {
            let mut missing_step = None;
            for step in request.step_from..=request.step_to {
                if !observation.is_active(step) {
                    out.set(step, iens, 0.0);
                    continue;
                }
                match self.forecasts.get(summary_key, step, iens, request.state) {
                    Some(simulated) => out.set(step, iens, observation.chi2(step, simulated)),
                    None => {
                        missing_step = Some(step);
                        break;
                    }
                }
            }
            if let Some(step) = missing_step {
                debug!(iens, summary_key, step, "no simulated value at observed step");
                valid[iens] = false;
                for step in request.step_from..=request.step_to {
                    out.set(step, iens, 0.0);
                }
            }
        }
        Ok(())
    }
}
