// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic fixtures shared by the misfit benchmarks.

use misfit_core::{Chi2Matrix, Chi2Request, MisfitError, ObservationSource};

fn lcg_next(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

/// Observation source with pseudo-random chi2 values and every tenth member
/// missing data.
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    keys: Vec<String>,
    seed: u64,
}

impl SyntheticSource {
    pub fn new(key_count: usize, seed: u64) -> Self {
        Self {
            keys: (0..key_count).map(|slot| format!("WOPR:P{slot}")).collect(),
            seed,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl ObservationSource for SyntheticSource {
    fn observation_keys(&self) -> Vec<String> {
        self.keys.clone()
    }

    fn evaluate_chi2(
        &self,
        request: &Chi2Request<'_>,
        valid: &mut [bool],
        out: &mut Chi2Matrix,
    ) -> Result<(), MisfitError> {
        let mut state = self.seed ^ request.obs_key.len() as u64;
        for step in request.step_from..=request.step_to {
            for value in &mut out.row_mut(step)[request.member_from..request.member_to] {
                *value = (lcg_next(&mut state) >> 40) as f64 / 65_536.0;
            }
        }
        for iens in (request.member_from..request.member_to).step_by(10) {
            valid[iens] = false;
        }
        Ok(())
    }
}
