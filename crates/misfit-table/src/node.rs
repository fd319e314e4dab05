// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::MisfitVector;
use indexmap::IndexMap;
use misfit_core::{BinaryBuffer, Chi2Matrix, MisfitError};

/// Misfit for one ensemble member across all observation keys.
///
/// A node turns invalid when its simulation is missing data; invalid nodes
/// keep whatever vectors they had but are never read for ranking.
#[derive(Clone, Debug, PartialEq)]
pub struct MisfitNode {
    iens: usize,
    valid: bool,
    observations: IndexMap<String, MisfitVector>,
}

impl MisfitNode {
    pub fn new(iens: usize) -> Self {
        Self {
            iens,
            valid: true,
            observations: IndexMap::new(),
        }
    }

    pub fn iens(&self) -> usize {
        self.iens
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Observation keys in insertion order.
    pub fn observation_keys(&self) -> impl Iterator<Item = &str> {
        self.observations.keys().map(String::as_str)
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    pub fn has_vector(&self, obs_key: &str) -> bool {
        self.observations.contains_key(obs_key)
    }

    pub fn vector(&self, obs_key: &str) -> Result<&MisfitVector, MisfitError> {
        self.observations.get(obs_key).ok_or_else(|| {
            MisfitError::missing_key(format!(
                "member {} has no misfit for observation key '{obs_key}'",
                self.iens
            ))
        })
    }

    fn install_vector(&mut self, obs_key: String, vector: MisfitVector) {
        self.observations.insert(obs_key, vector);
    }

    /// Copies column `iens` of `chi2` (steps `0..=history_length`) into the
    /// vector for `obs_key`, creating it on first use.
    pub fn update(
        &mut self,
        obs_key: &str,
        history_length: usize,
        iens: usize,
        chi2: &Chi2Matrix,
    ) -> Result<(), MisfitError> {
        if chi2.steps() <= history_length {
            return Err(MisfitError::size_mismatch(format!(
                "chi2 matrix has {} steps; history_length={history_length} needs {}",
                chi2.steps(),
                history_length + 1
            )));
        }
        if iens >= chi2.members() {
            return Err(MisfitError::size_mismatch(format!(
                "chi2 matrix has {} members; member {iens} is out of range",
                chi2.members()
            )));
        }

        let vector = self
            .observations
            .entry(obs_key.to_string())
            .or_insert_with(|| MisfitVector::new(history_length));
        for step in 0..=history_length {
            vector.iset(step, chi2.get(step, iens))?;
        }
        Ok(())
    }

    pub(crate) fn buffer_fwrite(&self, buffer: &mut BinaryBuffer) -> Result<(), MisfitError> {
        buffer.write_len(self.iens)?;
        buffer.write_bool(self.valid);
        if self.valid {
            buffer.write_len(self.observations.len())?;
            for (obs_key, vector) in &self.observations {
                buffer.write_string(obs_key)?;
                vector.buffer_fwrite(buffer)?;
            }
        }
        Ok(())
    }

    pub(crate) fn buffer_fread_alloc(buffer: &mut BinaryBuffer) -> Result<Self, MisfitError> {
        let mut node = Self::new(buffer.read_len("node iens")?);
        node.valid = buffer.read_bool()?;
        if node.valid {
            let count = buffer.read_len("observation key count")?;
            for _ in 0..count {
                let obs_key = buffer.read_string()?;
                let vector = MisfitVector::buffer_fread_alloc(buffer)?;
                if node.has_vector(&obs_key) {
                    return Err(MisfitError::malformed_buffer(format!(
                        "member {} lists observation key '{obs_key}' twice",
                        node.iens
                    )));
                }
                node.install_vector(obs_key, vector);
            }
        }
        Ok(node)
    }
}
