// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use misfit_core::{BinaryBuffer, MisfitError};

/// Misfit time series for one member and one observation key, indexed by
/// report step `0..=history_length`.
#[derive(Clone, Debug, PartialEq)]
pub struct MisfitVector {
    samples: Vec<f64>,
}

impl MisfitVector {
    /// Zero-filled vector with `history_length + 1` samples.
    pub fn new(history_length: usize) -> Self {
        Self {
            samples: vec![0.0; history_length + 1],
        }
    }

    pub fn from_samples(samples: Vec<f64>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iset(&mut self, step: usize, value: f64) -> Result<(), MisfitError> {
        let len = self.samples.len();
        let slot = self.samples.get_mut(step).ok_or_else(|| {
            MisfitError::size_mismatch(format!(
                "step {step} is outside misfit vector of {len} samples"
            ))
        })?;
        *slot = value;
        Ok(())
    }

    /// Sum over the half-open interval `[step1, step2)`.
    pub fn sum(&self, step1: usize, step2: usize) -> Result<f64, MisfitError> {
        if step1 >= step2 {
            return Ok(0.0);
        }
        if step2 > self.samples.len() {
            return Err(MisfitError::size_mismatch(format!(
                "half-open range [{step1}, {step2}) exceeds misfit vector of {} samples",
                self.samples.len()
            )));
        }
        Ok(self.samples[step1..step2].iter().sum())
    }

    /// Sum over the inclusive interval `[step1, step2]`. Rankings use this form.
    pub fn eval(&self, step1: usize, step2: usize) -> Result<f64, MisfitError> {
        if step1 > step2 {
            return Ok(0.0);
        }
        if step2 >= self.samples.len() {
            return Err(MisfitError::size_mismatch(format!(
                "inclusive range [{step1}, {step2}] exceeds misfit vector of {} samples",
                self.samples.len()
            )));
        }
        Ok(self.samples[step1..=step2].iter().sum())
    }

    pub(crate) fn buffer_fwrite(&self, buffer: &mut BinaryBuffer) -> Result<(), MisfitError> {
        buffer.write_doubles(&self.samples)
    }

    pub(crate) fn buffer_fread_alloc(buffer: &mut BinaryBuffer) -> Result<Self, MisfitError> {
        Ok(Self::from_samples(buffer.read_doubles()?))
    }
}
