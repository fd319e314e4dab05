// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::MisfitError;

/// Dense `steps × members` matrix of chi-square values, row-major by step.
#[derive(Clone, Debug, PartialEq)]
pub struct Chi2Matrix {
    steps: usize,
    members: usize,
    values: Vec<f64>,
}

impl Chi2Matrix {
    /// Allocates a zero-filled matrix.
    pub fn zeros(steps: usize, members: usize) -> Result<Self, MisfitError> {
        let len = steps.checked_mul(members).ok_or_else(|| {
            MisfitError::invalid_input(format!(
                "chi2 matrix shape overflow: steps={steps}, members={members}"
            ))
        })?;
        Ok(Self {
            steps,
            members,
            values: vec![0.0; len],
        })
    }

    /// Builds a matrix from one row per step.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, MisfitError> {
        let members = rows.first().map_or(0, Vec::len);
        let mut matrix = Self::zeros(rows.len(), members)?;
        for (step, row) in rows.iter().enumerate() {
            if row.len() != members {
                return Err(MisfitError::size_mismatch(format!(
                    "chi2 row {step} has {} members; expected {members}",
                    row.len()
                )));
            }
            matrix.row_mut(step).copy_from_slice(row);
        }
        Ok(matrix)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn members(&self) -> usize {
        self.members
    }

    pub fn get(&self, step: usize, iens: usize) -> f64 {
        self.values[step * self.members + iens]
    }

    pub fn set(&mut self, step: usize, iens: usize, value: f64) {
        self.values[step * self.members + iens] = value;
    }

    pub fn row(&self, step: usize) -> &[f64] {
        let start = step * self.members;
        &self.values[start..start + self.members]
    }

    pub fn row_mut(&mut self, step: usize) -> &mut [f64] {
        let start = step * self.members;
        &mut self.values[start..start + self.members]
    }

    /// Copies the column for member `iens` (one value per step).
    pub fn column(&self, iens: usize) -> Vec<f64> {
        (0..self.steps).map(|step| self.get(step, iens)).collect()
    }

    pub fn fill(&mut self, value: f64) {
        self.values.fill(value);
    }
}
