// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{Chi2Matrix, MisfitError, NodeId, NodeValue, StateKind};

/// One ensemble-wide chi-square evaluation for a single observation key.
///
/// `step_to` is inclusive and `member_to` is exclusive; the output matrix is
/// indexed by absolute step and member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chi2Request<'k> {
    pub obs_key: &'k str,
    pub step_from: usize,
    pub step_to: usize,
    pub member_from: usize,
    pub member_to: usize,
    pub state: StateKind,
}

/// Named observation series able to score every ensemble member.
pub trait ObservationSource {
    /// Observation keys in the source's stable native order.
    fn observation_keys(&self) -> Vec<String>;

    /// Fills `out[step][iens]` for the requested window.
    ///
    /// Members without usable simulated data must be flagged by setting
    /// `valid[iens] = false`; entries already `false` stay `false`.
    fn evaluate_chi2(
        &self,
        request: &Chi2Request<'_>,
        valid: &mut [bool],
        out: &mut Chi2Matrix,
    ) -> Result<(), MisfitError>;
}

/// Per-member scalar lookup used for data rankings.
pub trait ScalarAccessor {
    /// Returns `Ok(None)` when the member has no value for this key.
    fn get_value(&self, key_index: &str, node_id: NodeId)
    -> Result<Option<NodeValue>, MisfitError>;
}

/// Case-level record storage for one ensemble case.
pub trait CaseStorage {
    /// Identifies where this case is mounted; recorded as the table case id.
    fn mount_point(&self) -> &str;

    /// Replaces the record `label` with `bytes`.
    fn write_case_file(&self, label: &str, bytes: &[u8]) -> Result<(), MisfitError>;

    fn read_case_file(&self, label: &str) -> Result<Vec<u8>, MisfitError>;
}

impl<T: ObservationSource + ?Sized> ObservationSource for &T {
    fn observation_keys(&self) -> Vec<String> {
        (**self).observation_keys()
    }

    fn evaluate_chi2(
        &self,
        request: &Chi2Request<'_>,
        valid: &mut [bool],
        out: &mut Chi2Matrix,
    ) -> Result<(), MisfitError> {
        (**self).evaluate_chi2(request, valid, out)
    }
}

impl<T: ScalarAccessor + ?Sized> ScalarAccessor for &T {
    fn get_value(
        &self,
        key_index: &str,
        node_id: NodeId,
    ) -> Result<Option<NodeValue>, MisfitError> {
        (**self).get_value(key_index, node_id)
    }
}
