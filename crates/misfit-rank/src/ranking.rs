// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use misfit_core::MisfitError;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Total recorded for members excluded from a ranking.
///
/// Invalid members are identified by their missing per-key values, not by
/// comparing against this constant, so a legitimate total equal to it still
/// sorts ahead of every invalid member.
pub const INVALID_MISFIT: f64 = f64::MAX;

/// Per-key score breakdown for one member.
pub type MemberScores = BTreeMap<String, f64>;

/// A named ordering of the ensemble plus the scores behind it.
///
/// Filled through [`Ranking::iset`]/[`Ranking::iset_invalid`], then frozen
/// by [`Ranking::init_sort`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RankingRepr"))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ranking {
    members: Vec<Option<MemberScores>>,
    totals: Vec<f64>,
    sort_permutation: Option<Vec<usize>>,
}

/// Unchecked wire form of [`Ranking`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RankingRepr {
    members: Vec<Option<MemberScores>>,
    totals: Vec<f64>,
    sort_permutation: Option<Vec<usize>>,
}

#[cfg(feature = "serde")]
impl TryFrom<RankingRepr> for Ranking {
    type Error = MisfitError;

    /// Invalid members get their total reset to [`INVALID_MISFIT`]; a text
    /// round-trip of `f64::MAX` is not guaranteed to be bit-exact.
    fn try_from(repr: RankingRepr) -> Result<Self, Self::Error> {
        let RankingRepr {
            members,
            mut totals,
            sort_permutation,
        } = repr;
        if members.len() != totals.len() {
            return Err(MisfitError::size_mismatch(format!(
                "ranking has {} members but {} totals",
                members.len(),
                totals.len()
            )));
        }
        for (scores, total) in members.iter().zip(totals.iter_mut()) {
            if scores.is_none() {
                *total = INVALID_MISFIT;
            }
        }
        if let Some(permutation) = &sort_permutation {
            let mut seen = vec![false; members.len()];
            if permutation.len() != members.len() {
                return Err(MisfitError::invalid_input(format!(
                    "sort permutation has {} entries for {} members",
                    permutation.len(),
                    members.len()
                )));
            }
            for &iens in permutation {
                match seen.get_mut(iens) {
                    Some(slot) if !*slot => *slot = true,
                    Some(_) => {
                        return Err(MisfitError::invalid_input(format!(
                            "sort permutation lists member {iens} twice"
                        )));
                    }
                    None => {
                        return Err(MisfitError::invalid_input(format!(
                            "sort permutation names member {iens} outside 0..{}",
                            members.len()
                        )));
                    }
                }
            }
        }
        Ok(Self {
            members,
            totals,
            sort_permutation,
        })
    }
}

impl Ranking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Installs a valid member, growing the ranking with invalid slots when
    /// `iens` lies beyond the current length.
    pub fn iset(&mut self, iens: usize, scores: MemberScores, total: f64) -> Result<(), MisfitError> {
        self.install(iens, Some(scores), total)
    }

    /// Marks `iens` as excluded; it will always sort after valid members.
    pub fn iset_invalid(&mut self, iens: usize) -> Result<(), MisfitError> {
        self.install(iens, None, INVALID_MISFIT)
    }

    fn install(
        &mut self,
        iens: usize,
        scores: Option<MemberScores>,
        total: f64,
    ) -> Result<(), MisfitError> {
        if self.sort_permutation.is_some() {
            return Err(MisfitError::invalid_input(format!(
                "cannot set member {iens}: ranking is already sorted"
            )));
        }
        if iens >= self.totals.len() {
            self.members.resize(iens + 1, None);
            self.totals.resize(iens + 1, INVALID_MISFIT);
        }
        self.members[iens] = scores;
        self.totals[iens] = total;
        Ok(())
    }

    pub fn is_valid(&self, iens: usize) -> bool {
        self.members.get(iens).is_some_and(Option::is_some)
    }

    pub fn valid_count(&self) -> usize {
        self.members.iter().filter(|scores| scores.is_some()).count()
    }

    /// Total for `iens`; `INVALID_MISFIT` for excluded members.
    pub fn total(&self, iens: usize) -> Option<f64> {
        self.totals.get(iens).copied()
    }

    pub fn totals(&self) -> &[f64] {
        &self.totals
    }

    /// Per-key scores for a valid member.
    pub fn scores(&self, iens: usize) -> Option<&MemberScores> {
        self.members.get(iens).and_then(Option::as_ref)
    }

    /// Computes the ascending permutation: valid members by total, then
    /// invalid members, ties kept in index order.
    pub fn init_sort(&mut self) {
        let mut permutation: Vec<usize> = (0..self.totals.len()).collect();
        permutation.sort_by(|&left, &right| self.rank_order(left, right));
        self.sort_permutation = Some(permutation);
    }

    fn rank_order(&self, left: usize, right: usize) -> Ordering {
        match (self.is_valid(left), self.is_valid(right)) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Ordering::Equal,
            (true, true) => self.totals[left].total_cmp(&self.totals[right]),
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.sort_permutation.is_some()
    }

    pub fn permutation(&self) -> Result<&[usize], MisfitError> {
        self.sort_permutation.as_deref().ok_or_else(|| {
            MisfitError::uninitialized_ranking("permutation requested before init_sort")
        })
    }
}
