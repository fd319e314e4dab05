// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Ensemble rankings: per-member scores, a stable sort permutation with
//! invalid members last, and fixed-width text reports.

pub mod ranking;
pub mod report;

pub use ranking::{INVALID_MISFIT, MemberScores, Ranking};
pub use report::normalized_misfit;
