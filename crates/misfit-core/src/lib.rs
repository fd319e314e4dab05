// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared types for ensemble misfit accumulation and ranking.

pub mod buffer;
pub mod chi2;
pub mod collaborators;
pub mod error;
pub mod state;

pub use buffer::BinaryBuffer;
pub use chi2::Chi2Matrix;
pub use collaborators::{CaseStorage, Chi2Request, ObservationSource, ScalarAccessor};
pub use error::MisfitError;
pub use state::{NodeId, NodeValue, StateKind};
