// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Per-member misfit accumulation for ensemble history matching.
//!
//! A [`MisfitTable`] evaluates every observation key against the ensemble,
//! keeps one [`MisfitVector`] per (member, key), persists the result to case
//! storage and derives named rankings from it.

pub mod config;
pub mod node;
pub mod storage;
pub mod table;
pub mod vector;

pub use config::{MisfitConfig, RankingRequest};
pub use node::MisfitNode;
pub use storage::{DirectoryStorage, MemoryStorage};
pub use table::{MISFIT_CASE_RECORD, MisfitTable};
pub use vector::MisfitVector;
