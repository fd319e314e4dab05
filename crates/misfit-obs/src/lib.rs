// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Summary observations, simulated forecasts and the chi-square source that
//! scores one against the other.

pub mod forecast;
pub mod source;
pub mod summary;

pub use forecast::ForecastEnsemble;
pub use source::SummaryObservationSet;
pub use summary::{ErrorMode, SummaryObservation};
