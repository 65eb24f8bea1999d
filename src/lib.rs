//! Run an operation at a target rate, sizing a pool of concurrent workers with congestion-control
//! style feedback so the rate holds even when each call outlasts the gap between calls.

#![deny(missing_docs)]

#[cfg(doctest)]
use doc_comment::doctest;
#[cfg(doctest)]
doctest!("../README.md");

pub mod controller;
mod defaults;
mod error;
pub mod operation;
mod pacer;
mod pool;
mod rate;
mod report;
mod sampler;
mod schedule;

pub use controller::{ControllerState, Decision, Phase, ScalingController};
pub use error::{Error, Result};
pub use operation::Operation;
pub use pacer::{run, Pacer};
pub use rate::RateSpec;
pub use report::{Report, Reporter};
pub use sampler::Sample;
