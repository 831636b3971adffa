//! # cal-engine
//!
//! Calibration execution engine for Calibra.
//!
//! Provides parameter-space generation (sweep and Monte Carlo), work
//! partitioning across worker threads and cooperating peer processes,
//! template rendering, external simulator/evaluator invocation, and
//! concurrent Top-N best-result tracking with a cross-peer merge.

pub mod bests;
pub mod engine;
pub mod matrix;
pub mod partition;
pub mod peer;
pub mod runner;
pub mod template;

pub use bests::{BestEntry, BestSet, SharedBestSet};
pub use engine::{BestRecord, Engine, RunReport};
pub use matrix::{ParameterMatrix, MONTE_CARLO_SEED};
pub use partition::split_evenly;
pub use peer::Topology;
pub use runner::CandidateRunner;
