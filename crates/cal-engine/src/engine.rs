//! Calibration run driver.
//!
//! Orchestrates one run: generate the parameter matrix, partition this
//! peer's candidate slice across worker threads, evaluate every candidate
//! through the process runner, track the Top-N locally, then merge across
//! peers and assemble the final report on the coordinator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::Range;
use std::path::PathBuf;
use std::thread;
use tracing::{debug, info};
use uuid::Uuid;

use cal_types::{CalError, CalResult, Calibration};

use crate::bests::SharedBestSet;
use crate::matrix::ParameterMatrix;
use crate::partition::split_evenly;
use crate::peer::{self, Topology};
use crate::runner::CandidateRunner;

/// One ranked result in the final report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestRecord {
    pub candidate: usize,
    pub value: f64,
    /// The candidate's parameter vector in variable declaration order.
    pub parameters: Vec<f64>,
}

/// Outcome of a calibration run, produced only on the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub nsimulations: usize,
    pub nthreads: usize,
    /// Global Top-N, ascending by objective value.
    pub bests: Vec<BestRecord>,
}

impl RunReport {
    pub fn best(&self) -> Option<&BestRecord> {
        self.bests.first()
    }
}

/// The calibration execution engine.
pub struct Engine<'a> {
    calibration: &'a Calibration,
    nthreads: usize,
    topology: Topology,
    coordinator: Option<String>,
}

impl<'a> Engine<'a> {
    pub fn new(calibration: &'a Calibration, nthreads: usize) -> Self {
        Self {
            calibration,
            nthreads: nthreads.max(1),
            topology: Topology::single(),
            coordinator: None,
        }
    }

    /// Run inside a peer group instead of standalone.
    pub fn with_topology(mut self, topology: Topology, coordinator: Option<String>) -> Self {
        self.topology = topology;
        self.coordinator = coordinator;
        self
    }

    /// Execute the run. Returns `Ok(None)` on non-coordinator peers, which
    /// transmit their results and report nothing.
    pub fn run(&self) -> CalResult<Option<RunReport>> {
        let id = Uuid::new_v4();
        let started_at = Utc::now();

        let matrix = ParameterMatrix::generate(self.calibration);
        if matrix.ncandidates() == 0 {
            return Err(CalError::Unsupported(
                "the selected algorithm generated no candidates \
                 (genetic calibration is not implemented)"
                    .to_string(),
            ));
        }

        let scratch = self.create_scratch(id)?;
        let slice = self.topology.slice(matrix.ncandidates());
        info!(
            run = %id,
            rank = self.topology.rank,
            peers = self.topology.peers,
            nthreads = self.nthreads,
            start = slice.start,
            end = slice.end,
            "starting calibration run"
        );

        let shared = SharedBestSet::new(self.calibration.nbests);
        let runner = CandidateRunner::new(self.calibration, &scratch);

        let outcome = if self.nthreads <= 1 {
            // Single worker: no thread creation, run the slice inline.
            evaluate_range(&runner, &matrix, slice, &shared)
        } else {
            let ranges = split_evenly(slice, self.nthreads);
            thread::scope(|scope| {
                let mut handles = Vec::with_capacity(ranges.len());
                for range in ranges {
                    let runner = &runner;
                    let matrix = &matrix;
                    let shared = &shared;
                    handles.push(scope.spawn(move || {
                        evaluate_range(runner, matrix, range, shared)
                    }));
                }
                let mut first_error = None;
                for handle in handles {
                    match handle.join() {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => {
                            if first_error.is_none() {
                                first_error = Some(error);
                            }
                        }
                        Err(_) => {
                            if first_error.is_none() {
                                first_error =
                                    Some(CalError::Internal("worker thread panicked".to_string()));
                            }
                        }
                    }
                }
                match first_error {
                    Some(error) => Err(error),
                    None => Ok(()),
                }
            })
        };

        // Scratch cleanup runs whether or not the evaluation succeeded.
        if let Err(error) = std::fs::remove_dir_all(&scratch) {
            debug!(scratch = %scratch.display(), %error, "scratch directory cleanup failed");
        }
        outcome?;

        let local = shared.into_inner();
        let global = peer::exchange(&self.topology, self.coordinator.as_deref(), local)?;
        let Some(global) = global else {
            return Ok(None);
        };

        let bests = global
            .entries()
            .iter()
            .map(|entry| BestRecord {
                candidate: entry.candidate,
                value: entry.value,
                parameters: matrix.row(entry.candidate).to_vec(),
            })
            .collect();
        let finished_at = Utc::now();
        info!(run = %id, elapsed = %(finished_at - started_at), "calibration run finished");

        Ok(Some(RunReport {
            id,
            started_at,
            finished_at,
            nsimulations: matrix.ncandidates(),
            nthreads: self.nthreads,
            bests,
        }))
    }

    /// Per-run scratch directory: the run id keeps concurrent runs on one
    /// host apart while file names inside stay deterministic.
    fn create_scratch(&self, id: Uuid) -> CalResult<PathBuf> {
        let scratch = std::env::temp_dir().join(format!("calibra-{id}"));
        std::fs::create_dir_all(&scratch)?;
        Ok(scratch)
    }
}

fn evaluate_range(
    runner: &CandidateRunner<'_>,
    matrix: &ParameterMatrix,
    range: Range<usize>,
    bests: &SharedBestSet,
) -> CalResult<()> {
    for candidate in range {
        let value = runner.objective(matrix, candidate)?;
        debug!(candidate, value, "candidate evaluated");
        bests.offer(candidate, value);
    }
    Ok(())
}
