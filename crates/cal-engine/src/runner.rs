//! External simulator and evaluator invocation.
//!
//! One call renders an experiment's templates into scratch input files,
//! runs the simulator, runs the evaluator against the experiment's reference
//! data, parses the scalar cost from the result file, and removes every
//! scratch file. File names are deterministic per (slot, candidate,
//! experiment), so concurrent workers never collide.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{debug, warn};

use cal_types::{Calibration, SimulationError};

use crate::matrix::ParameterMatrix;
use crate::template;

/// The simulator invocation contract fixes at least four input-path slots;
/// unused slots are passed as empty arguments. Experiments declaring more
/// templates pass every path.
const MIN_INPUT_SLOTS: usize = 4;

/// Evaluates candidates by invoking the external simulator and evaluator.
pub struct CandidateRunner<'a> {
    calibration: &'a Calibration,
    scratch: PathBuf,
}

impl<'a> CandidateRunner<'a> {
    pub fn new(calibration: &'a Calibration, scratch: impl Into<PathBuf>) -> Self {
        Self {
            calibration,
            scratch: scratch.into(),
        }
    }

    /// Objective value of one candidate: its per-experiment costs summed
    /// with no weighting.
    pub fn objective(
        &self,
        matrix: &ParameterMatrix,
        candidate: usize,
    ) -> Result<f64, SimulationError> {
        let mut total = 0.0;
        for experiment in 0..self.calibration.nexperiments() {
            total += self.experiment_cost(matrix, candidate, experiment)?;
        }
        Ok(total)
    }

    /// Cost of one (candidate, experiment) pair.
    pub fn experiment_cost(
        &self,
        matrix: &ParameterMatrix,
        candidate: usize,
        experiment: usize,
    ) -> Result<f64, SimulationError> {
        let descriptor = &self.calibration.experiments[experiment];
        let row = matrix.row(candidate);

        let mut inputs: Vec<PathBuf> = Vec::with_capacity(descriptor.templates.len());
        for (slot, template) in descriptor.templates.iter().enumerate() {
            let path = self
                .scratch
                .join(format!("input-{slot}-{candidate}-{experiment}"));
            let rendered = template::render(&template.content, &self.calibration.variables, row);
            if let Err(source) = fs::write(&path, rendered) {
                for written in &inputs {
                    remove_quietly(written);
                }
                return Err(SimulationError::InputWrite {
                    path: path.display().to_string(),
                    source,
                });
            }
            inputs.push(path);
        }
        let output = self.scratch.join(format!("output-{candidate}-{experiment}"));
        let result = self.scratch.join(format!("result-{candidate}-{experiment}"));

        let outcome = self.invoke(descriptor, &inputs, &output, &result);

        // Cleanup is unconditional; a failed deletion never fails the run.
        for path in inputs.iter().chain([&output, &result]) {
            remove_quietly(path);
        }
        outcome
    }

    fn invoke(
        &self,
        descriptor: &cal_types::Experiment,
        inputs: &[PathBuf],
        output: &Path,
        result: &Path,
    ) -> Result<f64, SimulationError> {
        let mut simulator = Command::new(&self.calibration.simulator);
        for slot in 0..inputs.len().max(MIN_INPUT_SLOTS) {
            match inputs.get(slot) {
                Some(path) => simulator.arg(path),
                None => simulator.arg(""),
            };
        }
        simulator.arg(output);
        let simulator_status = run_child(&mut simulator, &self.calibration.simulator)?;

        let mut evaluator = Command::new(&self.calibration.evaluator);
        evaluator.arg(output).arg(&descriptor.data).arg(result);
        let evaluator_status = run_child(&mut evaluator, &self.calibration.evaluator)?;

        // The result line is read regardless of the exit statuses; a missing
        // or unparseable result is attributed to the failed child when one
        // was observed.
        match read_cost(result) {
            Ok(cost) => Ok(cost),
            Err(error) => {
                let failed = [
                    (&self.calibration.simulator, simulator_status),
                    (&self.calibration.evaluator, evaluator_status),
                ]
                .into_iter()
                .find(|(_, status)| !status.success());
                match failed {
                    Some((program, status)) => Err(SimulationError::ChildFailed {
                        program: program.clone(),
                        status: status.code(),
                        path: result.display().to_string(),
                    }),
                    None => Err(error),
                }
            }
        }
    }
}

fn run_child(command: &mut Command, program: &str) -> Result<ExitStatus, SimulationError> {
    debug!(program, "spawning child process");
    let status = command
        .status()
        .map_err(|source| SimulationError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if !status.success() {
        warn!(program, code = ?status.code(), "child exited with failure status");
    }
    Ok(status)
}

/// Parse the leading float of the result file's first line, in C `atof`
/// fashion: trailing text after the number is ignored.
fn read_cost(path: &Path) -> Result<f64, SimulationError> {
    let text = fs::read_to_string(path).map_err(|source| SimulationError::ResultMissing {
        path: path.display().to_string(),
        source,
    })?;
    let line = text.lines().next().unwrap_or("");
    let token = line.split_whitespace().next().ok_or_else(|| {
        SimulationError::ResultEmpty {
            path: path.display().to_string(),
        }
    })?;
    token
        .parse::<f64>()
        .map_err(|_| SimulationError::ResultMalformed {
            path: path.display().to_string(),
            line: line.to_string(),
        })
}

fn remove_quietly(path: &Path) {
    if let Err(error) = fs::remove_file(path) {
        debug!(path = %path.display(), %error, "scratch file removal failed");
    }
}
