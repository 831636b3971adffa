//! Parameter matrix generation.
//!
//! The full `nsimulations x nvariables` matrix of candidate values is built
//! up front, before any worker thread is spawned, and is read-only for the
//! rest of the run. Candidate index `i` owns row `i`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use cal_types::{Algorithm, Calibration};

/// Fixed Monte Carlo seed: equal configurations generate equal matrices,
/// byte for byte, on every peer process.
pub const MONTE_CARLO_SEED: u64 = 0x00C0_FFEE_5EED;

/// The candidate value matrix, one row per candidate index.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMatrix {
    values: Vec<f64>,
    nvariables: usize,
}

impl ParameterMatrix {
    /// Generate the candidate matrix for a validated calibration.
    pub fn generate(calibration: &Calibration) -> Self {
        let nvariables = calibration.nvariables();
        let nsimulations = calibration.nsimulations;
        let mut values = vec![0.0; nsimulations * nvariables];

        match calibration.algorithm {
            Algorithm::Sweep => {
                for candidate in 0..nsimulations {
                    // Mixed-radix decomposition of the candidate index, with
                    // variable 0 varying fastest.
                    let mut rest = candidate;
                    for (j, variable) in calibration.variables.iter().enumerate() {
                        let sweeps = variable.sweeps.unwrap_or(1);
                        let level = rest % sweeps;
                        rest /= sweeps;
                        let mut value = variable.minimum;
                        if sweeps > 1 {
                            value += level as f64 * (variable.maximum - variable.minimum)
                                / (sweeps - 1) as f64;
                        }
                        values[candidate * nvariables + j] = value;
                    }
                }
            }
            Algorithm::MonteCarlo => {
                let mut rng = ChaCha8Rng::seed_from_u64(MONTE_CARLO_SEED);
                for candidate in 0..nsimulations {
                    for (j, variable) in calibration.variables.iter().enumerate() {
                        // Uniform in [minimum, maximum); degenerate ranges
                        // collapse to the minimum.
                        values[candidate * nvariables + j] = variable.minimum
                            + rng.gen::<f64>() * (variable.maximum - variable.minimum);
                    }
                }
            }
            Algorithm::Genetic => {
                // Declared selector with no implementation: generates no
                // candidates, and the driver reports that explicitly.
                warn!("genetic algorithm selected: no candidates generated");
            }
        }

        info!(
            candidates = nsimulations,
            variables = nvariables,
            algorithm = ?calibration.algorithm,
            "parameter matrix generated"
        );
        Self { values, nvariables }
    }

    pub fn ncandidates(&self) -> usize {
        if self.nvariables == 0 {
            0
        } else {
            self.values.len() / self.nvariables
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The parameter vector of one candidate.
    pub fn row(&self, candidate: usize) -> &[f64] {
        let start = candidate * self.nvariables;
        &self.values[start..start + self.nvariables]
    }

    pub fn value(&self, candidate: usize, variable: usize) -> f64 {
        self.values[candidate * self.nvariables + variable]
    }

    #[cfg(test)]
    pub(crate) fn from_values(values: Vec<f64>, nvariables: usize) -> Self {
        Self { values, nvariables }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cal_types::{CFormat, Experiment, TemplateSlot, Variable};
    use std::sync::Arc;

    fn stub_experiment() -> Experiment {
        Experiment {
            data: "exp.dat".into(),
            templates: vec![TemplateSlot {
                path: "t.in".into(),
                content: Arc::from("@value1@"),
            }],
        }
    }

    fn variable(name: &str, minimum: f64, maximum: f64, sweeps: Option<usize>) -> Variable {
        Variable {
            name: name.into(),
            minimum,
            maximum,
            format: CFormat::default(),
            sweeps,
        }
    }

    fn calibration(
        algorithm: Algorithm,
        nsimulations: usize,
        variables: Vec<Variable>,
    ) -> Calibration {
        Calibration {
            simulator: "./sim".into(),
            evaluator: "./eval".into(),
            algorithm,
            nsimulations,
            iterations: 1,
            nbests: 1,
            experiments: vec![stub_experiment()],
            variables,
        }
    }

    #[test]
    fn sweep_visits_every_level_combination_once() {
        // sweeps [2, 3]: six candidates, variable 0 varying fastest.
        let cal = calibration(
            Algorithm::Sweep,
            6,
            vec![
                variable("a", 0.0, 1.0, Some(2)),
                variable("b", 0.0, 2.0, Some(3)),
            ],
        );
        let matrix = ParameterMatrix::generate(&cal);
        assert_eq!(matrix.ncandidates(), 6);

        let expected = [
            (0.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0),
            (0.0, 2.0),
            (1.0, 2.0),
        ];
        for (candidate, (a, b)) in expected.iter().enumerate() {
            assert_eq!(matrix.value(candidate, 0), *a, "candidate {candidate}");
            assert_eq!(matrix.value(candidate, 1), *b, "candidate {candidate}");
        }
    }

    #[test]
    fn sweep_single_level_pins_to_minimum() {
        let cal = calibration(Algorithm::Sweep, 1, vec![variable("a", 2.5, 9.0, Some(1))]);
        let matrix = ParameterMatrix::generate(&cal);
        assert_eq!(matrix.ncandidates(), 1);
        assert_eq!(matrix.value(0, 0), 2.5);
    }

    #[test]
    fn sweep_three_levels_spans_bounds() {
        let cal = calibration(Algorithm::Sweep, 3, vec![variable("a", 0.0, 10.0, Some(3))]);
        let matrix = ParameterMatrix::generate(&cal);
        let values: Vec<f64> = (0..3).map(|i| matrix.value(i, 0)).collect();
        assert_eq!(values, vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn monte_carlo_is_reproducible_and_bounded() {
        let cal = calibration(
            Algorithm::MonteCarlo,
            200,
            vec![
                variable("a", -1.0, 1.0, None),
                variable("b", 100.0, 200.0, None),
            ],
        );
        let first = ParameterMatrix::generate(&cal);
        let second = ParameterMatrix::generate(&cal);
        assert_eq!(first, second);

        for candidate in 0..200 {
            let a = first.value(candidate, 0);
            let b = first.value(candidate, 1);
            assert!((-1.0..1.0).contains(&a), "a out of bounds: {a}");
            assert!((100.0..200.0).contains(&b), "b out of bounds: {b}");
        }
    }

    #[test]
    fn genetic_generates_nothing() {
        let cal = calibration(Algorithm::Genetic, 0, vec![variable("a", 0.0, 1.0, None)]);
        let matrix = ParameterMatrix::generate(&cal);
        assert!(matrix.is_empty());
        assert_eq!(matrix.ncandidates(), 0);
    }
}
