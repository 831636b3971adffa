//! Configuration document and validated calibration descriptors.
//!
//! The configuration is a JSON document naming the simulator and evaluator
//! programs, the algorithm, the experiments (reference data plus input
//! templates), and the variables to calibrate. Parsing produces a raw
//! [`ConfigDocument`]; validation turns it into a [`Calibration`] with every
//! template loaded into shared immutable text, so nothing touches the
//! filesystem again until candidates are evaluated.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::errors::ConfigError;
use crate::format::CFormat;

/// Which parameter-space generation algorithm a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Uniform random sampling with a fixed seed (the default).
    MonteCarlo,
    /// Exhaustive enumeration of the per-variable level grid.
    Sweep,
    /// Declared selector value; generates no candidates yet.
    Genetic,
}

/// Raw configuration document, exactly as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDocument {
    pub simulator: String,
    pub evaluator: String,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub simulations: Option<usize>,
    #[serde(default)]
    pub iterations: Option<usize>,
    #[serde(default)]
    pub bests: Option<usize>,
    #[serde(default)]
    pub experiments: Vec<ExperimentDocument>,
    #[serde(default)]
    pub variables: Vec<VariableDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentDocument {
    pub data: PathBuf,
    #[serde(default)]
    pub templates: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableDocument {
    pub name: String,
    pub minimum: f64,
    pub maximum: f64,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub sweeps: Option<usize>,
}

/// One calibration variable: a template placeholder key, its bounds, its
/// textual rendering, and (sweep mode only) its discrete level count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub minimum: f64,
    pub maximum: f64,
    pub format: CFormat,
    pub sweeps: Option<usize>,
}

/// One input template, loaded once and shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct TemplateSlot {
    pub path: PathBuf,
    pub content: Arc<str>,
}

/// One experiment: a reference data file and its ordered input templates.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub data: PathBuf,
    pub templates: Vec<TemplateSlot>,
}

/// A fully validated calibration run description.
///
/// Built once during setup and read-only for the rest of the run.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub simulator: String,
    pub evaluator: String,
    pub algorithm: Algorithm,
    /// Total candidate count: the configured count in Monte Carlo mode, the
    /// sweep grid product in Sweep mode, zero in Genetic mode.
    pub nsimulations: usize,
    pub iterations: usize,
    pub nbests: usize,
    pub experiments: Vec<Experiment>,
    pub variables: Vec<Variable>,
}

impl Calibration {
    /// Read, parse, and validate a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let document: ConfigDocument = serde_json::from_str(&text)?;
        Self::from_document(document)
    }

    /// Validate a parsed document and load every referenced template.
    pub fn from_document(document: ConfigDocument) -> Result<Self, ConfigError> {
        let algorithm = match document.algorithm.as_deref() {
            None => Algorithm::MonteCarlo,
            Some("sweep") => Algorithm::Sweep,
            Some(_) => Algorithm::Genetic,
        };

        let iterations = document.iterations.unwrap_or(1);
        if iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        let nbests = document.bests.unwrap_or(1);
        if nbests == 0 {
            return Err(ConfigError::ZeroBests);
        }

        if document.experiments.is_empty() {
            return Err(ConfigError::NoExperiments);
        }
        // The first experiment fixes the input slot count for the whole run.
        let ninputs = document.experiments[0].templates.len();
        if ninputs == 0 {
            return Err(ConfigError::NoTemplates { experiment: 1 });
        }
        let mut experiments = Vec::with_capacity(document.experiments.len());
        for (index, experiment) in document.experiments.iter().enumerate() {
            if experiment.templates.len() != ninputs {
                return Err(ConfigError::TemplateCountMismatch {
                    experiment: index + 1,
                    expected: ninputs,
                    found: experiment.templates.len(),
                });
            }
            fs::metadata(&experiment.data).map_err(|source| ConfigError::DataUnreadable {
                path: experiment.data.display().to_string(),
                source,
            })?;
            let mut templates = Vec::with_capacity(ninputs);
            for path in &experiment.templates {
                let content =
                    fs::read_to_string(path).map_err(|source| ConfigError::TemplateUnreadable {
                        path: path.display().to_string(),
                        source,
                    })?;
                templates.push(TemplateSlot {
                    path: path.clone(),
                    content: Arc::from(content.as_str()),
                });
            }
            experiments.push(Experiment {
                data: experiment.data.clone(),
                templates,
            });
        }

        if document.variables.is_empty() {
            return Err(ConfigError::NoVariables);
        }
        let mut variables = Vec::with_capacity(document.variables.len());
        for variable in &document.variables {
            if variable.minimum > variable.maximum {
                return Err(ConfigError::InvalidRange {
                    variable: variable.name.clone(),
                    minimum: variable.minimum,
                    maximum: variable.maximum,
                });
            }
            let format = match &variable.format {
                Some(raw) => CFormat::parse(raw).map_err(|message| ConfigError::InvalidFormat {
                    variable: variable.name.clone(),
                    format: raw.clone(),
                    message,
                })?,
                None => CFormat::default(),
            };
            let sweeps = match (algorithm, variable.sweeps) {
                (Algorithm::Sweep, Some(count)) if count > 0 => Some(count),
                (Algorithm::Sweep, _) => {
                    return Err(ConfigError::MissingSweeps {
                        variable: variable.name.clone(),
                    })
                }
                (_, declared) => declared,
            };
            variables.push(Variable {
                name: variable.name.clone(),
                minimum: variable.minimum,
                maximum: variable.maximum,
                format,
                sweeps,
            });
        }

        let nsimulations = match algorithm {
            Algorithm::MonteCarlo => match document.simulations {
                Some(count) if count > 0 => count,
                _ => return Err(ConfigError::MissingSimulations),
            },
            Algorithm::Sweep => variables
                .iter()
                .try_fold(1usize, |total, variable| {
                    total.checked_mul(variable.sweeps.unwrap_or(1))
                })
                .ok_or(ConfigError::SweepTooLarge)?,
            Algorithm::Genetic => 0,
        };

        debug!(
            ?algorithm,
            nsimulations,
            nexperiments = experiments.len(),
            nvariables = variables.len(),
            ninputs,
            "configuration validated"
        );

        Ok(Self {
            simulator: document.simulator,
            evaluator: document.evaluator,
            algorithm,
            nsimulations,
            iterations,
            nbests,
            experiments,
            variables,
        })
    }

    pub fn nvariables(&self) -> usize {
        self.variables.len()
    }

    pub fn nexperiments(&self) -> usize {
        self.experiments.len()
    }

    /// Input slots per experiment, fixed by the first experiment.
    pub fn ninputs(&self) -> usize {
        self.experiments[0].templates.len()
    }
}
