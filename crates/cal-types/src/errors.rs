use thiserror::Error;

/// Main error type for the Calibra system
#[derive(Error, Debug)]
pub enum CalError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while parsing and validating the configuration document.
/// All of these abort the run before any candidate is evaluated.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed configuration document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("No calibration experiments declared")]
    NoExperiments,

    #[error("No calibration variables declared")]
    NoVariables,

    #[error("Experiment {experiment} declares no input templates")]
    NoTemplates { experiment: usize },

    #[error("Experiment {experiment} declares {found} templates, expected {expected}")]
    TemplateCountMismatch {
        experiment: usize,
        expected: usize,
        found: usize,
    },

    #[error("Cannot read template file {path}: {source}")]
    TemplateUnreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("Cannot read experiment data file {path}: {source}")]
    DataUnreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("Sweep grid size overflows the candidate index range")]
    SweepTooLarge,

    #[error("Iterations count must be nonzero")]
    ZeroIterations,

    #[error("Bests count must be nonzero")]
    ZeroBests,

    #[error("Monte Carlo mode requires a nonzero simulations count")]
    MissingSimulations,

    #[error("Variable {variable}: sweep mode requires a nonzero sweeps count")]
    MissingSweeps { variable: String },

    #[error("Variable {variable}: minimum {minimum} exceeds maximum {maximum}")]
    InvalidRange {
        variable: String,
        minimum: f64,
        maximum: f64,
    },

    #[error("Variable {variable}: invalid format string {format:?}: {message}")]
    InvalidFormat {
        variable: String,
        format: String,
        message: String,
    },
}

/// Errors raised while evaluating one candidate against one experiment.
///
/// A nonzero child exit is deliberately not an error on its own: the result
/// file is read regardless, and only a missing or malformed result surfaces
/// here, carrying the child failure when one was observed.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Cannot write input file {path}: {source}")]
    InputWrite {
        path: String,
        source: std::io::Error,
    },

    #[error("Cannot spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with status {status:?} and no readable result file {path}")]
    ChildFailed {
        program: String,
        status: Option<i32>,
        path: String,
    },

    #[error("Result file {path} is missing or unreadable: {source}")]
    ResultMissing {
        path: String,
        source: std::io::Error,
    },

    #[error("Result file {path} is empty")]
    ResultEmpty { path: String },

    #[error("Result file {path} does not start with a number: {line:?}")]
    ResultMalformed { path: String, line: String },
}

/// Result type alias for Calibra operations
pub type CalResult<T> = Result<T, CalError>;
