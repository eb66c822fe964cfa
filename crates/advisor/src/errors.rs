use thiserror::Error;

/// Registry lookups fail fast on an unknown plugin name (`spec.md §9`
/// Design Notes: "replace dynamic class lookup... with explicit plugin
/// registries... unknown name fails fast"). Surfaced at driver
/// construction only (`spec.md §7`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown cost model {0:?}")]
    UnknownCostModel(String),
    #[error("unknown solver {0:?}")]
    UnknownSolver(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level error the search driver returns, aggregating every failure
/// mode a run of C4 through C7 can produce (`spec.md §7`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisorError {
    #[error(transparent)]
    Enumerator(#[from] enumerator::EnumeratorError),
    #[error(transparent)]
    Plan(#[from] costplan::PlanError),
    #[error(transparent)]
    Solver(#[from] ilp::SolverError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type AdvisorResult<T> = Result<T, AdvisorError>;
