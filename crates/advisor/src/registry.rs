use crate::cost_model::SimpleCostModel;
use crate::errors::{ConfigError, ConfigResult};
use common::Map;
use costplan::CostModel;
use ilp::{BruteForceSolver, Solver};

/// Maps a cost-model name to a constructor (`spec.md §9` Design Notes:
/// "replace dynamic class lookup... with explicit plugin registries mapping
/// a string name to a constructor"). Unknown name fails fast, never a
/// silent default.
pub struct CostModelRegistry {
    constructors: Map<&'static str, fn() -> Box<dyn CostModel>>,
}

impl CostModelRegistry {
    pub fn new() -> Self {
        let mut constructors: Map<&'static str, fn() -> Box<dyn CostModel>> = Map::default();
        constructors.insert("simple", || Box::new(SimpleCostModel));
        Self { constructors }
    }

    pub fn resolve(&self, name: &str) -> ConfigResult<Box<dyn CostModel>> {
        self.constructors
            .get(name)
            .map(|ctor| ctor())
            .ok_or_else(|| ConfigError::UnknownCostModel(name.to_string()))
    }
}

impl Default for CostModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a solver name to a constructor, the same registry shape as
/// `CostModelRegistry` for the other plugin seam `spec.md §6` names.
pub struct SolverRegistry {
    constructors: Map<&'static str, fn() -> Box<dyn Solver>>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        let mut constructors: Map<&'static str, fn() -> Box<dyn Solver>> = Map::default();
        constructors.insert("brute_force", || Box::new(BruteForceSolver::new()));
        Self { constructors }
    }

    pub fn resolve(&self, name: &str) -> ConfigResult<Box<dyn Solver>> {
        self.constructors
            .get(name)
            .map(|ctor| ctor())
            .ok_or_else(|| ConfigError::UnknownSolver(name.to_string()))
    }
}

impl Default for SolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
