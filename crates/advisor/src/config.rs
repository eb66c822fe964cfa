use ilp::Objective;
use serde::{Deserialize, Serialize};

/// Knobs the search driver needs beyond the schema/workload themselves
/// (`spec.md §6`, `§4.6`). Parsing these out of a workload file on disk is
/// the CLI collaborator's job; this crate only defines the struct and its
/// defaults.
///
/// ```
/// use advisor::Config;
///
/// let config = Config::builder()
///     .cost_model("simple")
///     .solver("brute_force")
///     .space_budget(4096.0)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Which of the three `§4.6` expressions pins the ILP objective.
    #[builder(default = Objective::Cost)]
    pub objective: Objective,
    /// Upper bound on `Σ size(i) · x_i`, in the same units `Index::size`
    /// reports. `None` leaves the Space constraint out of the model.
    pub space_budget: Option<f64>,
    /// Name resolved through the cost-model registry.
    #[builder(default = "simple".to_string())]
    pub cost_model: String,
    /// Name resolved through the solver registry.
    #[builder(default = "brute_force".to_string())]
    pub solver: String,
    /// Disables the `§4.6` lexicographic index-count refinement pass.
    #[builder(default = true)]
    pub refine_second_stage: bool,
    /// Resolves `§9` Open Question 1 by loosening the `Z = Z*` pin by this
    /// tolerance rather than pinning to an exact equality.
    #[builder(default = 1e-6)]
    pub second_stage_pin_epsilon: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            objective: Objective::Cost,
            space_budget: None,
            cost_model: "simple".to_string(),
            solver: "brute_force".to_string(),
            refine_second_stage: true,
            second_stage_pin_epsilon: 1e-6,
        }
    }
}

impl Config {
    pub(crate) fn solve_config(&self) -> ilp::SolveConfig {
        ilp::SolveConfig {
            objective: self.objective,
            space_budget: self.space_budget,
            refine_second_stage: self.refine_second_stage,
            second_stage_pin_epsilon: self.second_stage_pin_epsilon,
        }
    }
}
