//! ILP Problem builder (`spec.md §4.6`, component C6): turns the candidate
//! index set and cost matrix into an integer program, drives an external
//! `Solver` through it, and performs the lexicographic second-stage
//! refinement.


use common::{IndexKey, Map, Mix, StatementId};
use costplan::CostMatrix;
use index::Index;
use schema::Schema;
use statement::Statement;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("problem is infeasible; irreducible infeasible subset: {iis:?}")]
    Infeasible { iis: Vec<String> },
    #[error("no solver plugin available")]
    Unavailable,
}

pub type SolverResult<T> = Result<T, SolverError>;

/// Opaque handle to a variable registered with a `Solver`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// Constraint relational operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rel {
    Le,
    Ge,
    Eq,
}

/// A linear combination of variables plus a constant, the unit both
/// constraints and objectives are expressed in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, var: VarId, coeff: f64) -> Self {
        self.terms.push((var, coeff));
        self
    }

    pub fn constant(mut self, value: f64) -> Self {
        self.constant += value;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
}

/// The external MIP solver contract (`spec.md §6`).
pub trait Solver {
    fn new_model(&mut self);
    fn add_binary_var(&mut self, name: &str) -> VarId;
    fn add_continuous_var(&mut self, lo: f64, hi: f64, name: &str) -> VarId;
    fn add_constraint(&mut self, expr: LinExpr, rel: Rel, rhs: f64);
    fn set_objective(&mut self, var: VarId, sense: Sense);
    fn optimize(&mut self) -> SolveStatus;
    fn value(&self, var: VarId) -> f64;
    fn compute_iis(&self) -> Vec<String>;
    fn write(&self, path: &str) -> std::io::Result<()>;
}

/// Which of the three `§4.6` objective expressions pins `Z`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Objective {
    #[default]
    Cost,
    Space,
    Indexes,
}

/// Knobs the search driver supplies to `solve`, independent of the
/// schema/workload/candidate data itself.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveConfig {
    pub objective: Objective,
    pub space_budget: Option<f64>,
    pub refine_second_stage: bool,
    pub second_stage_pin_epsilon: f64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            objective: Objective::default(),
            space_budget: None,
            refine_second_stage: true,
            second_stage_pin_epsilon: 1e-6,
        }
    }
}

/// A solved problem: which indexes are materialized, which index answers
/// each query, and the pinned objective value.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub chosen_indexes: Vec<IndexKey>,
    pub query_assignment: Map<StatementId, IndexKey>,
    pub objective_value: f64,
    pub index_count: usize,
}

/// Build and solve the `§4.6` integer program over `candidates` using
/// `cost_matrix` (from C5) and `statements`' frequencies under `mix`.
pub fn solve(
    schema: &Schema,
    candidates: &[Index],
    cost_matrix: &CostMatrix,
    statements: &[Statement],
    mix: &Mix,
    config: &SolveConfig,
    solver: &mut dyn Solver,
) -> SolverResult<Solution> {
    solver.new_model();

    let mut x_vars: Map<IndexKey, VarId> = Map::default();
    for idx in candidates {
        let var = solver.add_binary_var(&format!("x_{}", idx.key().0));
        x_vars.insert(idx.key(), var);
    }

    let queries: Vec<&Statement> = statements.iter().filter(|s| s.is_query()).collect();
    let mut y_vars: Map<(StatementId, IndexKey), VarId> = Map::default();
    for (stmt_id, index_key) in cost_matrix.query_plans.keys() {
        let var = solver.add_binary_var(&format!("y_{}_{}", stmt_id.0, index_key.0));
        y_vars.insert((*stmt_id, *index_key), var);
    }

    // IndexPresence: y_{q,i} <= x_i.
    for (&(_, index_key), &y) in &y_vars {
        let x = x_vars[&index_key];
        solver.add_constraint(LinExpr::new().term(y, 1.0).term(x, -1.0), Rel::Le, 0.0);
    }

    // CompletePlan: every query has at least one terminal index chosen.
    for stmt in &queries {
        let mut expr = LinExpr::new();
        let mut reachable = false;
        for (&(s, index_key), &y) in &y_vars {
            if s == stmt.id {
                expr = expr.term(y, 1.0);
                reachable = true;
            }
        }
        if !reachable {
            // `costplan::build_cost_matrix` already turns this into a fatal
            // `PlanError::NoPlanFor` before C6 ever runs; reaching here would
            // mean the caller skipped that check.
            log::warn!("query {:?} has no candidate index in the cost matrix", stmt.id);
        }
        solver.add_constraint(expr, Rel::Ge, 1.0);
    }

    // Space: sum_i size(i) * x_i <= budget.
    if let Some(budget) = config.space_budget {
        let mut expr = LinExpr::new();
        for idx in candidates {
            let size = idx.size(schema).map_err(|_| SolverError::Unavailable)?;
            expr = expr.term(x_vars[&idx.key()], size);
        }
        solver.add_constraint(expr, Rel::Le, budget);
    }

    let statement_count = statements.len();
    let z = solver.add_continuous_var(0.0, f64::INFINITY, "z");
    let objective_expr = build_objective_expr(config.objective, candidates, cost_matrix, statements, mix, statement_count, &x_vars, &y_vars, schema)?;
    solver.add_constraint(
        LinExpr::new().term(z, 1.0).constant(-objective_expr.constant).terms_extend(&objective_expr.terms, -1.0),
        Rel::Eq,
        0.0,
    );
    solver.set_objective(z, Sense::Minimize);

    let status = solver.optimize();
    if status == SolveStatus::Infeasible {
        let iis = solver.compute_iis();
        log::warn!("problem infeasible; iis: {:?}", iis);
        return Err(SolverError::Infeasible { iis });
    }

    let stage_one = read_solution(candidates, &x_vars, &y_vars, solver, solver.value(z));

    if config.objective == Objective::Indexes || !config.refine_second_stage {
        return Ok(stage_one);
    }

    let z_star = solver.value(z);
    let eps = config.second_stage_pin_epsilon;
    solver.add_constraint(LinExpr::new().term(z, 1.0), Rel::Le, z_star + eps);
    solver.add_constraint(LinExpr::new().term(z, 1.0), Rel::Ge, z_star - eps);

    let z_count = solver.add_continuous_var(0.0, candidates.len() as f64, "z_count");
    let mut count_expr = LinExpr::new();
    for idx in candidates {
        count_expr = count_expr.term(x_vars[&idx.key()], 1.0);
    }
    solver.add_constraint(LinExpr::new().term(z_count, 1.0).terms_extend(&count_expr.terms, -1.0), Rel::Eq, 0.0);
    solver.set_objective(z_count, Sense::Minimize);

    match solver.optimize() {
        SolveStatus::Optimal => Ok(read_solution(candidates, &x_vars, &y_vars, solver, z_star)),
        SolveStatus::Infeasible => {
            // `spec.md §7`: the only local recovery — pinning `Z = Z*` under
            // floating-point solver noise can spuriously fail; fall back to
            // the unrefined stage-one solution rather than propagate.
            log::warn!("second-stage index-count refinement was infeasible; keeping the stage-one solution");
            Ok(stage_one)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_objective_expr(
    objective: Objective,
    candidates: &[Index],
    cost_matrix: &CostMatrix,
    statements: &[Statement],
    mix: &Mix,
    statement_count: usize,
    x_vars: &Map<IndexKey, VarId>,
    y_vars: &Map<(StatementId, IndexKey), VarId>,
    schema: &Schema,
) -> SolverResult<LinExpr> {
    let mut expr = LinExpr::new();
    match objective {
        Objective::Cost => {
            for ((stmt_id, index_key), qc) in &cost_matrix.query_plans {
                let stmt = statements.iter().find(|s| s.id == *stmt_id);
                let freq = stmt.map(|s| s.frequency(mix, statement_count)).unwrap_or(0.0);
                if let Some(&y) = y_vars.get(&(*stmt_id, *index_key)) {
                    expr = expr.term(y, freq * qc.plan.cost);
                }
            }
            for ((stmt_id, index_key), up) in &cost_matrix.update_plans {
                let stmt = statements.iter().find(|s| s.id == *stmt_id);
                let freq = stmt.map(|s| s.frequency(mix, statement_count)).unwrap_or(0.0);
                if let Some(&x) = x_vars.get(index_key) {
                    expr = expr.term(x, freq * up.cost);
                }
            }
        }
        Objective::Space => {
            for idx in candidates {
                let size = idx.size(schema).map_err(|_| SolverError::Unavailable)?;
                expr = expr.term(x_vars[&idx.key()], size);
            }
        }
        Objective::Indexes => {
            for idx in candidates {
                expr = expr.term(x_vars[&idx.key()], 1.0);
            }
        }
    }
    Ok(expr)
}

fn read_solution(
    candidates: &[Index],
    x_vars: &Map<IndexKey, VarId>,
    y_vars: &Map<(StatementId, IndexKey), VarId>,
    solver: &dyn Solver,
    objective_value: f64,
) -> Solution {
    let chosen_indexes: Vec<IndexKey> = candidates
        .iter()
        .map(|idx| idx.key())
        .filter(|key| solver.value(x_vars[key]) > 0.5)
        .collect();

    let mut query_assignment: Map<StatementId, IndexKey> = Map::default();
    for (&(stmt_id, index_key), &y) in y_vars {
        if solver.value(y) > 0.5 {
            query_assignment.insert(stmt_id, index_key);
        }
    }

    Solution {
        index_count: chosen_indexes.len(),
        chosen_indexes,
        query_assignment,
        objective_value,
    }
}

impl LinExpr {
    fn terms_extend(mut self, other: &[(VarId, f64)], scale: f64) -> Self {
        for &(var, coeff) in other {
            self.terms.push((var, coeff * scale));
        }
        self
    }
}

mod brute_force;
pub use brute_force::BruteForceSolver;
