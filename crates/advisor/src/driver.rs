use crate::config::Config;
use crate::errors::AdvisorResult;
use crate::registry::{CostModelRegistry, SolverRegistry};
use crate::result::SearchResult;
use common::{Executor, Map, Mix};
use costplan::build_cost_matrix;
use schema::Schema;
use statement::Statement;

/// Orchestrates one run of the search (`spec.md §4.7`): enumerate `I*`
/// (C4), build the per-query cost matrix (C5), build and solve the integer
/// program (C6), assemble a `SearchResult`.
pub struct SearchDriver {
    config: Config,
    cost_models: CostModelRegistry,
    solvers: SolverRegistry,
}

impl SearchDriver {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cost_models: CostModelRegistry::new(),
            solvers: SolverRegistry::new(),
        }
    }

    pub fn run(&self, schema: &Schema, statements: &[Statement], mix: &Mix, executor: Executor) -> AdvisorResult<SearchResult> {
        let cost_model = self.cost_models.resolve(&self.config.cost_model)?;
        let mut solver = self.solvers.resolve(&self.config.solver)?;

        let (candidates, enumeration) = enumerator::enumerate(schema, statements, executor)?;
        log::info!(
            "enumerated {} candidate indexes ({} considered, {} duplicates collapsed, {} rejected)",
            candidates.len(),
            enumeration.candidates_considered,
            enumeration.duplicates_collapsed,
            enumeration.rejected_invariant_violations
        );

        let cost_matrix = build_cost_matrix(schema, statements, &candidates, cost_model.as_ref(), executor)?;

        let solution = ilp::solve(
            schema,
            &candidates,
            &cost_matrix,
            statements,
            mix,
            &self.config.solve_config(),
            solver.as_mut(),
        )?;
        log::info!(
            "solved: {} indexes materialized, objective={:.3}",
            solution.index_count, solution.objective_value
        );

        let chosen_indexes: Vec<index::Index> = candidates
            .iter()
            .filter(|idx| solution.chosen_indexes.contains(&idx.key()))
            .cloned()
            .collect();

        let mut statement_plans = Map::default();
        let mut total_cost = 0.0;
        for stmt in statements.iter().filter(|s| s.is_query()) {
            if let Some(&index_key) = solution.query_assignment.get(&stmt.id) {
                if let Some(qc) = cost_matrix.query_plans.get(&(stmt.id, index_key)) {
                    total_cost += stmt.frequency(mix, statements.len()) * qc.plan.cost;
                    statement_plans.insert(stmt.id, qc.plan.clone());
                }
            }
        }
        for stmt in statements.iter().filter(|s| !s.is_query()) {
            for idx in &chosen_indexes {
                if let Some(up) = cost_matrix.update_plans.get(&(stmt.id, idx.key())) {
                    total_cost += stmt.frequency(mix, statements.len()) * up.cost;
                }
            }
        }

        let mut total_size = 0.0;
        for idx in &chosen_indexes {
            total_size += idx.size(schema).unwrap_or(0.0);
        }

        Ok(SearchResult {
            chosen_indexes,
            statement_plans,
            total_size,
            total_cost,
            enumeration,
        })
    }
}
