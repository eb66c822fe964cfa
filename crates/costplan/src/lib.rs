//! Plan Enumerator & Cost (`spec.md §4.5`, component C5): for every
//! statement, finds each candidate index's minimum-cost completing plan and
//! prices its steps. Generalizes a `find_best_index`-style prefix-match
//! index scoring into "minimum-cost suffix assuming index *i* is the
//! terminal step".

#[cfg(test)]
mod tests;

use common::{Executor, IndexKey, Map, StatementId};
use index::{Index, IndexError};
use schema::{Schema, SchemaError};
use serde::{Deserialize, Serialize};
use statement::{Statement, StatementError, StatementKind};
use std::cmp::Ordering;
use thiserror::Error;
use types::FieldId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// `spec.md §4.5`: fatal, indicates `I*` construction missed a candidate.
    #[error("no valid plan exists for statement {0:?} over the candidate index set")]
    NoPlanFor(StatementId),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Statement(#[from] StatementError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type PlanResult<T> = Result<T, PlanError>;

/// The planner's running knowledge of the partition pinned so far, threaded
/// through every `CostModel` callback (`spec.md §4.5`).
#[derive(Clone, Debug, PartialEq)]
pub struct PlanState {
    pub eq_fields_resolved: Vec<FieldId>,
    pub range_field_resolved: Option<FieldId>,
    pub cardinality_so_far: f64,
}

impl PlanState {
    fn start() -> Self {
        Self {
            eq_fields_resolved: Vec::new(),
            range_field_resolved: None,
            cardinality_so_far: 1.0,
        }
    }
}

/// One step of a `Plan` (`spec.md §3`). `InsertStep`/`DeleteStep` only occur
/// in the mutation sub-plans built by `update_plan`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlanStep {
    IndexLookup(Index),
    Filter { fields: Vec<FieldId>, range: Option<FieldId> },
    Sort(Vec<FieldId>),
    Limit(u64),
    InsertStep(Index),
    DeleteStep(Index),
}

/// An ordered sequence of steps that together answer one statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub statement: StatementId,
    pub steps: Vec<PlanStep>,
    pub cost: f64,
}

/// `costs[q][i]` from `spec.md §4.5`: a query's plan over one candidate
/// index, plus the contribution of that plan's last step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryCost {
    pub plan: Plan,
    pub last_step_cost: f64,
}

/// A mutation's sub-plan against one affected index: an optional support
/// query fetching the rows to propagate, the `InsertStep`/`DeleteStep`s that
/// apply the mutation to `idx`, plus the combined cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlan {
    pub support_query: Option<Plan>,
    pub mutation_steps: Vec<PlanStep>,
    pub cost: f64,
}

/// Every `(statement, index)` pair with a valid plan, keyed for the ILP
/// builder (`spec.md §4.6`) to look up by `(StatementId, IndexKey)`.
#[derive(Clone, Debug, Default)]
pub struct CostMatrix {
    pub query_plans: Map<(StatementId, IndexKey), QueryCost>,
    pub update_plans: Map<(StatementId, IndexKey), UpdatePlan>,
}

/// Pluggable cost model (`spec.md §6`): prices each `PlanStep` kind plus the
/// cost of propagating one statement's mutation into one affected index.
pub trait CostModel: Send + Sync {
    fn index_lookup_cost(&self, index: &Index, state: &PlanState, schema: &Schema) -> f64;
    fn filter_cost(&self, fields: &[FieldId], range: Option<FieldId>, state: &PlanState) -> f64;
    fn sort_cost(&self, fields: &[FieldId], state: &PlanState) -> f64;
    fn limit_cost(&self, limit: u64, state: &PlanState) -> f64;
    fn update_cost(&self, index: &Index, statement: &Statement, schema: &Schema) -> f64;
}

/// Build the cost matrix for `statements` against the candidate set `I*`
/// (`spec.md §4.5`). Per-statement plan search reads only `schema` and one
/// `Statement`, so it fans out via `executor` with a sequential merge
/// (`spec.md §5`).
pub fn build_cost_matrix(
    schema: &Schema,
    statements: &[Statement],
    candidates: &[Index],
    cost_model: &dyn CostModel,
    executor: Executor,
) -> PlanResult<CostMatrix> {
    let per_statement = executor.map(statements, |stmt| build_for_statement(schema, stmt, candidates, cost_model));

    let mut matrix = CostMatrix::default();
    for (stmt, result) in statements.iter().zip(per_statement) {
        let (queries, updates) = result?;
        if stmt.is_query() && queries.is_empty() {
            log::warn!("no plan found for query {:?} over {} candidates", stmt.id, candidates.len());
            return Err(PlanError::NoPlanFor(stmt.id));
        }
        log::debug!(
            "statement {:?}: {} query plans, {} update plans",
            stmt.id,
            queries.len(),
            updates.len()
        );
        for (key, qc) in queries {
            matrix.query_plans.insert((stmt.id, key), qc);
        }
        for (key, up) in updates {
            matrix.update_plans.insert((stmt.id, key), up);
        }
    }
    log::info!(
        "cost matrix built: {} query-plan entries, {} update-plan entries",
        matrix.query_plans.len(),
        matrix.update_plans.len()
    );
    Ok(matrix)
}

type StatementPlans = (Vec<(IndexKey, QueryCost)>, Vec<(IndexKey, UpdatePlan)>);

fn build_for_statement(
    schema: &Schema,
    stmt: &Statement,
    candidates: &[Index],
    cost_model: &dyn CostModel,
) -> PlanResult<StatementPlans> {
    let mut queries = Vec::new();
    let mut updates = Vec::new();

    if stmt.is_query() {
        for idx in candidates {
            if let Some((plan, last_step_cost)) = plan_for_query(schema, stmt, idx, cost_model)? {
                queries.push((idx.key(), QueryCost { plan, last_step_cost }));
            }
        }
    } else {
        for idx in candidates {
            if stmt.modifies_index(schema, idx)? {
                updates.push((idx.key(), update_plan(schema, stmt, idx, cost_model)?));
            }
        }
    }

    Ok((queries, updates))
}

/// The single-step plan for `stmt` ending at `idx`, or `None` if `idx` can't
/// answer `stmt` at all (`spec.md §3` plan validity, rules i-iv).
fn plan_for_query(
    schema: &Schema,
    stmt: &Statement,
    idx: &Index,
    cost_model: &dyn CostModel,
) -> PlanResult<Option<(Plan, f64)>> {
    // (ii): a single-step plan's one lookup must itself cover the query's
    // full path; `I*` always contains a candidate spanning it (`spec.md
    // §4.4` step 1 always visits the full-path window).
    if idx.path != stmt.path {
        return Ok(None);
    }

    // (iii): projection must be answerable from the terminal index.
    let all_fields = idx.all_fields();
    if !stmt.select_fields().iter().all(|f| all_fields.contains(f)) {
        return Ok(None);
    }

    // (i): the lookup must pin every hash field from a literal equality
    // value. A statement with no equality conditions still gets a valid
    // full-scan plan over a simple index (`spec.md §4.5` edge cases).
    if !stmt.eq_fields.is_empty() && !idx.hash_fields.iter().all(|f| stmt.eq_fields.contains(f)) {
        return Ok(None);
    }

    let mut state = PlanState::start();
    state.eq_fields_resolved = idx
        .hash_fields
        .iter()
        .copied()
        .filter(|f| stmt.eq_fields.contains(f))
        .collect();

    let mut steps = vec![PlanStep::IndexLookup(idx.clone())];
    let mut cost = cost_model.index_lookup_cost(idx, &state, schema);
    let mut last_step_cost = cost;
    state.cardinality_so_far = idx.entries_per_partition(schema)?;

    let remaining_eq: Vec<FieldId> = stmt
        .eq_fields
        .iter()
        .copied()
        .filter(|f| !idx.hash_fields.contains(f))
        .collect();
    let eq_in_order: Vec<FieldId> = remaining_eq.iter().copied().filter(|f| idx.order_fields.contains(f)).collect();
    let eq_needing_filter: Vec<FieldId> = remaining_eq
        .iter()
        .copied()
        .filter(|f| !idx.order_fields.contains(f))
        .collect();

    // Range-only conditions must terminate the filter prefix: a range field
    // covered by the index's order key needs no separate step, otherwise it
    // is appended to the one Filter step below.
    let range_needing_filter = match stmt.range_field {
        Some(r) if !idx.order_fields.contains(&r) => Some(r),
        _ => None,
    };

    state.eq_fields_resolved.extend(eq_in_order.iter().copied());
    if stmt.range_field.is_some() && range_needing_filter.is_none() {
        state.range_field_resolved = stmt.range_field;
    }

    if !eq_needing_filter.is_empty() || range_needing_filter.is_some() {
        let fc = cost_model.filter_cost(&eq_needing_filter, range_needing_filter, &state);
        cost += fc;
        last_step_cost = fc;
        steps.push(PlanStep::Filter {
            fields: eq_needing_filter,
            range: range_needing_filter,
        });
        if range_needing_filter.is_some() {
            state.range_field_resolved = range_needing_filter;
        }
    }

    let order_needed = stmt.order_fields();
    if !order_needed.is_empty() && !order_satisfied_by_index(idx, &eq_in_order, order_needed) {
        let sc = cost_model.sort_cost(order_needed, &state);
        cost += sc;
        last_step_cost = sc;
        steps.push(PlanStep::Sort(order_needed.to_vec()));
    }

    // Limit without order is permitted: an arbitrary cutoff over whatever
    // the prior steps produced (`spec.md §4.5` edge cases).
    if let Some(limit) = stmt.limit() {
        let lc = cost_model.limit_cost(limit, &state);
        cost += lc;
        last_step_cost = lc;
        steps.push(PlanStep::Limit(limit));
    }

    Ok(Some((
        Plan {
            statement: stmt.id,
            steps,
            cost,
        },
        last_step_cost,
    )))
}

/// True iff `idx`'s order key, after skipping the leading equality-pinned
/// fields, already presents `order_needed` as an ordered prefix.
fn order_satisfied_by_index(idx: &Index, eq_in_order: &[FieldId], order_needed: &[FieldId]) -> bool {
    let remaining: Vec<FieldId> = idx.order_fields.iter().copied().filter(|f| !eq_in_order.contains(f)).collect();
    remaining.len() >= order_needed.len() && remaining[..order_needed.len()] == *order_needed
}

/// Build the support-query + mutation sub-plan for `stmt` against one index
/// it `modifies_index?` (`spec.md §4.5`). Inserts have nothing to fetch;
/// updates and deletes need the rows currently materialized in `idx`.
fn update_plan(schema: &Schema, stmt: &Statement, idx: &Index, cost_model: &dyn CostModel) -> PlanResult<UpdatePlan> {
    let support_query = match &stmt.kind {
        StatementKind::Insert => None,
        _ => {
            let probe = Statement::new_query(
                schema,
                stmt.id,
                stmt.path.clone(),
                stmt.eq_fields.clone(),
                stmt.range_field,
                Vec::new(),
                None,
                Vec::new(),
            )?;
            plan_for_query(schema, &probe, idx, cost_model)?.map(|(plan, _)| plan)
        }
    };
    // An update relocates the row within `idx` whenever it touches a hash
    // field, so it is modeled as a delete of the old entry followed by an
    // insert of the new one; a plain insert/delete only ever needs its own
    // step.
    let mutation_steps = match &stmt.kind {
        StatementKind::Insert => vec![PlanStep::InsertStep(idx.clone())],
        StatementKind::Delete => vec![PlanStep::DeleteStep(idx.clone())],
        StatementKind::Update { .. } => vec![PlanStep::DeleteStep(idx.clone()), PlanStep::InsertStep(idx.clone())],
        StatementKind::Query { .. } => unreachable!("update_plan is only called for mutation statements"),
    };

    let support_cost = support_query.as_ref().map(|p| p.cost).unwrap_or(0.0);
    let mutation_cost = cost_model.update_cost(idx, stmt, schema);
    Ok(UpdatePlan {
        support_query,
        mutation_steps,
        cost: support_cost + mutation_cost,
    })
}

/// The statement's cheapest plan, ties broken by plan length then
/// lexicographically by index key (`spec.md §4.5`).
pub fn best_plan(matrix: &CostMatrix, statement: StatementId) -> Option<(IndexKey, &QueryCost)> {
    matrix
        .query_plans
        .iter()
        .filter(|(k, _)| k.0 == statement)
        .min_by(|(ka, a), (kb, b)| {
            a.plan
                .cost
                .partial_cmp(&b.plan.cost)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.plan.steps.len().cmp(&b.plan.steps.len()))
                .then_with(|| ka.1.cmp(&kb.1))
        })
        .map(|(k, v)| (k.1, v))
}
