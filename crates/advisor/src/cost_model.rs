use costplan::{CostModel, PlanState};
use index::Index;
use schema::Schema;
use statement::{Statement, StatementKind};
use types::FieldId;

/// Reference `CostModel` (`spec.md §6`: "an object supplying the six cost
/// functions in §4.5"). Prices steps off `Index::entries_per_partition` and
/// field byte widths rather than a fixed unit cost, so scenarios with
/// different entity counts and field widths produce genuinely different
/// plans — the in-workspace stand-in the `CostModelRegistry` resolves by
/// default, the same role `ilp::BruteForceSolver` plays for the solver
/// plugin contract.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleCostModel;

impl CostModel for SimpleCostModel {
    fn index_lookup_cost(&self, index: &Index, _state: &PlanState, schema: &Schema) -> f64 {
        index.entries_per_partition(schema).unwrap_or(1.0).max(1.0)
    }

    fn filter_cost(&self, fields: &[FieldId], range: Option<FieldId>, state: &PlanState) -> f64 {
        let predicate_count = fields.len() as f64 + if range.is_some() { 1.0 } else { 0.0 };
        state.cardinality_so_far.max(1.0) * predicate_count * 0.1
    }

    fn sort_cost(&self, fields: &[FieldId], state: &PlanState) -> f64 {
        if fields.is_empty() {
            return 0.0;
        }
        let n = state.cardinality_so_far.max(1.0);
        n * n.log2().max(1.0) * fields.len() as f64
    }

    fn limit_cost(&self, limit: u64, _state: &PlanState) -> f64 {
        (limit as f64).min(1.0)
    }

    fn update_cost(&self, index: &Index, statement: &Statement, schema: &Schema) -> f64 {
        let row_bytes: u32 = index
            .all_fields()
            .into_iter()
            .filter_map(|f| schema.field(f).ok().map(|field| field.kind.default_size_bytes()))
            .sum();
        let moves_partition = match &statement.kind {
            StatementKind::Update { set_fields } => set_fields.iter().any(|f| index.hash_fields.contains(f)),
            StatementKind::Insert | StatementKind::Delete => true,
            StatementKind::Query { .. } => false,
        };
        let base = row_bytes as f64;
        if moves_partition {
            base * 2.0
        } else {
            base
        }
    }
}
