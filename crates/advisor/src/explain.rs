use crate::result::SearchResult;
use costplan::{Plan, PlanStep};

/// Pretty-print a `SearchResult` for debugging — the "text form
/// (presentation-only)" of the Result file format (`spec.md §6`), in the
/// style of a query planner's `explain_logical`/`explain_physical` dump.
pub fn explain(result: &SearchResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "chosen indexes: {} total_size={:.1} total_cost={:.3}\n",
        result.chosen_indexes.len(),
        result.total_size,
        result.total_cost
    ));
    for idx in &result.chosen_indexes {
        out.push_str(&format!(
            "  index hash={:?} order={:?} extra={:?}\n",
            idx.hash_fields, idx.order_fields, idx.extra_fields
        ));
    }

    let mut statement_ids: Vec<_> = result.statement_plans.keys().copied().collect();
    statement_ids.sort();
    for stmt_id in statement_ids {
        let plan = &result.statement_plans[&stmt_id];
        out.push_str(&format!("statement {}:\n", stmt_id.0));
        out.push_str(&indent(&explain_plan(plan)));
        out.push('\n');
    }
    out
}

fn explain_plan(plan: &Plan) -> String {
    let steps: Vec<String> = plan.steps.iter().map(explain_step).collect();
    format!("cost={:.3}\n{}", plan.cost, steps.join("\n"))
}

fn explain_step(step: &PlanStep) -> String {
    match step {
        PlanStep::IndexLookup(idx) => format!("IndexLookup hash={:?} order={:?}", idx.hash_fields, idx.order_fields),
        PlanStep::Filter { fields, range } => format!("Filter fields={fields:?} range={range:?}"),
        PlanStep::Sort(fields) => format!("Sort {fields:?}"),
        PlanStep::Limit(n) => format!("Limit {n}"),
        PlanStep::InsertStep(idx) => format!("InsertStep into hash={:?}", idx.hash_fields),
        PlanStep::DeleteStep(idx) => format!("DeleteStep from hash={:?}", idx.hash_fields),
    }
}

fn indent(s: &str) -> String {
    s.lines().map(|l| format!("  {l}")).collect::<Vec<_>>().join("\n")
}
