use super::*;
use pretty_assertions::assert_eq;
use schema::KeyPath;
use types::{Arity, FieldKind};

struct UnitCostModel;

impl CostModel for UnitCostModel {
    fn index_lookup_cost(&self, _index: &Index, _state: &PlanState, _schema: &Schema) -> f64 {
        1.0
    }
    fn filter_cost(&self, fields: &[FieldId], range: Option<FieldId>, _state: &PlanState) -> f64 {
        fields.len() as f64 * 0.5 + if range.is_some() { 0.5 } else { 0.0 }
    }
    fn sort_cost(&self, fields: &[FieldId], state: &PlanState) -> f64 {
        state.cardinality_so_far * fields.len() as f64 * 0.1
    }
    fn limit_cost(&self, _limit: u64, _state: &PlanState) -> f64 {
        0.1
    }
    fn update_cost(&self, _index: &Index, _statement: &Statement, _schema: &Schema) -> f64 {
        2.0
    }
}

fn users_schema() -> (Schema, FieldId, FieldId) {
    let mut schema = Schema::new();
    let users = schema.add_entity("users", 1_000).unwrap();
    let id = schema.add_field(users, "id", FieldKind::IdKey, None).unwrap();
    let name = schema.add_field(users, "name", FieldKind::String(32), None).unwrap();
    (schema, id, name)
}

#[test]
fn single_entity_read_costs_just_the_lookup() {
    let (schema, id, name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_query(&schema, StatementId(0), path, vec![id], None, vec![], None, vec![name]).unwrap();
    let idx = Index::simple_index(&schema, schema.field(id).unwrap().entity).unwrap();

    let matrix = build_cost_matrix(&schema, &[stmt.clone()], &[idx.clone()], &UnitCostModel, Executor::Sequential).unwrap();
    let qc = matrix.query_plans.get(&(stmt.id, idx.key())).unwrap();
    assert_eq!(qc.plan.steps.len(), 1);
    assert!(matches!(qc.plan.steps[0], PlanStep::IndexLookup(_)));
    assert_eq!(qc.plan.cost, 1.0);
    assert_eq!(qc.last_step_cost, 1.0);
}

#[test]
fn join_with_order_and_limit_needs_no_sort_step() {
    let mut schema = Schema::new();
    let users = schema.add_entity("users", 10).unwrap();
    schema.add_field(users, "id", FieldKind::IdKey, None).unwrap();
    let user_name = schema.add_field(users, "name", FieldKind::String(32), None).unwrap();

    let posts = schema.add_entity("posts", 100).unwrap();
    let post_id = schema.add_field(posts, "id", FieldKind::IdKey, None).unwrap();
    let ts = schema.add_field(posts, "ts", FieldKind::Date, None).unwrap();
    let body = schema.add_field(posts, "body", FieldKind::String(256), None).unwrap();
    schema.add_foreign_key(posts, "author", users, Arity::One, "posts").unwrap();
    let user_to_posts = schema.add_foreign_key(users, "posts", posts, Arity::Many, "author").unwrap();
    schema.link_foreign_keys().unwrap();

    let user_id = schema.entity_by_id(users).unwrap().identity().unwrap();
    let path = KeyPath::new(&schema, user_id, &[user_to_posts]).unwrap();
    let stmt = Statement::new_query(
        &schema,
        StatementId(0),
        path.clone(),
        vec![user_name],
        None,
        vec![ts, post_id],
        Some(10),
        vec![body],
    )
    .unwrap();
    let idx = Index::new(&schema, vec![user_name], vec![ts, post_id], vec![body], path).unwrap();

    let matrix = build_cost_matrix(&schema, &[stmt.clone()], &[idx.clone()], &UnitCostModel, Executor::Sequential).unwrap();
    let qc = matrix.query_plans.get(&(stmt.id, idx.key())).unwrap();

    assert_eq!(qc.plan.steps.len(), 2);
    assert!(matches!(qc.plan.steps[0], PlanStep::IndexLookup(_)));
    assert!(matches!(qc.plan.steps[1], PlanStep::Limit(10)));
    assert_eq!(qc.plan.cost, 1.1);
}

#[test]
fn update_support_query_fetches_the_mutated_row() {
    let (schema, id, name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_update(&schema, StatementId(1), path, vec![id], None, vec![name]).unwrap();
    let idx = Index::simple_index(&schema, schema.field(id).unwrap().entity).unwrap();

    let matrix = build_cost_matrix(&schema, &[stmt.clone()], &[idx.clone()], &UnitCostModel, Executor::Sequential).unwrap();
    let up = matrix.update_plans.get(&(stmt.id, idx.key())).unwrap();
    let support = up.support_query.as_ref().expect("update needs a support query");
    assert_eq!(support.steps.len(), 1);
    assert_eq!(up.cost, 1.0 + 2.0);
    assert_eq!(up.mutation_steps, vec![PlanStep::DeleteStep(idx.clone()), PlanStep::InsertStep(idx.clone())]);
}

#[test]
fn insert_plan_appends_a_single_insert_step_with_no_support_query() {
    let (schema, id, _name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_insert(&schema, StatementId(2), path).unwrap();
    let idx = Index::simple_index(&schema, schema.field(id).unwrap().entity).unwrap();

    let matrix = build_cost_matrix(&schema, &[stmt.clone()], &[idx.clone()], &UnitCostModel, Executor::Sequential).unwrap();
    let up = matrix.update_plans.get(&(stmt.id, idx.key())).unwrap();
    assert!(up.support_query.is_none());
    assert_eq!(up.mutation_steps, vec![PlanStep::InsertStep(idx.clone())]);
    assert_eq!(up.cost, 2.0);
}

#[test]
fn delete_plan_appends_a_single_delete_step() {
    let (schema, id, _name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_delete(&schema, StatementId(3), path, vec![id]).unwrap();
    let idx = Index::simple_index(&schema, schema.field(id).unwrap().entity).unwrap();

    let matrix = build_cost_matrix(&schema, &[stmt.clone()], &[idx.clone()], &UnitCostModel, Executor::Sequential).unwrap();
    let up = matrix.update_plans.get(&(stmt.id, idx.key())).unwrap();
    assert!(up.support_query.is_some());
    assert_eq!(up.mutation_steps, vec![PlanStep::DeleteStep(idx.clone())]);
}

#[test]
fn insert_has_no_support_query() {
    let (schema, id, _name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_insert(&schema, StatementId(2), path).unwrap();
    let idx = Index::simple_index(&schema, schema.field(id).unwrap().entity).unwrap();

    let matrix = build_cost_matrix(&schema, &[stmt.clone()], &[idx.clone()], &UnitCostModel, Executor::Sequential).unwrap();
    let up = matrix.update_plans.get(&(stmt.id, idx.key())).unwrap();
    assert!(up.support_query.is_none());
    assert_eq!(up.cost, 2.0);
}

#[test]
fn query_with_no_valid_candidate_is_fatal() {
    let (schema, id, _name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_query(&schema, StatementId(3), path, vec![id], None, vec![], None, vec![]).unwrap();

    let err = build_cost_matrix(&schema, &[stmt.clone()], &[], &UnitCostModel, Executor::Sequential).unwrap_err();
    assert_eq!(err, PlanError::NoPlanFor(stmt.id));
}

#[test]
fn best_plan_prefers_fewer_steps_on_a_cost_tie() {
    let (schema, id, name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let idx = Index::simple_index(&schema, schema.field(id).unwrap().entity).unwrap();

    let short_plan = Plan {
        statement: StatementId(0),
        steps: vec![PlanStep::IndexLookup(idx.clone())],
        cost: 1.0,
    };
    let long_plan = Plan {
        statement: StatementId(0),
        steps: vec![PlanStep::IndexLookup(idx.clone()), PlanStep::Filter { fields: vec![name], range: None }],
        cost: 1.0,
    };

    let mut matrix = CostMatrix::default();
    matrix.query_plans.insert(
        (StatementId(0), IndexKey(1)),
        QueryCost { plan: long_plan, last_step_cost: 0.0 },
    );
    matrix.query_plans.insert(
        (StatementId(0), idx.key()),
        QueryCost { plan: short_plan, last_step_cost: 1.0 },
    );

    let (winner_key, winner) = best_plan(&matrix, StatementId(0)).unwrap();
    assert_eq!(winner_key, idx.key());
    assert_eq!(winner.plan.steps.len(), 1);
}

mod tie_break_determinism {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn build_matrix(idx: &Index, entries: &[(u64, f64, usize)]) -> CostMatrix {
        let mut matrix = CostMatrix::default();
        for (key, cost, steps_len) in entries {
            let mut steps = vec![PlanStep::IndexLookup(idx.clone())];
            for _ in 1..*steps_len {
                steps.push(PlanStep::Limit(1));
            }
            matrix.query_plans.insert(
                (StatementId(0), IndexKey(*key)),
                QueryCost {
                    plan: Plan { statement: StatementId(0), steps, cost: *cost },
                    last_step_cost: *cost,
                },
            );
        }
        matrix
    }

    proptest! {
        #[test]
        fn best_plan_is_independent_of_cost_matrix_insertion_order(
            mut entries in prop::collection::vec((1u64..1000, 0.1f64..100.0, 1usize..5), 2..8)
        ) {
            let mut seen_keys = HashSet::new();
            entries.retain(|(k, _, _)| seen_keys.insert(*k));
            prop_assume!(entries.len() >= 2);

            let (schema, id, _name) = users_schema();
            let idx = Index::simple_index(&schema, schema.field(id).unwrap().entity).unwrap();

            let forward = build_matrix(&idx, &entries);
            let mut reversed = entries.clone();
            reversed.reverse();
            let backward = build_matrix(&idx, &reversed);

            let forward_winner = best_plan(&forward, StatementId(0)).map(|(k, _)| k);
            let backward_winner = best_plan(&backward, StatementId(0)).map(|(k, _)| k);
            prop_assert_eq!(forward_winner, backward_winner);
        }
    }
}
