use super::*;
use common::{Executor, Mix, StatementId};
use pretty_assertions::assert_eq;
use schema::{KeyPath, Schema};
use statement::Statement;
use types::FieldKind;

fn users_schema() -> (Schema, types::FieldId, types::FieldId) {
    let mut schema = Schema::new();
    let users = schema.add_entity("users", 1_000).unwrap();
    let id = schema.add_field(users, "id", FieldKind::IdKey, None).unwrap();
    let name = schema.add_field(users, "name", FieldKind::String(32), None).unwrap();
    (schema, id, name)
}

#[test]
fn config_defaults_match_the_spec() {
    let config = Config::default();
    assert_eq!(config.objective, ilp::Objective::Cost);
    assert_eq!(config.space_budget, None);
    assert_eq!(config.cost_model, "simple");
    assert_eq!(config.solver, "brute_force");
    assert!(config.refine_second_stage);
    assert_eq!(config.second_stage_pin_epsilon, 1e-6);
}

#[test]
fn unknown_cost_model_fails_fast() {
    let registry = CostModelRegistry::new();
    let err = registry.resolve("made_up").unwrap_err();
    assert_eq!(err, ConfigError::UnknownCostModel("made_up".to_string()));
}

#[test]
fn unknown_solver_fails_fast() {
    let registry = SolverRegistry::new();
    let err = registry.resolve("made_up").unwrap_err();
    assert_eq!(err, ConfigError::UnknownSolver("made_up".to_string()));
}

#[test]
fn single_entity_read_picks_one_covering_index() {
    let _ = env_logger::try_init();
    let (schema, id, name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_query(&schema, StatementId(0), path, vec![id], None, vec![], None, vec![name]).unwrap();
    let mix = Mix::uniform("default");

    let driver = SearchDriver::new(Config::default());
    let result = driver.run(&schema, &[stmt.clone()], &mix, Executor::Sequential).unwrap();

    assert_eq!(result.chosen_indexes.len(), 1);
    let idx = &result.chosen_indexes[0];
    assert_eq!(idx.hash_fields, vec![id]);
    assert!(idx.extra_fields.contains(&name));
    assert!(result.statement_plans.contains_key(&stmt.id));
}

#[test]
fn explain_mentions_every_chosen_index_and_statement() {
    let (schema, id, name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_query(&schema, StatementId(0), path, vec![id], None, vec![], None, vec![name]).unwrap();
    let mix = Mix::uniform("default");

    let driver = SearchDriver::new(Config::default());
    let result = driver.run(&schema, &[stmt.clone()], &mix, Executor::Sequential).unwrap();

    let rendered = explain(&result);
    assert!(rendered.contains("chosen indexes: 1"));
    assert!(rendered.contains("statement 0:"));
}

#[test]
fn result_round_trips_through_json() {
    let (schema, id, name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_query(&schema, StatementId(0), path, vec![id], None, vec![], None, vec![name]).unwrap();
    let mix = Mix::uniform("default");

    let driver = SearchDriver::new(Config::default());
    let result = driver.run(&schema, &[stmt], &mix, Executor::Sequential).unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let round_tripped: SearchResult = serde_json::from_str(&json).unwrap();
    assert_eq!(result, round_tripped);
}

#[test]
fn zero_budget_surfaces_as_solver_infeasible() {
    let (schema, id, name) = users_schema();
    let path = KeyPath::new(&schema, id, &[]).unwrap();
    let stmt = Statement::new_query(&schema, StatementId(0), path, vec![id], None, vec![], None, vec![name]).unwrap();
    let mix = Mix::uniform("default");

    let config = Config::builder().space_budget(0.0).build();
    let driver = SearchDriver::new(config);
    let err = driver.run(&schema, &[stmt], &mix, Executor::Sequential).unwrap_err();
    assert!(matches!(err, AdvisorError::Solver(ilp::SolverError::Infeasible { .. })));
}
