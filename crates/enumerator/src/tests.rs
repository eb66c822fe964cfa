use super::*;
use common::StatementId;
use pretty_assertions::assert_eq;
use schema::KeyPath;
use types::FieldKind;

fn users_posts() -> (Schema, types::EntityId, types::EntityId, FieldId, FieldId, FieldId, FieldId) {
    let mut schema = Schema::new();
    let users = schema.add_entity("users", 1_000).unwrap();
    let user_id = schema.add_field(users, "id", FieldKind::IdKey, None).unwrap();
    let name = schema
        .add_field(users, "name", FieldKind::String(32), None)
        .unwrap();
    let posts = schema.add_entity("posts", 50_000).unwrap();
    let post_id = schema.add_field(posts, "id", FieldKind::IdKey, None).unwrap();
    let ts = schema.add_field(posts, "ts", FieldKind::Date, None).unwrap();
    (schema, users, posts, user_id, name, post_id, ts)
}

#[test]
fn single_entity_read_produces_the_simple_index() {
    let (schema, _users, _posts, user_id, name, _post_id, _ts) = users_posts();
    let path = KeyPath::new(&schema, user_id, &[]).unwrap();
    let stmt = Statement::new_query(&schema, StatementId(0), path, vec![user_id], None, vec![], None, vec![name])
        .unwrap();

    let (indexes, report) = enumerate(&schema, &[stmt], Executor::Sequential).unwrap();
    assert_eq!(report.duplicates_collapsed, 1); // subset candidate == simple_index
    assert!(indexes.iter().any(|idx| idx.hash_fields == vec![user_id]
        && idx.order_fields.is_empty()
        && idx.extra_fields == vec![name]));
}

#[test]
fn join_with_order_and_limit_produces_a_covering_index() {
    use types::Arity;

    let mut schema = Schema::new();
    let users = schema.add_entity("users", 10).unwrap();
    schema.add_field(users, "id", FieldKind::IdKey, None).unwrap();
    let user_name = schema
        .add_field(users, "name", FieldKind::String(32), None)
        .unwrap();

    let posts = schema.add_entity("posts", 100).unwrap();
    let post_id = schema.add_field(posts, "id", FieldKind::IdKey, None).unwrap();
    let ts = schema.add_field(posts, "ts", FieldKind::Date, None).unwrap();
    let body = schema
        .add_field(posts, "body", FieldKind::String(256), None)
        .unwrap();
    schema
        .add_foreign_key(posts, "author", users, Arity::One, "posts")
        .unwrap();
    let user_to_posts = schema
        .add_foreign_key(users, "posts", posts, Arity::Many, "author")
        .unwrap();
    schema.link_foreign_keys().unwrap();

    // The statement's path starts at the entity bearing the equality
    // condition (`User.name`) and navigates to the entity being projected.
    let user_id = schema.entity_by_id(users).unwrap().identity().unwrap();
    let path = KeyPath::new(&schema, user_id, &[user_to_posts]).unwrap();
    let stmt = Statement::new_query(
        &schema,
        StatementId(0),
        path,
        vec![user_name],
        None,
        vec![ts, post_id],
        Some(10),
        vec![body],
    )
    .unwrap();

    let (indexes, _report) = enumerate(&schema, &[stmt], Executor::Sequential).unwrap();
    assert!(indexes.iter().any(|idx| {
        idx.hash_fields == vec![user_name]
            && idx.order_fields == vec![ts, post_id]
            && idx.extra_fields == vec![body]
    }));
}

#[test]
fn every_enumerated_index_keeps_extra_disjoint_from_hash_and_order() {
    let (schema, _users, _posts, _user_id, _name, post_id, ts) = users_posts();
    let path = KeyPath::new(&schema, post_id, &[]).unwrap();
    let stmt = Statement::new_query(&schema, StatementId(0), path, vec![post_id], Some(ts), vec![], None, vec![ts])
        .unwrap();

    let (indexes, _report) = enumerate(&schema, &[stmt], Executor::Sequential).unwrap();
    assert!(!indexes.is_empty());
    for idx in &indexes {
        for f in &idx.extra_fields {
            assert!(!idx.hash_fields.contains(f));
            assert!(!idx.order_fields.contains(f));
        }
    }
}

#[test]
fn sequential_and_rayon_executors_agree_on_the_candidate_set() {
    let (schema, _users, _posts, user_id, name, _post_id, _ts) = users_posts();
    let path = KeyPath::new(&schema, user_id, &[]).unwrap();
    let stmt = Statement::new_query(&schema, StatementId(0), path, vec![user_id], None, vec![], None, vec![name])
        .unwrap();

    let (mut seq, _) = enumerate(&schema, &[stmt.clone()], Executor::Sequential).unwrap();
    let (mut par, _) = enumerate(&schema, &[stmt], Executor::Rayon).unwrap();
    seq.sort_by_key(|i| i.key());
    par.sort_by_key(|i| i.key());
    assert_eq!(seq.len(), par.len());
    for (a, b) in seq.iter().zip(par.iter()) {
        assert_eq!(a.key(), b.key());
    }
}
