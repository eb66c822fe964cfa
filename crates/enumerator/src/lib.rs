//! Index Enumerator (`spec.md §4.4`, component C4): produces the finite
//! candidate index set `I*` guaranteed to contain every index any valid plan
//! could use.

#[cfg(test)]
mod tests;

use common::{Executor, IndexKey, Map, StatementId};
use index::{Index, IndexError};
use schema::{KeyPath, Schema, SchemaError};
use statement::Statement;
use thiserror::Error;
use types::FieldId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnumeratorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type EnumeratorResult<T> = Result<T, EnumeratorError>;

/// Diagnostics from one enumeration run, surfaced by the search driver
/// alongside `I*` for observability.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnumerationReport {
    /// Candidate indexes produced before cross-statement deduplication.
    pub candidates_considered: usize,
    /// Candidates that violated an `Index` invariant (disjointness, path
    /// coverage, last-entity coverage) and were discarded.
    pub rejected_invariant_violations: usize,
    /// Candidates collapsed into an existing entry by equal `Index.key`.
    pub duplicates_collapsed: usize,
    /// Candidate count contributed by each statement, before dedup.
    pub per_statement: Map<StatementId, usize>,
}

/// Enumerate the candidate index set for `statements` against `schema`.
///
/// Building `I*` is a pure fold over the workload (`spec.md §5`): per-
/// statement candidate generation reads only `schema` and one `Statement`,
/// so it fans out via `executor` with a final sequential dedup pass.
pub fn enumerate(
    schema: &Schema,
    statements: &[Statement],
    executor: Executor,
) -> EnumeratorResult<(Vec<Index>, EnumerationReport)> {
    let per_statement = executor.map(statements, |s| candidates_for_statement(schema, s));

    let mut report = EnumerationReport::default();
    let mut all = Vec::new();
    for (stmt, result) in statements.iter().zip(per_statement) {
        let (candidates, rejected) = result?;
        report.candidates_considered += candidates.len();
        report.rejected_invariant_violations += rejected;
        report.per_statement.insert(stmt.id, candidates.len());
        all.extend(candidates);
    }

    let mut deduped: Map<IndexKey, Index> = Map::default();
    for idx in all {
        let key = idx.key();
        if deduped.contains_key(&key) {
            report.duplicates_collapsed += 1;
        } else {
            deduped.insert(key, idx);
        }
    }
    Ok((deduped.into_values().collect(), report))
}

/// `(candidates, rejected-by-invariant count)` for one statement. Each of
/// its path's contiguous sub-paths is visited exactly once, so no separate
/// `(statement, sub-path)` memo table is needed beyond this loop
/// (`spec.md §4.4`: "implementations must memoize by (statement, sub-path)").
fn candidates_for_statement(schema: &Schema, stmt: &Statement) -> EnumeratorResult<(Vec<Index>, usize)> {
    let mut out = Vec::new();
    let mut rejected = 0usize;

    for sub in stmt.path.contiguous_subpaths() {
        candidates_for_subpath(schema, stmt, &sub, &mut out, &mut rejected)?;
    }

    for entity in stmt.path.entities(schema)? {
        out.push(Index::simple_index(schema, entity)?);
    }

    Ok((out, rejected))
}

fn candidates_for_subpath(
    schema: &Schema,
    stmt: &Statement,
    sub: &KeyPath,
    out: &mut Vec<Index>,
    rejected: &mut usize,
) -> EnumeratorResult<()> {
    let sub_entities = sub.entities(schema)?;
    let first_entity = sub_entities[0];

    let eq_on_sub = fields_on_subpath(schema, sub, &stmt.eq_fields)?;
    let order_on_sub = fields_on_subpath(schema, sub, stmt.order_fields())?;
    let range_on_sub = match stmt.range_field {
        Some(f) if sub.find_field_parent(schema, f)?.is_some() => Some(f),
        _ => None,
    };
    let all_on_sub = fields_on_subpath(schema, sub, &stmt.all_fields())?;

    let mut first_entity_eq = Vec::new();
    for &f in &eq_on_sub {
        if schema.field(f)?.entity == first_entity {
            first_entity_eq.push(f);
        }
    }
    if first_entity_eq.is_empty() {
        // No subset of this sub-path's equality fields can anchor the
        // partition in its first entity; the graph-locality rule in
        // `spec.md §4.4` step 2 rules out every hash candidate here.
        return Ok(());
    }

    for subset in non_empty_subsets(&eq_on_sub) {
        if !subset.iter().any(|f| first_entity_eq.contains(f)) {
            continue;
        }
        let remaining_eq: Vec<FieldId> = eq_on_sub
            .iter()
            .copied()
            .filter(|f| !subset.contains(f))
            .collect();

        let mut order_candidate = remaining_eq;
        order_candidate.extend(order_on_sub.iter().copied());
        if let Some(r) = range_on_sub {
            if !order_candidate.contains(&r) {
                order_candidate.push(r);
            }
        }

        let extra: Vec<FieldId> = all_on_sub
            .iter()
            .copied()
            .filter(|f| !subset.contains(f) && !order_candidate.contains(f))
            .collect();

        match Index::new(schema, subset, order_candidate, extra, sub.clone()) {
            Ok(idx) => out.push(idx),
            Err(_) => *rejected += 1,
        }
    }

    Ok(())
}

fn fields_on_subpath(schema: &Schema, sub: &KeyPath, fields: &[FieldId]) -> EnumeratorResult<Vec<FieldId>> {
    let mut out = Vec::new();
    for &f in fields {
        if sub.find_field_parent(schema, f)?.is_some() {
            out.push(f);
        }
    }
    Ok(out)
}

/// Every non-empty subset of `items`, preserving relative order.
fn non_empty_subsets(items: &[FieldId]) -> Vec<Vec<FieldId>> {
    let n = items.len();
    if n == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity((1usize << n) - 1);
    for mask in 1..(1u32 << n) {
        let mut subset = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if mask & (1 << i) != 0 {
                subset.push(*item);
            }
        }
        out.push(subset);
    }
    out
}
