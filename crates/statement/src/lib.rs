//! Parsed workload statements (`spec.md §4.2`, component C2).
//!
//! Parsing the textual statement language itself is an external concern
//! (left to the workload-file collaborator); this crate models the parsed
//! result: the [`KeyPath`] a statement traverses, its conditions,
//! projections, ordering/limit, and its workload-assigned frequency.


use common::{Mix, StatementId};
use index::Index;
use schema::{KeyPath, Schema, SchemaError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::FieldId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatementError {
    #[error("field {0:?} referenced by the statement does not belong to any entity on its path")]
    FieldNotOnPath(FieldId),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type StatementResult<T> = Result<T, StatementError>;

/// The four statement shapes a workload can contain (`spec.md §3`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    Query {
        select_fields: Vec<FieldId>,
        order_fields: Vec<FieldId>,
        limit: Option<u64>,
    },
    Update {
        set_fields: Vec<FieldId>,
    },
    Insert,
    Delete,
}

/// A single parsed statement: the path it traverses, its conditions, and
/// (for queries) its projection, ordering, and limit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,
    pub kind: StatementKind,
    pub path: KeyPath,
    /// Equality-condition fields.
    pub eq_fields: Vec<FieldId>,
    /// At most one range-condition field (`spec.md §3`).
    pub range_field: Option<FieldId>,
}

impl Statement {
    pub fn new_query(
        schema: &Schema,
        id: StatementId,
        path: KeyPath,
        eq_fields: Vec<FieldId>,
        range_field: Option<FieldId>,
        order_fields: Vec<FieldId>,
        limit: Option<u64>,
        select_fields: Vec<FieldId>,
    ) -> StatementResult<Self> {
        Self::build(
            schema,
            id,
            path,
            eq_fields,
            range_field,
            StatementKind::Query {
                select_fields,
                order_fields,
                limit,
            },
        )
    }

    pub fn new_update(
        schema: &Schema,
        id: StatementId,
        path: KeyPath,
        eq_fields: Vec<FieldId>,
        range_field: Option<FieldId>,
        set_fields: Vec<FieldId>,
    ) -> StatementResult<Self> {
        Self::build(
            schema,
            id,
            path,
            eq_fields,
            range_field,
            StatementKind::Update { set_fields },
        )
    }

    pub fn new_insert(schema: &Schema, id: StatementId, path: KeyPath) -> StatementResult<Self> {
        Self::build(schema, id, path, Vec::new(), None, StatementKind::Insert)
    }

    pub fn new_delete(
        schema: &Schema,
        id: StatementId,
        path: KeyPath,
        eq_fields: Vec<FieldId>,
    ) -> StatementResult<Self> {
        Self::build(schema, id, path, eq_fields, None, StatementKind::Delete)
    }

    fn build(
        schema: &Schema,
        id: StatementId,
        path: KeyPath,
        eq_fields: Vec<FieldId>,
        range_field: Option<FieldId>,
        kind: StatementKind,
    ) -> StatementResult<Self> {
        let statement = Statement {
            id,
            kind,
            path,
            eq_fields,
            range_field,
        };
        statement.validate(schema)?;
        Ok(statement)
    }

    fn validate(&self, schema: &Schema) -> StatementResult<()> {
        for field in self.all_fields() {
            if self.path.find_field_parent(schema, field)?.is_none() {
                return Err(StatementError::FieldNotOnPath(field));
            }
        }
        Ok(())
    }

    pub fn order_fields(&self) -> &[FieldId] {
        match &self.kind {
            StatementKind::Query { order_fields, .. } => order_fields,
            _ => &[],
        }
    }

    pub fn limit(&self) -> Option<u64> {
        match &self.kind {
            StatementKind::Query { limit, .. } => *limit,
            _ => None,
        }
    }

    pub fn select_fields(&self) -> &[FieldId] {
        match &self.kind {
            StatementKind::Query { select_fields, .. } => select_fields,
            _ => &[],
        }
    }

    pub fn set_fields(&self) -> &[FieldId] {
        match &self.kind {
            StatementKind::Update { set_fields } => set_fields,
            _ => &[],
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self.kind, StatementKind::Query { .. })
    }

    pub fn is_mutation(&self) -> bool {
        !self.is_query()
    }

    /// Every field the statement references in any role, deduplicated.
    pub fn all_fields(&self) -> Vec<FieldId> {
        let mut out = self.eq_fields.clone();
        out.extend(self.range_field);
        out.extend(self.order_fields().iter().copied());
        out.extend(self.select_fields().iter().copied());
        out.extend(self.set_fields().iter().copied());
        out.sort_by_key(|f| f.0);
        out.dedup();
        out
    }

    /// This statement's frequency within `mix`, scaled against a workload of
    /// `statement_count` total statements (`spec.md §3`, §9 Open Question 3).
    pub fn frequency(&self, mix: &Mix, statement_count: usize) -> f64 {
        mix.frequency(self.id, statement_count)
    }

    /// True iff this statement mutates a field that appears in `index`, or
    /// moves a row across `index`'s partitions (`spec.md §4.2`).
    ///
    /// Queries never modify anything. Updates modify `index` when any
    /// `set_fields` entry is one of `index`'s fields — partition-moving
    /// updates are a special case of this, since `hash_fields` is always a
    /// subset of `all_fields`. Inserts and deletes modify every index whose
    /// path includes the entity the statement targets, since they add or
    /// remove a row from every covering materialization.
    pub fn modifies_index(&self, schema: &Schema, index: &Index) -> StatementResult<bool> {
        match &self.kind {
            StatementKind::Query { .. } => Ok(false),
            StatementKind::Update { set_fields } => {
                let all = index.all_fields();
                Ok(set_fields.iter().any(|f| all.contains(f)))
            }
            StatementKind::Insert | StatementKind::Delete => {
                let target_entity = self.path.entities(schema)?[0];
                Ok(index.path.entities(schema)?.contains(&target_entity))
            }
        }
    }
}
