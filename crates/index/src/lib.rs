//! Materialized-index descriptor (`spec.md §4.3`, component C3).


use ahash::AHasher;
use common::IndexKey;
use schema::{KeyPath, Schema, SchemaError};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use thiserror::Error;
use types::FieldId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("an index must have at least one hash field")]
    EmptyHashFields,
    #[error("field {0:?} appears in more than one of hash/order/extra")]
    FieldsNotDisjoint(FieldId),
    #[error("field {0:?} does not belong to any entity on the index's path")]
    FieldNotOnPath(FieldId),
    #[error("the path's last entity must contribute at least one field to hash or order")]
    LastEntityNotCovered,
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// A candidate materialized index: a partition key (`hash_fields`), an
/// intra-partition sort prefix (`order_fields`), and extra stored fields,
/// all anchored to a [`KeyPath`] (`spec.md §3`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Index {
    pub hash_fields: Vec<FieldId>,
    pub order_fields: Vec<FieldId>,
    pub extra_fields: Vec<FieldId>,
    pub path: KeyPath,
}

impl Index {
    pub fn new(
        schema: &Schema,
        hash_fields: Vec<FieldId>,
        order_fields: Vec<FieldId>,
        extra_fields: Vec<FieldId>,
        path: KeyPath,
    ) -> IndexResult<Self> {
        if hash_fields.is_empty() {
            return Err(IndexError::EmptyHashFields);
        }
        for &f in hash_fields.iter().chain(&order_fields).chain(&extra_fields) {
            if path.find_field_parent(schema, f)?.is_none() {
                return Err(IndexError::FieldNotOnPath(f));
            }
        }
        Self::check_disjoint(&hash_fields, &order_fields)?;
        Self::check_disjoint(&hash_fields, &extra_fields)?;
        Self::check_disjoint(&order_fields, &extra_fields)?;

        let last_entity = path.last_entity(schema)?;
        let covers_last_entity = hash_fields
            .iter()
            .chain(&order_fields)
            .any(|f| schema.field(*f).map(|field| field.entity) == Ok(last_entity));
        if !covers_last_entity {
            return Err(IndexError::LastEntityNotCovered);
        }

        Ok(Self {
            hash_fields,
            order_fields,
            extra_fields,
            path,
        })
    }

    fn check_disjoint(a: &[FieldId], b: &[FieldId]) -> IndexResult<()> {
        for f in a {
            if b.contains(f) {
                return Err(IndexError::FieldsNotDisjoint(*f));
            }
        }
        Ok(())
    }

    /// The identity-keyed per-entity materialization covering all scalar
    /// fields of `entity` (`spec.md §4.3`).
    pub fn simple_index(schema: &Schema, entity: types::EntityId) -> IndexResult<Self> {
        let e = schema.entity_by_id(entity)?;
        let identity = e
            .identity()
            .ok_or_else(|| IndexError::Schema(SchemaError::UnknownEntityId(entity)))?;
        let path = KeyPath::new(schema, identity, &[])?;
        let extra_fields = e
            .field_ids
            .iter()
            .copied()
            .filter(|&f| f != identity && !schema.field(f).map(|field| field.kind.is_foreign_key()).unwrap_or(false))
            .collect();
        Self::new(schema, vec![identity], Vec::new(), extra_fields, path)
    }

    pub fn all_fields(&self) -> Vec<FieldId> {
        let mut out = self.hash_fields.clone();
        out.extend(self.order_fields.iter().copied());
        out.extend(self.extra_fields.iter().copied());
        out
    }

    /// Stable key hashed from `(hash, order, extra, path)`; two structurally
    /// equal indexes hash to the same key regardless of construction order
    /// (`spec.md §3`).
    pub fn key(&self) -> IndexKey {
        let mut extra_sorted = self.extra_fields.clone();
        extra_sorted.sort_by_key(|f| f.0);

        let mut hasher = AHasher::default();
        self.hash_fields.hash(&mut hasher);
        self.order_fields.hash(&mut hasher);
        extra_sorted.hash(&mut hasher);
        self.path.hash(&mut hasher);
        IndexKey(hasher.finish())
    }

    /// Total rows materialized by this index: the product of entity counts
    /// along its path.
    fn total_rows(&self, schema: &Schema) -> IndexResult<u64> {
        Ok(self
            .path
            .entities(schema)?
            .iter()
            .map(|e| schema.entity_by_id(*e).map(|entity| entity.count))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .product())
    }

    /// Byte-size estimate: summed field sizes times the number of rows
    /// materialized along the path (`spec.md §3`).
    pub fn size(&self, schema: &Schema) -> IndexResult<f64> {
        let field_bytes: u32 = self
            .all_fields()
            .into_iter()
            .map(|f| schema.field(f).map(|field| field.kind.default_size_bytes()))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .sum();
        Ok(field_bytes as f64 * self.total_rows(schema)? as f64)
    }

    /// Average number of rows sharing one `hash_fields` value, used by cost
    /// models to price scans within a partition.
    pub fn entries_per_partition(&self, schema: &Schema) -> IndexResult<f64> {
        let total = self.total_rows(schema)? as f64;
        let mut hash_cardinality = 1.0;
        for &f in &self.hash_fields {
            let field = schema.field(f)?;
            let parent_count = schema.entity_by_id(field.entity)?.count;
            hash_cardinality *= field.effective_cardinality(parent_count) as f64;
        }
        if hash_cardinality <= 0.0 {
            return Ok(total);
        }
        Ok(total / hash_cardinality)
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Index {}
