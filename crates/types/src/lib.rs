//! Scalar vocabulary shared by every layer of the advisor: the field-kind
//! tagged union from `spec.md §3`, plus the byte-size estimates used for
//! index sizing.

use serde::{Deserialize, Serialize};

/// Identifier for an entity (table-like node) in a schema graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Identifier for a field owned by some entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(pub u32);

/// Cardinality of a foreign-key edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    One,
    Many,
}

/// The tagged variant over field kinds from `spec.md §3`.
///
/// `ForeignKey` carries the target entity, the edge's arity, and a handle to
/// the reverse field on the target entity. The reverse handle starts `None`
/// and is filled in by a one-shot resolution pass once both ends of the edge
/// exist (see `schema::Schema::link_foreign_keys`), never by an owning
/// pointer on both sides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Int,
    Float,
    String(u32),
    Date,
    Hash,
    IdKey,
    ForeignKey {
        target: EntityId,
        arity: Arity,
        reverse: Option<FieldId>,
    },
}

impl FieldKind {
    /// Byte-size estimate used by `index::Index::size`.
    pub fn default_size_bytes(&self) -> u32 {
        match self {
            FieldKind::Int => 8,
            FieldKind::Float => 8,
            FieldKind::String(len) => *len,
            FieldKind::Date => 8,
            FieldKind::Hash => 16,
            FieldKind::IdKey => 8,
            FieldKind::ForeignKey { .. } => 8,
        }
    }

    /// True for the one kind that can serve as an entity's identity key.
    pub fn can_be_identity(&self) -> bool {
        matches!(self, FieldKind::IdKey)
    }

    pub fn is_foreign_key(&self) -> bool {
        matches!(self, FieldKind::ForeignKey { .. })
    }
}
