//! Canonical traversal through the entity graph, anchored at an identity
//! field (`spec.md §3`, "KeyPath").

use crate::{Schema, SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use types::{EntityId, FieldId, FieldKind};

/// A non-empty ordered sequence of "reaching fields": element 0 is the
/// identity field of the path's starting entity; element `i >= 1` is a
/// foreign key traversable from the entity reached at element `i - 1`.
///
/// Comparable and hashable by value (two paths through the same fields in
/// the same order are the same `KeyPath`), and reversible via
/// [`KeyPath::reverse`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPath {
    elements: Vec<FieldId>,
}

impl KeyPath {
    /// Construct a path starting at `start_identity` and following each
    /// field in `traversal` in order. Every traversal field must be a
    /// foreign key owned by the entity reached so far.
    pub fn new(schema: &Schema, start_identity: FieldId, traversal: &[FieldId]) -> SchemaResult<Self> {
        let start = schema.field(start_identity)?;
        if !start.kind.can_be_identity() {
            return Err(SchemaError::BrokenPath(format!(
                "field {start_identity:?} is not an identity key"
            )));
        }
        let mut elements = vec![start_identity];
        let mut current_entity = start.entity;
        for &fk in traversal {
            let field = schema.field(fk)?;
            if field.entity != current_entity {
                return Err(SchemaError::BrokenPath(format!(
                    "field {fk:?} does not belong to the entity reached so far"
                )));
            }
            match field.kind {
                FieldKind::ForeignKey { target, .. } => {
                    elements.push(fk);
                    current_entity = target;
                }
                _ => {
                    return Err(SchemaError::BrokenPath(format!(
                        "field {fk:?} is not a foreign key"
                    )))
                }
            }
        }
        Ok(Self { elements })
    }

    /// Build a path from already-validated elements, bypassing the
    /// identity/foreign-key checks in [`KeyPath::new`]. Used for the
    /// contiguous sub-paths `enumerator` derives from a statement's full
    /// path (`spec.md §4.4`), which may start at an interior entity.
    pub(crate) fn from_elements_unchecked(elements: Vec<FieldId>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[FieldId] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The entity occupying each position of the path.
    pub fn entities(&self, schema: &Schema) -> SchemaResult<Vec<EntityId>> {
        let mut out = Vec::with_capacity(self.elements.len());
        out.push(schema.field(self.elements[0])?.entity);
        for &fk in &self.elements[1..] {
            match schema.field(fk)?.kind {
                FieldKind::ForeignKey { target, .. } => out.push(target),
                _ => {
                    return Err(SchemaError::BrokenPath(format!(
                        "field {fk:?} is not a foreign key"
                    )))
                }
            }
        }
        Ok(out)
    }

    pub fn last_entity(&self, schema: &Schema) -> SchemaResult<EntityId> {
        Ok(*self.entities(schema)?.last().expect("path is non-empty"))
    }

    /// The path position whose entity owns `field`, if any.
    pub fn find_field_parent(&self, schema: &Schema, field: FieldId) -> SchemaResult<Option<usize>> {
        let owner = schema.field(field)?.entity;
        Ok(self.entities(schema)?.into_iter().position(|e| e == owner))
    }

    /// Every non-empty contiguous sub-path of `self`, including `self`.
    pub fn contiguous_subpaths(&self) -> Vec<KeyPath> {
        let n = self.elements.len();
        let mut out = Vec::with_capacity(n * (n + 1) / 2);
        for i in 0..n {
            for j in i..n {
                out.push(KeyPath::from_elements_unchecked(
                    self.elements[i..=j].to_vec(),
                ));
            }
        }
        out
    }

    /// The same traversal walked backward, following each foreign key's
    /// linked reverse field (`spec.md §3`: "KeyPaths are... reversible").
    pub fn reverse(&self, schema: &Schema) -> SchemaResult<KeyPath> {
        let last_entity = self.last_entity(schema)?;
        let new_start = schema
            .entity_by_id(last_entity)?
            .identity()
            .ok_or_else(|| SchemaError::BrokenPath(format!("{last_entity:?} has no identity field")))?;
        let mut elements = vec![new_start];
        for &fk in self.elements[1..].iter().rev() {
            match schema.field(fk)?.kind {
                FieldKind::ForeignKey {
                    reverse: Some(rev), ..
                } => elements.push(rev),
                FieldKind::ForeignKey { reverse: None, .. } => {
                    return Err(SchemaError::BrokenPath(format!(
                        "field {fk:?} has no linked reverse; call Schema::link_foreign_keys first"
                    )))
                }
                _ => unreachable!("path elements past index 0 are always foreign keys"),
            }
        }
        Ok(KeyPath { elements })
    }
}
