//! Entities, fields, and the foreign-key graph (`spec.md §4.1`, component C1).
//!
//! A [`Schema`] is an arena of [`Entity`] and field records addressed by
//! stable integer handles (`types::EntityId` / `types::FieldId`), following
//! the same `Vec` + rebuild-on-mutation lookup-table pattern a SQL catalog
//! uses for tables. Foreign keys are declared forward-only
//! and linked to their reverse in a single resolution pass
//! ([`Schema::link_foreign_keys`]) once every entity and field exists, per
//! the "arena handles, no owning pointers on both sides" design note.


pub mod keypath;

pub use keypath::KeyPath;

use ahash::RandomState;
use common::Map;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::{Arity, EntityId, FieldId, FieldKind};

type IdxMap<K> = HashMap<K, usize, RandomState>;

/// Errors raised while building or traversing a [`Schema`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("entity '{0}' already exists")]
    DuplicateEntity(String),
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("unknown entity id {0:?}")]
    UnknownEntityId(EntityId),
    #[error("field '{0}' already exists on entity '{1}'")]
    DuplicateField(String, String),
    #[error("unknown field '{0}' on entity '{1}'")]
    UnknownField(String, String),
    #[error("unknown field id {0:?}")]
    UnknownFieldId(FieldId),
    #[error("entity '{0}' already has an identity field")]
    DuplicateIdentity(String),
    #[error("field '{0}' on '{1}' is not a foreign key")]
    NotAForeignKey(String, String),
    #[error("reverse field '{0}' on '{1}' does not point back to '{2}'")]
    ReverseMismatch(String, String, String),
    /// A `KeyPath` traversal stepped through a field that does not exist,
    /// is not a foreign key, or does not land on the expected entity.
    #[error("broken path: {0}")]
    BrokenPath(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// A single field belonging to an [`Entity`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub entity: EntityId,
    pub name: String,
    pub kind: FieldKind,
    /// Cardinality override. Defaults to the parent entity's `count` for a
    /// plain scalar field, or `1` when no such default applies
    /// (`spec.md §3`).
    pub cardinality: Option<u64>,
}

impl Field {
    pub fn effective_cardinality(&self, parent_count: u64) -> u64 {
        self.cardinality.unwrap_or(parent_count)
    }
}

/// A named node in the schema graph, owning an ordered set of fields and an
/// expected row count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub count: u64,
    pub field_ids: Vec<FieldId>,
    identity: Option<FieldId>,
}

impl Entity {
    pub fn identity(&self) -> Option<FieldId> {
        self.identity
    }
}

struct PendingReverse {
    field: FieldId,
    reverse_name: String,
}

/// Arena of entities and fields, plus the foreign-key graph between them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schema {
    entities: Vec<Entity>,
    fields: Vec<Field>,
    #[serde(skip)]
    #[serde(default)]
    entity_name_index: IdxMap<String>,
    #[serde(skip)]
    #[serde(default)]
    entity_id_index: IdxMap<EntityId>,
    #[serde(skip)]
    #[serde(default)]
    field_id_index: IdxMap<FieldId>,
    next_entity_id: u32,
    next_field_id: u32,
    #[serde(skip)]
    pending_reverses: Vec<PendingReverse>,
}

impl Schema {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            fields: Vec::new(),
            entity_name_index: IdxMap::default(),
            entity_id_index: IdxMap::default(),
            field_id_index: IdxMap::default(),
            next_entity_id: 0,
            next_field_id: 0,
            pending_reverses: Vec::new(),
        }
    }

    pub fn add_entity(&mut self, name: &str, count: u64) -> SchemaResult<EntityId> {
        if self.entity_name_index.contains_key(name) {
            return Err(SchemaError::DuplicateEntity(name.to_string()));
        }
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        let idx = self.entities.len();
        self.entities.push(Entity {
            id,
            name: name.to_string(),
            count,
            field_ids: Vec::new(),
            identity: None,
        });
        self.entity_name_index.insert(name.to_string(), idx);
        self.entity_id_index.insert(id, idx);
        Ok(id)
    }

    /// Add a plain (non-foreign-key) field.
    pub fn add_field(
        &mut self,
        entity: EntityId,
        name: &str,
        kind: FieldKind,
        cardinality: Option<u64>,
    ) -> SchemaResult<FieldId> {
        assert!(
            !kind.is_foreign_key(),
            "use add_foreign_key for ForeignKey fields"
        );
        self.insert_field(entity, name, kind, cardinality)
    }

    /// Add a forward-only foreign key field. `reverse_field_name` names the
    /// field on `target` that points back here; the actual `reverse` handle
    /// is left `None` until [`Schema::link_foreign_keys`] runs.
    pub fn add_foreign_key(
        &mut self,
        entity: EntityId,
        name: &str,
        target: EntityId,
        arity: Arity,
        reverse_field_name: &str,
    ) -> SchemaResult<FieldId> {
        let kind = FieldKind::ForeignKey {
            target,
            arity,
            reverse: None,
        };
        let id = self.insert_field(entity, name, kind, None)?;
        self.pending_reverses.push(PendingReverse {
            field: id,
            reverse_name: reverse_field_name.to_string(),
        });
        Ok(id)
    }

    fn insert_field(
        &mut self,
        entity: EntityId,
        name: &str,
        kind: FieldKind,
        cardinality: Option<u64>,
    ) -> SchemaResult<FieldId> {
        let entity_name = self.entity_by_id(entity)?.name.clone();
        {
            let e = self.entity_by_id(entity)?;
            for fid in &e.field_ids {
                if self.field(*fid)?.name == name {
                    return Err(SchemaError::DuplicateField(name.to_string(), entity_name));
                }
            }
        }
        let is_identity = kind.can_be_identity();
        let id = FieldId(self.next_field_id);
        self.next_field_id += 1;
        let idx = self.fields.len();
        self.fields.push(Field {
            id,
            entity,
            name: name.to_string(),
            kind,
            cardinality,
        });
        self.field_id_index.insert(id, idx);

        let entity_idx = *self
            .entity_id_index
            .get(&entity)
            .ok_or(SchemaError::UnknownEntityId(entity))?;
        let e = &mut self.entities[entity_idx];
        if is_identity {
            if e.identity.is_some() {
                return Err(SchemaError::DuplicateIdentity(e.name.clone()));
            }
            e.identity = Some(id);
        }
        e.field_ids.push(id);
        Ok(id)
    }

    /// Resolve every pending foreign key's reverse handle in one pass,
    /// setting both sides' `reverse` atomically.
    pub fn link_foreign_keys(&mut self) -> SchemaResult<()> {
        let pending = std::mem::take(&mut self.pending_reverses);
        for p in &pending {
            let fwd = self.field(p.field)?.clone();
            let (target, arity) = match &fwd.kind {
                FieldKind::ForeignKey { target, arity, .. } => (*target, *arity),
                _ => unreachable!("pending_reverses only ever holds ForeignKey fields"),
            };
            let target_entity = self.entity_by_id(target)?.clone();
            let mut rev_id = None;
            for fid in &target_entity.field_ids {
                if self.field(*fid)?.name == p.reverse_name {
                    rev_id = Some(*fid);
                    break;
                }
            }
            let rev_id = rev_id
                .ok_or_else(|| SchemaError::UnknownField(p.reverse_name.clone(), target_entity.name.clone()))?;
            let rev_field = self.field(rev_id)?.clone();
            let rev_target = match &rev_field.kind {
                FieldKind::ForeignKey { target, .. } => *target,
                _ => {
                    return Err(SchemaError::NotAForeignKey(
                        p.reverse_name.clone(),
                        target_entity.name.clone(),
                    ))
                }
            };
            let fwd_owner = self.entity_by_id(fwd.entity)?.name.clone();
            if rev_target != fwd.entity {
                return Err(SchemaError::ReverseMismatch(
                    p.reverse_name.clone(),
                    target_entity.name.clone(),
                    fwd_owner,
                ));
            }

            let fwd_idx = *self
                .field_id_index
                .get(&p.field)
                .ok_or(SchemaError::UnknownFieldId(p.field))?;
            self.fields[fwd_idx].kind = FieldKind::ForeignKey {
                target,
                arity,
                reverse: Some(rev_id),
            };
            let rev_idx = *self
                .field_id_index
                .get(&rev_id)
                .ok_or(SchemaError::UnknownFieldId(rev_id))?;
            let rev_arity = match &rev_field.kind {
                FieldKind::ForeignKey { arity, .. } => *arity,
                _ => unreachable!(),
            };
            self.fields[rev_idx].kind = FieldKind::ForeignKey {
                target: fwd.entity,
                arity: rev_arity,
                reverse: Some(p.field),
            };
        }
        Ok(())
    }

    pub fn entity(&self, name: &str) -> SchemaResult<&Entity> {
        let idx = self
            .entity_name_index
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))?;
        Ok(&self.entities[idx])
    }

    pub fn entity_by_id(&self, id: EntityId) -> SchemaResult<&Entity> {
        let idx = self
            .entity_id_index
            .get(&id)
            .copied()
            .ok_or(SchemaError::UnknownEntityId(id))?;
        Ok(&self.entities[idx])
    }

    pub fn field(&self, id: FieldId) -> SchemaResult<&Field> {
        let idx = self
            .field_id_index
            .get(&id)
            .copied()
            .ok_or(SchemaError::UnknownFieldId(id))?;
        Ok(&self.fields[idx])
    }

    pub fn field_by_name(&self, entity: EntityId, name: &str) -> SchemaResult<&Field> {
        let e = self.entity_by_id(entity)?;
        for fid in &e.field_ids {
            let f = self.field(*fid)?;
            if f.name == name {
                return Ok(f);
            }
        }
        Err(SchemaError::UnknownField(name.to_string(), e.name.clone()))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Foreign-key fields owned by `entity`.
    pub fn foreign_keys(&self, entity: EntityId) -> SchemaResult<Vec<&Field>> {
        let mut out = Vec::new();
        for fid in &self.entity_by_id(entity)?.field_ids {
            let f = self.field(*fid)?;
            if f.kind.is_foreign_key() {
                out.push(f);
            }
        }
        Ok(out)
    }

    /// Rebuild the lookup tables after deserializing a `Schema` — they are
    /// `#[serde(skip)]` since they're pure derived state.
    pub fn rehydrate(&mut self) {
        self.rebuild_indexes();
    }

    fn rebuild_indexes(&mut self) {
        self.entity_name_index.clear();
        self.entity_id_index.clear();
        self.field_id_index.clear();
        for (idx, e) in self.entities.iter().enumerate() {
            self.entity_name_index.insert(e.name.clone(), idx);
            self.entity_id_index.insert(e.id, idx);
        }
        for (idx, f) in self.fields.iter().enumerate() {
            self.field_id_index.insert(f.id, idx);
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}
