use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{Relation, Snapshot};
use crate::error::{StorageError, StorageResult};
use crate::models::{apply_update, now, Entity, EntityKind};

/// Backend-agnostic persistence contract.
///
/// Implementors provide the raw primitives; creation, update and deletion
/// semantics (validation, foreign key checks, timestamps) are provided here so
/// both backends behave the same way for callers. Every method fails with
/// [`StorageError::Closed`] once [`Storage::shutdown`] has run.
pub trait Storage: Send + Sync {
    fn all(&self, kind: EntityKind) -> StorageResult<HashMap<String, Entity>>;

    /// Missing ids yield `Ok(None)`.
    fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>>;

    /// Count for one kind, or the grand total when `kind` is `None`.
    fn count(&self, kind: Option<EntityKind>) -> StorageResult<usize>;

    /// Stores an entity as is. No reference checks; [`Storage::create`] is
    /// the checked path.
    fn insert(&self, entity: &Entity) -> StorageResult<()>;

    /// Stores a stamped entity after [`check_new`] passes. The check and the
    /// write happen under one lock or transaction.
    fn insert_new(&self, entity: &Entity) -> StorageResult<()>;

    /// Loads a record, applies `change` and writes it back as one step;
    /// concurrent writers to the same record are serialized. Yields
    /// `Ok(None)` for a missing record. When `change` fails nothing is
    /// written.
    fn modify(
        &self,
        kind: EntityKind,
        id: &str,
        change: &mut dyn FnMut(&mut Entity) -> StorageResult<()>,
    ) -> StorageResult<Option<Entity>>;

    /// Removes a record and everything depending on it. Returns whether the
    /// record existed.
    fn remove(&self, kind: EntityKind, id: &str) -> StorageResult<bool>;

    /// Raw children of `parent_id` along `relation`.
    fn children(&self, relation: Relation, parent_id: &str) -> StorageResult<Vec<Entity>>;

    /// Raw amenity ids linked to a place; may name amenities that are gone.
    fn linked_amenity_ids(&self, place_id: &str) -> StorageResult<Vec<String>>;

    /// Raw place ids linked to an amenity; may name places that are gone.
    fn linked_place_ids(&self, amenity_id: &str) -> StorageResult<Vec<String>>;

    /// Returns `false` when the pair was already linked.
    fn insert_link(&self, place_id: &str, amenity_id: &str) -> StorageResult<bool>;

    /// Returns `false` when there was no link to remove.
    fn remove_link(&self, place_id: &str, amenity_id: &str) -> StorageResult<bool>;

    /// Groups subsequent reads into one consistent view where the backend
    /// supports it. The view ends when the guard drops.
    fn snapshot(&self) -> StorageResult<Snapshot<'_>>;

    /// Makes pending mutations durable. A no-op when nothing is pending.
    fn persist(&self) -> StorageResult<()>;

    /// Releases backend resources. Repeated calls are no-ops.
    fn shutdown(&self) -> StorageResult<()>;

    fn exists(&self, kind: EntityKind, id: &str) -> StorageResult<bool> {
        Ok(self.get(kind, id)?.is_some())
    }

    /// Validates, assigns identity and timestamps, and registers the entity
    /// once its foreign keys resolve. Returns the stored record.
    fn create(&self, mut entity: Entity) -> StorageResult<Entity> {
        entity.validate()?;
        entity.stamp_new(now());
        self.insert_new(&entity)?;
        log::debug!("created {} {}", entity.kind(), entity.id());
        Ok(entity)
    }

    /// Whitelisted field update; stamps `updated_at`.
    fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &Map<String, Value>,
    ) -> StorageResult<Entity> {
        self.modify(kind, id, &mut |entity: &mut Entity| {
            apply_update(entity, patch)?;
            entity.touch(now());
            Ok(())
        })?
        .ok_or_else(|| StorageError::not_found(kind, id))
    }

    /// Stamps `updated_at` without changing any field.
    fn touch(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>> {
        self.modify(kind, id, &mut |entity: &mut Entity| {
            entity.touch(now());
            Ok(())
        })
    }

    /// Idempotent: deleting an absent entity is a no-op.
    fn delete(&self, entity: &Entity) -> StorageResult<()> {
        if self.remove(entity.kind(), entity.id())? {
            log::debug!("deleted {} {}", entity.kind(), entity.id());
        }
        Ok(())
    }
}

/// Checks run before a new record is stored: every referenced record must
/// exist (`NotFound` otherwise) and the id must be free. `exists` must read
/// through the same lock or transaction the insert will use.
pub fn check_new(
    entity: &Entity,
    mut exists: impl FnMut(EntityKind, &str) -> StorageResult<bool>,
) -> StorageResult<()> {
    for (kind, id) in entity.references() {
        if !exists(kind, id)? {
            return Err(StorageError::not_found(kind, id));
        }
    }
    if exists(entity.kind(), entity.id())? {
        return Err(StorageError::validation(format!(
            "{} {} already exists",
            entity.kind(),
            entity.id()
        )));
    }
    Ok(())
}
