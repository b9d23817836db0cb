use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use super::traits::check_new;
use super::{Relation, Snapshot, Storage};
use crate::error::{StorageError, StorageResult};
use crate::models::{Entity, EntityKind};

const AMENITY_IDS_KEY: &str = "amenity_ids";

/// Document backend: every record lives in one in-process registry that is
/// flushed to a single JSON document.
///
/// Writers take the registry lock exclusively for the whole read-change-write
/// of a record, so concurrent updates to one record are serialized and a
/// multi-field update is never observed half-applied. Separate calls are not
/// isolated from each other: a search spanning several reads may see writes
/// landing in between.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    registry: RwLock<Registry>,
    closed: AtomicBool,
}

#[derive(Debug, Default)]
struct Registry {
    objects: HashMap<EntityKind, HashMap<String, Entity>>,
    // Embedded per-place amenity id lists, in link order.
    amenity_ids: HashMap<String, Vec<String>>,
    dirty: bool,
}

impl Registry {
    fn collection(&self, kind: EntityKind) -> Option<&HashMap<String, Entity>> {
        self.objects.get(&kind)
    }

    fn lookup(&self, kind: EntityKind, id: &str) -> Option<&Entity> {
        self.collection(kind).and_then(|objects| objects.get(id))
    }

    fn put(&mut self, entity: Entity) {
        self.objects
            .entry(entity.kind())
            .or_default()
            .insert(entity.id().to_string(), entity);
        self.dirty = true;
    }

    fn cascade_remove(&mut self, kind: EntityKind, id: &str) -> usize {
        let removed = self
            .objects
            .get_mut(&kind)
            .and_then(|objects| objects.remove(id));
        if removed.is_none() {
            return 0;
        }
        self.dirty = true;

        match kind {
            EntityKind::Place => {
                self.amenity_ids.remove(id);
            }
            EntityKind::Amenity => {
                for ids in self.amenity_ids.values_mut() {
                    ids.retain(|amenity_id| amenity_id != id);
                }
            }
            _ => {}
        }

        let mut count = 1;
        for relation in Relation::dependents_of(kind) {
            let child_ids: Vec<String> = self
                .collection(relation.child())
                .map(|objects| {
                    objects
                        .values()
                        .filter(|child| relation.parent_id(child) == Some(id))
                        .map(|child| child.id().to_string())
                        .collect()
                })
                .unwrap_or_default();
            for child_id in child_ids {
                count += self.cascade_remove(relation.child(), &child_id);
            }
        }
        count
    }

    fn to_document(&self) -> Map<String, Value> {
        let mut sorted = BTreeMap::new();
        for entity in self.objects.values().flat_map(|objects| objects.values()) {
            let mut object = entity.to_document();
            if entity.kind() == EntityKind::Place {
                let ids = self
                    .amenity_ids
                    .get(entity.id())
                    .cloned()
                    .unwrap_or_default();
                object.insert(
                    AMENITY_IDS_KEY.to_string(),
                    Value::Array(ids.into_iter().map(Value::String).collect()),
                );
            }
            sorted.insert(
                format!("{}.{}", entity.kind(), entity.id()),
                Value::Object(object),
            );
        }
        sorted.into_iter().collect()
    }

    fn from_document(document: Map<String, Value>) -> StorageResult<Self> {
        let mut registry = Registry::default();
        for (key, value) in document {
            let Value::Object(mut object) = value else {
                return Err(corrupt(format!("entry {key} is not an object")));
            };
            let embedded = object.remove(AMENITY_IDS_KEY);
            let entity = Entity::from_document(object)
                .map_err(|err| corrupt(format!("entry {key}: {err}")))?;

            let expected_key = format!("{}.{}", entity.kind(), entity.id());
            if key != expected_key {
                log::warn!("document key {} does not match record {}", key, expected_key);
            }

            if entity.kind() == EntityKind::Place {
                let ids: Vec<String> = match embedded {
                    Some(value) => serde_json::from_value(value)
                        .map_err(|err| corrupt(format!("entry {key}: {err}")))?,
                    None => Vec::new(),
                };
                if !ids.is_empty() {
                    registry.amenity_ids.insert(entity.id().to_string(), dedup(ids));
                }
            }
            registry.put(entity);
        }
        registry.dirty = false;
        Ok(registry)
    }
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

fn corrupt(msg: String) -> StorageError {
    StorageError::Unavailable(format!("corrupt document file: {msg}"))
}

impl FileStorage {
    /// Opens the document at `path`, loading it when it exists.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let storage = Self {
            path: path.as_ref().to_path_buf(),
            registry: RwLock::new(Registry::default()),
            closed: AtomicBool::new(false),
        };
        storage.reload()?;
        Ok(storage)
    }

    /// Deletes the persisted document, if any.
    pub fn reset_all<P: AsRef<Path>>(path: P) -> StorageResult<()> {
        match fs::remove_file(path.as_ref()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the in-memory registry with the persisted document. Unsaved
    /// changes are discarded.
    pub fn reload(&self) -> StorageResult<()> {
        self.ensure_open()?;
        let registry = match fs::read_to_string(&self.path) {
            Ok(s) if s.trim().is_empty() => Registry::default(),
            Ok(s) => {
                let document: Map<String, Value> = serde_json::from_str(&s)
                    .map_err(|err| corrupt(format!("{}: {err}", self.path.display())))?;
                Registry::from_document(document)?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Registry::default(),
            Err(e) => return Err(e.into()),
        };
        let total: usize = registry.objects.values().map(HashMap::len).sum();
        log::info!(
            "📂 Loaded {} records from {}",
            total,
            self.path.display()
        );
        *self.write()? = registry;
        Ok(())
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Registry>> {
        self.ensure_open()?;
        self.registry
            .read()
            .map_err(|_| StorageError::Unavailable("registry lock poisoned".into()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Registry>> {
        self.ensure_open()?;
        self.registry
            .write()
            .map_err(|_| StorageError::Unavailable("registry lock poisoned".into()))
    }
}

impl Storage for FileStorage {
    fn all(&self, kind: EntityKind) -> StorageResult<HashMap<String, Entity>> {
        Ok(self.read()?.collection(kind).cloned().unwrap_or_default())
    }

    fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>> {
        Ok(self.read()?.lookup(kind, id).cloned())
    }

    fn count(&self, kind: Option<EntityKind>) -> StorageResult<usize> {
        let registry = self.read()?;
        Ok(match kind {
            Some(kind) => registry.collection(kind).map_or(0, HashMap::len),
            None => registry.objects.values().map(HashMap::len).sum(),
        })
    }

    fn insert(&self, entity: &Entity) -> StorageResult<()> {
        let mut registry = self.write()?;
        if registry.lookup(entity.kind(), entity.id()).is_some() {
            return Err(StorageError::validation(format!(
                "{} {} already exists",
                entity.kind(),
                entity.id()
            )));
        }
        registry.put(entity.clone());
        Ok(())
    }

    fn insert_new(&self, entity: &Entity) -> StorageResult<()> {
        let mut registry = self.write()?;
        check_new(entity, |kind, id| Ok(registry.lookup(kind, id).is_some()))?;
        registry.put(entity.clone());
        Ok(())
    }

    fn modify(
        &self,
        kind: EntityKind,
        id: &str,
        change: &mut dyn FnMut(&mut Entity) -> StorageResult<()>,
    ) -> StorageResult<Option<Entity>> {
        let mut registry = self.write()?;
        let Some(mut entity) = registry.lookup(kind, id).cloned() else {
            return Ok(None);
        };
        change(&mut entity)?;
        registry.put(entity.clone());
        Ok(Some(entity))
    }

    fn remove(&self, kind: EntityKind, id: &str) -> StorageResult<bool> {
        let removed = self.write()?.cascade_remove(kind, id);
        if removed > 1 {
            log::info!("🧹 Removed {} {} and {} dependents", kind, id, removed - 1);
        }
        Ok(removed > 0)
    }

    fn children(&self, relation: Relation, parent_id: &str) -> StorageResult<Vec<Entity>> {
        let registry = self.read()?;
        Ok(registry
            .collection(relation.child())
            .map(|objects| {
                objects
                    .values()
                    .filter(|child| relation.parent_id(child) == Some(parent_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn linked_amenity_ids(&self, place_id: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .read()?
            .amenity_ids
            .get(place_id)
            .cloned()
            .unwrap_or_default())
    }

    fn linked_place_ids(&self, amenity_id: &str) -> StorageResult<Vec<String>> {
        let registry = self.read()?;
        let mut place_ids: Vec<String> = registry
            .amenity_ids
            .iter()
            .filter(|(_, ids)| ids.iter().any(|id| id == amenity_id))
            .map(|(place_id, _)| place_id.clone())
            .collect();
        place_ids.sort();
        Ok(place_ids)
    }

    fn insert_link(&self, place_id: &str, amenity_id: &str) -> StorageResult<bool> {
        let mut registry = self.write()?;
        let ids = registry.amenity_ids.entry(place_id.to_string()).or_default();
        if ids.iter().any(|id| id == amenity_id) {
            return Ok(false);
        }
        ids.push(amenity_id.to_string());
        registry.dirty = true;
        Ok(true)
    }

    fn remove_link(&self, place_id: &str, amenity_id: &str) -> StorageResult<bool> {
        let mut registry = self.write()?;
        let Some(ids) = registry.amenity_ids.get_mut(place_id) else {
            return Ok(false);
        };
        let before = ids.len();
        ids.retain(|id| id != amenity_id);
        let removed = ids.len() != before;
        if ids.is_empty() {
            registry.amenity_ids.remove(place_id);
        }
        if removed {
            registry.dirty = true;
        }
        Ok(removed)
    }

    fn snapshot(&self) -> StorageResult<Snapshot<'_>> {
        self.ensure_open()?;
        Ok(Snapshot::detached())
    }

    fn persist(&self) -> StorageResult<()> {
        let mut registry = self.write()?;
        if !registry.dirty {
            log::debug!("nothing to persist to {}", self.path.display());
            return Ok(());
        }

        if let Some(d) = self.path.parent() {
            if !d.as_os_str().is_empty() {
                fs::create_dir_all(d)?;
            }
        }
        let document = registry.to_document();
        let body = serde_json::to_string(&document)
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;
        fs::write(&self.path, body.as_bytes())?;
        registry.dirty = false;
        log::info!(
            "💾 Persisted {} records to {}",
            document.len(),
            self.path.display()
        );
        Ok(())
    }

    fn shutdown(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let dirty = self.registry.read().map(|r| r.dirty).unwrap_or(false);
        if dirty {
            log::warn!(
                "closing {} with unsaved changes; they are discarded",
                self.path.display()
            );
        }
        log::debug!("document storage {} closed", self.path.display());
        Ok(())
    }
}
