use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::{json, Map, Value};

use crate::error::StorageError;
use crate::models::{Entity, EntityKind};
use crate::storage::Storage;

pub(super) fn status(storage: &dyn Storage) -> Result<Value> {
    // Touches the backend so a closed or broken store is reported.
    storage.count(None)?;
    Ok(json!({ "status": "OK" }))
}

pub(super) fn stats(storage: &dyn Storage) -> Result<Value> {
    let mut counts = Map::new();
    for kind in EntityKind::ALL {
        counts.insert(kind.collection().to_string(), storage.count(Some(kind))?.into());
    }
    Ok(Value::Object(counts))
}

pub(super) fn list(storage: &dyn Storage, kind: EntityKind) -> Result<Value> {
    // Sorted by id so repeated listings print identically.
    let records: BTreeMap<String, Entity> = storage.all(kind)?.into_iter().collect();
    Ok(Value::Array(
        records
            .into_values()
            .map(|entity| Value::Object(entity.to_document()))
            .collect(),
    ))
}

pub(super) fn show(storage: &dyn Storage, kind: EntityKind, id: &str) -> Result<Value> {
    let entity = load(storage, kind, id)?;
    Ok(Value::Object(entity.to_document()))
}

pub(super) fn create(storage: &dyn Storage, kind: EntityKind, payload: &str) -> Result<Value> {
    let entity = Entity::from_payload(kind, parse_object(payload)?.into())?;
    let created = storage.create(entity)?;
    log::info!("✨ Created {} {}", created.kind(), created.id());
    Ok(Value::Object(created.to_document()))
}

pub(super) fn update(
    storage: &dyn Storage,
    kind: EntityKind,
    id: &str,
    payload: &str,
) -> Result<Value> {
    let patch = parse_object(payload)?;
    let updated = storage.update(kind, id, &patch)?;
    log::info!("📝 Updated {} {}", kind, id);
    Ok(Value::Object(updated.to_document()))
}

pub(super) fn delete(storage: &dyn Storage, kind: EntityKind, id: &str) -> Result<Value> {
    let entity = load(storage, kind, id)?;
    storage.delete(&entity)?;
    log::info!("🗑️ Deleted {} {}", kind, id);
    Ok(Value::Object(Map::new()))
}

pub(super) fn load(storage: &dyn Storage, kind: EntityKind, id: &str) -> Result<Entity> {
    Ok(storage
        .get(kind, id)?
        .ok_or_else(|| StorageError::not_found(kind, id))?)
}

fn parse_object(payload: &str) -> Result<Map<String, Value>, StorageError> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(StorageError::validation("Not a JSON")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStorage;

    fn store() -> (FileStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::open(dir.path().join("file.json")).unwrap();
        (store, dir)
    }

    fn storage_error(err: anyhow::Error) -> StorageError {
        err.downcast::<StorageError>().unwrap()
    }

    #[test]
    fn create_then_show_returns_the_same_document() {
        let (store, _dir) = store();
        let created = create(&store, EntityKind::State, r#"{"name": "California"}"#).unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["__class__"], json!("State"));

        let shown = show(&store, EntityKind::State, &id).unwrap();
        assert_eq!(shown, created);
    }

    #[test]
    fn create_ignores_client_supplied_identity() {
        let (store, _dir) = store();
        let created = create(
            &store,
            EntityKind::Amenity,
            r#"{"id": "mine", "name": "Wifi", "created_at": "2001-01-01T00:00:00"}"#,
        )
        .unwrap();
        assert_ne!(created["id"], json!("mine"));
        assert_ne!(created["created_at"], json!("2001-01-01T00:00:00"));
    }

    #[test]
    fn create_rejects_non_objects_and_missing_fields() {
        let (store, _dir) = store();
        let err = storage_error(create(&store, EntityKind::State, "[1]").unwrap_err());
        assert_eq!(err, StorageError::validation("Not a JSON"));

        let err = storage_error(create(&store, EntityKind::State, "{}").unwrap_err());
        assert!(matches!(err, StorageError::Validation(msg) if msg.contains("name")));

        let err = storage_error(create(&store, EntityKind::State, r#"{"name": " "}"#).unwrap_err());
        assert_eq!(err, StorageError::validation("Missing name"));
    }

    #[test]
    fn create_requires_existing_parent() {
        let (store, _dir) = store();
        let err = storage_error(
            create(&store, EntityKind::City, r#"{"state_id": "nope", "name": "SF"}"#).unwrap_err(),
        );
        assert_eq!(err, StorageError::not_found(EntityKind::State, "nope"));
    }

    #[test]
    fn update_changes_whitelisted_fields_only() {
        let (store, _dir) = store();
        let created = create(&store, EntityKind::State, r#"{"name": "Calif"}"#).unwrap();
        let id = created["id"].as_str().unwrap();

        let updated = update(&store, EntityKind::State, id, r#"{"name": "California"}"#).unwrap();
        assert_eq!(updated["name"], json!("California"));
        assert_eq!(updated["created_at"], created["created_at"]);

        let err = update(&store, EntityKind::State, id, r#"{"id": "other"}"#).unwrap_err();
        assert!(storage_error(err).is_client_error());
    }

    #[test]
    fn delete_and_show_report_missing_records() {
        let (store, _dir) = store();
        let created = create(&store, EntityKind::Amenity, r#"{"name": "Pool"}"#).unwrap();
        let id = created["id"].as_str().unwrap();

        assert_eq!(delete(&store, EntityKind::Amenity, id).unwrap(), json!({}));
        let err = storage_error(show(&store, EntityKind::Amenity, id).unwrap_err());
        assert_eq!(err, StorageError::not_found(EntityKind::Amenity, id));
        let err = storage_error(delete(&store, EntityKind::Amenity, id).unwrap_err());
        assert_eq!(err, StorageError::not_found(EntityKind::Amenity, id));
    }

    #[test]
    fn status_reports_ok_until_shutdown() {
        let (store, _dir) = store();
        assert_eq!(status(&store).unwrap(), json!({"status": "OK"}));

        store.shutdown().unwrap();
        let err = storage_error(status(&store).unwrap_err());
        assert_eq!(err, StorageError::Closed);
    }

    #[test]
    fn stats_counts_every_collection() {
        let (store, _dir) = store();
        create(&store, EntityKind::State, r#"{"name": "CA"}"#).unwrap();
        create(&store, EntityKind::Amenity, r#"{"name": "Wifi"}"#).unwrap();
        create(&store, EntityKind::Amenity, r#"{"name": "Pool"}"#).unwrap();

        let counts = stats(&store).unwrap();
        assert_eq!(counts["states"], json!(1));
        assert_eq!(counts["amenities"], json!(2));
        assert_eq!(counts["places"], json!(0));
        assert_eq!(counts.as_object().unwrap().len(), EntityKind::ALL.len());
    }

    #[test]
    fn list_is_sorted_by_id() {
        let (store, _dir) = store();
        for name in ["A", "B", "C"] {
            create(&store, EntityKind::Amenity, &json!({ "name": name }).to_string()).unwrap();
        }
        let listed = list(&store, EntityKind::Amenity).unwrap();
        let ids: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|doc| doc["id"].as_str().unwrap())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 3);
    }
}
