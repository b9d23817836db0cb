use serde_json::{Map, Value};

use super::{Entity, EntityKind};
use crate::error::{StorageError, StorageResult};

/// Fields a caller may change after creation. Identity, foreign keys and
/// timestamps are absent on purpose.
pub fn mutable_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Amenity | EntityKind::City | EntityKind::State => &["name"],
        EntityKind::Place => &[
            "name",
            "description",
            "number_rooms",
            "number_bathrooms",
            "max_guest",
            "price_by_night",
            "latitude",
            "longitude",
        ],
        EntityKind::Review => &["text"],
        EntityKind::User => &["password", "first_name", "last_name"],
    }
}

/// Applies a field-by-field update. Either every key is accepted and the
/// entity is replaced, or the entity is left untouched.
pub fn apply_update(entity: &mut Entity, patch: &Map<String, Value>) -> StorageResult<()> {
    let kind = entity.kind();
    let allowed = mutable_fields(kind);
    if let Some(key) = patch.keys().find(|key| !allowed.contains(&key.as_str())) {
        return Err(StorageError::validation(format!(
            "field `{key}` cannot be updated on {kind}"
        )));
    }

    let mut document = entity.to_document();
    for (key, value) in patch {
        document.insert(key.clone(), value.clone());
    }
    let updated = Entity::from_document(document)?;
    updated.validate()?;
    *entity = updated;
    Ok(())
}
