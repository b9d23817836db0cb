use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::records::load;
use crate::error::StorageError;
use crate::models::{Amenity, Entity, EntityKind, Place, Record};
use crate::resolver::Resolver;
use crate::search::{search_places, to_documents, PlaceFilter};
use crate::storage::Storage;

fn documents<T: Record>(records: Vec<T>) -> Value {
    Value::Array(
        records
            .into_iter()
            .map(|record| Value::Object(record.into_entity().to_document()))
            .collect(),
    )
}

fn load_typed<T: Record>(storage: &dyn Storage, id: &str) -> Result<T> {
    let entity = load(storage, T::KIND, id)?;
    T::from_entity(entity).context("stored record has unexpected type")
}

pub(super) fn cities(storage: &dyn Storage, state_id: &str) -> Result<Value> {
    load(storage, EntityKind::State, state_id)?;
    Ok(documents(Resolver::new(storage).cities_of_state(state_id)?))
}

pub(super) fn places(storage: &dyn Storage, city_id: &str) -> Result<Value> {
    load(storage, EntityKind::City, city_id)?;
    Ok(documents(Resolver::new(storage).places_of_city(city_id)?))
}

pub(super) fn reviews(storage: &dyn Storage, place_id: &str) -> Result<Value> {
    load(storage, EntityKind::Place, place_id)?;
    Ok(documents(Resolver::new(storage).reviews_of_place(place_id)?))
}

pub(super) fn amenities(storage: &dyn Storage, place_id: &str) -> Result<Value> {
    let place: Place = load_typed(storage, place_id)?;
    Ok(documents(Resolver::new(storage).amenities_of_place(&place)?))
}

pub(super) fn link(storage: &dyn Storage, place_id: &str, amenity_id: &str) -> Result<Value> {
    let place: Place = load_typed(storage, place_id)?;
    let amenity: Amenity = load_typed(storage, amenity_id)?;
    if Resolver::new(storage).link_amenity_to_place(&place, &amenity)? {
        log::info!("🔗 Linked amenity {} to place {}", amenity_id, place_id);
    } else {
        log::info!("🔗 Amenity {} already linked to place {}", amenity_id, place_id);
    }
    Ok(Value::Object(Entity::from(amenity).to_document()))
}

pub(super) fn unlink(storage: &dyn Storage, place_id: &str, amenity_id: &str) -> Result<Value> {
    let place: Place = load_typed(storage, place_id)?;
    let amenity: Amenity = load_typed(storage, amenity_id)?;
    if !Resolver::new(storage).unlink_amenity_from_place(&place, &amenity)? {
        return Err(StorageError::not_found(EntityKind::Amenity, amenity_id).into());
    }
    log::info!("✂️ Unlinked amenity {} from place {}", amenity_id, place_id);
    Ok(Value::Object(Map::new()))
}

pub(super) fn search(
    storage: &dyn Storage,
    body: Option<&str>,
    states: &[String],
    cities: &[String],
    amenities: &[String],
) -> Result<Value> {
    let from_body = match body {
        Some(body) => PlaceFilter::from_json(body)?,
        None => PlaceFilter::default(),
    };
    let filter = from_body.merge(PlaceFilter {
        states: states.to_vec(),
        cities: cities.to_vec(),
        amenities: amenities.to_vec(),
    });
    let places = search_places(storage, &filter)?;
    log::info!("🔎 Search matched {} places", places.len());
    Ok(Value::Array(
        to_documents(places).into_iter().map(Value::Object).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{City, State, User};
    use crate::storage::FileStorage;
    use serde_json::json;

    struct Listing {
        store: FileStorage,
        state: State,
        place: Place,
        wifi: Amenity,
        _dir: tempfile::TempDir,
    }

    fn create<T: Record>(store: &dyn Storage, record: T) -> T {
        T::from_entity(store.create(record.into_entity()).unwrap()).unwrap()
    }

    fn listing() -> Listing {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::open(dir.path().join("file.json")).unwrap();
        let state = create(&store, State::new("California"));
        let city = create(&store, City::new(&state.id, "San Francisco"));
        let user = create(&store, User::new("host@example.com", "pw"));
        let place = create(&store, Place::new(&city.id, &user.id, "Loft"));
        let wifi = create(&store, Amenity::new("Wifi"));
        Listing {
            store,
            state,
            place,
            wifi,
            _dir: dir,
        }
    }

    fn ids(value: &Value) -> Vec<String> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|doc| doc["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn link_then_list_amenities() {
        let fx = listing();
        link(&fx.store, &fx.place.id, &fx.wifi.id).unwrap();
        link(&fx.store, &fx.place.id, &fx.wifi.id).unwrap();

        let listed = amenities(&fx.store, &fx.place.id).unwrap();
        assert_eq!(ids(&listed), vec![fx.wifi.id.clone()]);
    }

    #[test]
    fn unlink_of_unlinked_pair_is_not_found() {
        let fx = listing();
        let err = unlink(&fx.store, &fx.place.id, &fx.wifi.id).unwrap_err();
        assert_eq!(
            err.downcast::<StorageError>().unwrap(),
            StorageError::not_found(EntityKind::Amenity, fx.wifi.id.clone())
        );

        link(&fx.store, &fx.place.id, &fx.wifi.id).unwrap();
        assert_eq!(unlink(&fx.store, &fx.place.id, &fx.wifi.id).unwrap(), json!({}));
    }

    #[test]
    fn relation_listings_require_the_parent() {
        let fx = listing();
        assert_eq!(ids(&cities(&fx.store, &fx.state.id).unwrap()).len(), 1);
        assert_eq!(ids(&places(&fx.store, &fx.place.city_id).unwrap()), vec![fx.place.id.clone()]);
        assert!(ids(&reviews(&fx.store, &fx.place.id).unwrap()).is_empty());

        let err = cities(&fx.store, "missing").unwrap_err();
        assert_eq!(
            err.downcast::<StorageError>().unwrap(),
            StorageError::not_found(EntityKind::State, "missing")
        );
    }

    #[test]
    fn search_merges_body_and_flags() {
        let fx = listing();
        link(&fx.store, &fx.place.id, &fx.wifi.id).unwrap();

        let body = json!({ "states": [fx.state.id] }).to_string();
        let found = search(&fx.store, Some(&body), &[], &[], &[fx.wifi.id.clone()]).unwrap();
        assert_eq!(ids(&found), vec![fx.place.id.clone()]);

        let err = search(&fx.store, Some("[]"), &[], &[], &[]).unwrap_err();
        assert_eq!(
            err.downcast::<StorageError>().unwrap(),
            StorageError::validation("Not a JSON")
        );
    }
}
