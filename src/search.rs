//! Place search across the location hierarchy and the amenity association.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult};
use crate::models::{typed, Entity, EntityKind, Place};
use crate::resolver::Resolver;
use crate::storage::Storage;

/// Inbound filter. An absent or `null` list means the same as an empty one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceFilter {
    #[serde(default, deserialize_with = "nullable_list")]
    pub states: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub cities: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub amenities: Vec<String>,
}

fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl PlaceFilter {
    /// Parses a request body. Anything but a JSON object is rejected before
    /// the search runs.
    pub fn from_json(body: &str) -> StorageResult<Self> {
        let value: Value =
            serde_json::from_str(body).map_err(|_| StorageError::validation("Not a JSON"))?;
        if !value.is_object() {
            return Err(StorageError::validation("Not a JSON"));
        }
        serde_json::from_value(value)
            .map_err(|err| StorageError::validation(format!("invalid search filter: {err}")))
    }

    /// Union of both filters' ids, keeping first-seen order.
    pub fn merge(mut self, other: PlaceFilter) -> Self {
        fn extend(into: &mut Vec<String>, from: Vec<String>) {
            for id in from {
                if !into.contains(&id) {
                    into.push(id);
                }
            }
        }
        extend(&mut self.states, other.states);
        extend(&mut self.cities, other.cities);
        extend(&mut self.amenities, other.amenities);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.cities.is_empty() && self.amenities.is_empty()
    }
}

/// Places matching `filter`.
///
/// Location ids (states expanded into their cities, plus explicit cities)
/// are OR-ed together; amenities are AND-ed. Ids that resolve to nothing are
/// dropped rather than reported. The result is unordered.
pub fn search_places(storage: &dyn Storage, filter: &PlaceFilter) -> StorageResult<Vec<Place>> {
    let _view = storage.snapshot()?;
    let mut places: Vec<Place> = typed(storage.all(EntityKind::Place)?.into_values());
    if filter.is_empty() {
        return Ok(places);
    }

    let resolver = Resolver::new(storage);

    let mut candidate_cities: HashSet<String> = HashSet::new();
    for state_id in &filter.states {
        for city in resolver.cities_of_state(state_id)? {
            candidate_cities.insert(city.id);
        }
    }
    for city_id in &filter.cities {
        if storage.exists(EntityKind::City, city_id)? {
            candidate_cities.insert(city_id.clone());
        } else {
            log::debug!("search: ignoring unknown city {}", city_id);
        }
    }
    // An empty candidate set means "no location constraint", never "no match".
    if !candidate_cities.is_empty() {
        places.retain(|place| candidate_cities.contains(&place.city_id));
    }

    if !filter.amenities.is_empty() {
        let mut wanted: BTreeSet<String> = BTreeSet::new();
        for amenity_id in &filter.amenities {
            if storage.exists(EntityKind::Amenity, amenity_id)? {
                wanted.insert(amenity_id.clone());
            } else {
                log::debug!("search: ignoring unknown amenity {}", amenity_id);
            }
        }
        // Every place trivially holds the empty set.
        if !wanted.is_empty() {
            let mut kept = Vec::with_capacity(places.len());
            for place in places {
                if resolver.amenity_ids_of_place(&place)?.is_superset(&wanted) {
                    kept.push(place);
                }
            }
            places = kept;
        }
    }

    log::debug!("search matched {} places", places.len());
    Ok(places)
}

/// Outbound representation of search results.
pub fn to_documents(places: Vec<Place>) -> Vec<Map<String, Value>> {
    places
        .into_iter()
        .map(|place| Entity::Place(place).to_document())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_and_null_lists_are_empty() {
        let filter = PlaceFilter::from_json(r#"{"states": null, "cities": ["c1"]}"#).unwrap();
        assert!(filter.states.is_empty());
        assert_eq!(filter.cities, vec!["c1".to_string()]);
        assert!(filter.amenities.is_empty());
        assert!(PlaceFilter::from_json("{}").unwrap().is_empty());
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        for body in ["", "not json", "[1, 2]", "\"states\""] {
            assert_eq!(
                PlaceFilter::from_json(body),
                Err(StorageError::validation("Not a JSON")),
                "{body:?}"
            );
        }
    }

    #[test]
    fn wrongly_typed_lists_are_rejected() {
        let err = PlaceFilter::from_json(r#"{"amenities": "wifi"}"#).unwrap_err();
        assert!(matches!(err, StorageError::Validation(msg) if msg.contains("search filter")));
    }

    #[test]
    fn merge_unions_without_duplicates() {
        let a = PlaceFilter {
            states: vec!["s1".into()],
            cities: vec!["c1".into()],
            amenities: vec![],
        };
        let b = PlaceFilter {
            states: vec!["s1".into(), "s2".into()],
            cities: vec![],
            amenities: vec!["a1".into()],
        };
        let merged = a.merge(b);
        assert_eq!(merged.states, vec!["s1".to_string(), "s2".to_string()]);
        assert_eq!(merged.cities, vec!["c1".to_string()]);
        assert_eq!(merged.amenities, vec!["a1".to_string()]);
    }

    #[test]
    fn documents_are_tagged_places() {
        let docs = to_documents(vec![Place::new("c1", "u1", "Loft")]);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["__class__"], json!("Place"));
        assert_eq!(docs[0]["city_id"], json!("c1"));
        assert!(!docs[0].contains_key("amenity_ids"));
    }
}
