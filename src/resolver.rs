//! Derived relationship views over any [`Storage`] backend.
//!
//! Callers get plain records and plain id sets regardless of whether the
//! backend keeps amenity links as an embedded list or a join table. Records
//! that point at something no longer stored are left out of every derived
//! collection instead of failing the lookup.

use std::collections::BTreeSet;

use crate::error::{StorageError, StorageResult};
use crate::models::{typed, Amenity, City, EntityKind, Place, Record, Review};
use crate::storage::{Relation, Storage};

pub struct Resolver<'a> {
    storage: &'a dyn Storage,
}

impl<'a> Resolver<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    pub fn cities_of_state(&self, state_id: &str) -> StorageResult<Vec<City>> {
        self.children(Relation::CitiesOfState, state_id)
    }

    pub fn places_of_city(&self, city_id: &str) -> StorageResult<Vec<Place>> {
        self.children(Relation::PlacesOfCity, city_id)
    }

    /// Reviews of a place whose author still exists.
    pub fn reviews_of_place(&self, place_id: &str) -> StorageResult<Vec<Review>> {
        let mut reviews = Vec::new();
        for review in self.children::<Review>(Relation::ReviewsOfPlace, place_id)? {
            if self.storage.exists(EntityKind::User, &review.user_id)? {
                reviews.push(review);
            }
        }
        Ok(reviews)
    }

    /// The place's linked amenity ids, limited to amenities that exist.
    pub fn amenity_ids_of_place(&self, place: &Place) -> StorageResult<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        for amenity_id in self.storage.linked_amenity_ids(place.id())? {
            if self.storage.exists(EntityKind::Amenity, &amenity_id)? {
                ids.insert(amenity_id);
            }
        }
        Ok(ids)
    }

    pub fn amenities_of_place(&self, place: &Place) -> StorageResult<Vec<Amenity>> {
        self.load_all(self.storage.linked_amenity_ids(place.id())?)
    }

    pub fn places_of_amenity(&self, amenity: &Amenity) -> StorageResult<Vec<Place>> {
        self.load_all(self.storage.linked_place_ids(amenity.id())?)
    }

    /// Links the pair unless already linked. Returns whether a link was added;
    /// a new link stamps the place as modified.
    pub fn link_amenity_to_place(&self, place: &Place, amenity: &Amenity) -> StorageResult<bool> {
        self.require::<Place>(place.id())?;
        self.require::<Amenity>(amenity.id())?;
        if !self.storage.insert_link(place.id(), amenity.id())? {
            return Ok(false);
        }
        self.storage.touch(EntityKind::Place, place.id())?;
        log::debug!("linked amenity {} to place {}", amenity.id(), place.id());
        Ok(true)
    }

    /// Returns whether a link existed and was removed; `false` means there
    /// was nothing to do.
    pub fn unlink_amenity_from_place(
        &self,
        place: &Place,
        amenity: &Amenity,
    ) -> StorageResult<bool> {
        if !self.storage.remove_link(place.id(), amenity.id())? {
            return Ok(false);
        }
        self.storage.touch(EntityKind::Place, place.id())?;
        log::debug!("unlinked amenity {} from place {}", amenity.id(), place.id());
        Ok(true)
    }

    fn children<T: Record>(&self, relation: Relation, parent_id: &str) -> StorageResult<Vec<T>> {
        if !self.storage.exists(relation.parent(), parent_id)? {
            return Ok(Vec::new());
        }
        Ok(typed(self.storage.children(relation, parent_id)?))
    }

    fn load_all<T: Record>(&self, ids: Vec<String>) -> StorageResult<Vec<T>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.storage.get(T::KIND, &id)? {
                records.extend(T::from_entity(entity));
            }
        }
        Ok(records)
    }

    fn require<T: Record>(&self, id: &str) -> StorageResult<()> {
        if self.storage.exists(T::KIND, id)? {
            Ok(())
        } else {
            Err(StorageError::not_found(T::KIND, id))
        }
    }
}
