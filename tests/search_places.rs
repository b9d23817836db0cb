use std::collections::BTreeSet;

use hbnb::models::{Amenity, City, EntityKind, Place, State};
use hbnb::resolver::Resolver;
use hbnb::search::{search_places, to_documents, PlaceFilter};
use hbnb::storage::Storage;
use serde_json::json;

mod common;
use common::{create, listing, Fixture, BACKENDS};

fn ids(places: Vec<Place>) -> BTreeSet<String> {
    places.into_iter().map(|place| place.id).collect()
}

fn owned(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn filter(states: &[&str], cities: &[&str], amenities: &[&str]) -> PlaceFilter {
    PlaceFilter {
        states: owned(states),
        cities: owned(cities),
        amenities: owned(amenities),
    }
}

fn search(store: &dyn Storage, filter: &PlaceFilter) -> BTreeSet<String> {
    ids(search_places(store, filter).unwrap())
}

#[test]
fn wifi_in_california_matches_only_the_equipped_place() {
    for backend in BACKENDS {
        let fx = Fixture::new(backend);
        let store = fx.store.as_ref();
        let l = listing(store);
        Resolver::new(store).link_amenity_to_place(&l.p1, &l.wifi).unwrap();

        let found = search(store, &filter(&[&l.state.id], &[], &[&l.wifi.id]));
        assert_eq!(found, BTreeSet::from([l.p1.id.clone()]), "{backend:?}");
    }
}

#[test]
fn empty_filter_returns_every_place() {
    for backend in BACKENDS {
        let fx = Fixture::new(backend);
        let store = fx.store.as_ref();
        let l = listing(store);
        let elsewhere = create(store, State::new("NV"));
        let reno = create(store, City::new(&elsewhere.id, "Reno"));
        let p3 = create(store, Place::new(&reno.id, &l.user.id, "Cabin"));

        let all = BTreeSet::from([l.p1.id.clone(), l.p2.id.clone(), p3.id.clone()]);
        assert_eq!(search(store, &PlaceFilter::default()), all, "{backend:?}");
        let parsed = PlaceFilter::from_json(r#"{"states": [], "cities": null}"#).unwrap();
        assert_eq!(search(store, &parsed), all, "{backend:?}");
    }
}

#[test]
fn amenity_matching_is_conjunctive() {
    for backend in BACKENDS {
        let fx = Fixture::new(backend);
        let store = fx.store.as_ref();
        let l = listing(store);
        let pool = create(store, Amenity::new("Pool"));
        let gym = create(store, Amenity::new("Gym"));
        let resolver = Resolver::new(store);
        resolver.link_amenity_to_place(&l.p1, &l.wifi).unwrap();
        resolver.link_amenity_to_place(&l.p1, &pool).unwrap();
        resolver.link_amenity_to_place(&l.p2, &l.wifi).unwrap();

        let a = l.wifi.id.as_str();
        let b = pool.id.as_str();
        let c = gym.id.as_str();
        let p1 = BTreeSet::from([l.p1.id.clone()]);
        let both = BTreeSet::from([l.p1.id.clone(), l.p2.id.clone()]);

        assert_eq!(search(store, &filter(&[], &[], &[a, b])), p1, "{backend:?}");
        assert_eq!(search(store, &filter(&[], &[], &[a])), both, "{backend:?}");
        assert!(search(store, &filter(&[], &[], &[a, c])).is_empty(), "{backend:?}");
    }
}

#[test]
fn location_is_the_union_of_states_and_cities() {
    for backend in BACKENDS {
        let fx = Fixture::new(backend);
        let store = fx.store.as_ref();
        let l = listing(store);
        let nv = create(store, State::new("NV"));
        let reno = create(store, City::new(&nv.id, "Reno"));
        let cabin = create(store, Place::new(&reno.id, &l.user.id, "Cabin"));
        let or = create(store, State::new("OR"));
        let bend = create(store, City::new(&or.id, "Bend"));
        create(store, Place::new(&bend.id, &l.user.id, "Lodge"));

        let found = search(store, &filter(&[&l.state.id], &[&reno.id], &[]));
        assert_eq!(
            found,
            BTreeSet::from([l.p1.id.clone(), l.p2.id.clone(), cabin.id.clone()]),
            "{backend:?}"
        );
    }
}

#[test]
fn unknown_ids_are_ignored() {
    for backend in BACKENDS {
        let fx = Fixture::new(backend);
        let store = fx.store.as_ref();
        let l = listing(store);
        Resolver::new(store).link_amenity_to_place(&l.p1, &l.wifi).unwrap();
        let everything = BTreeSet::from([l.p1.id.clone(), l.p2.id.clone()]);

        // Stale ids alongside real ones are dropped.
        assert_eq!(
            search(store, &filter(&[], &[&l.city.id, "gone-city"], &[&l.wifi.id, "gone-amenity"])),
            BTreeSet::from([l.p1.id.clone()]),
            "{backend:?}"
        );
        // A filter made only of stale ids constrains nothing.
        assert_eq!(search(store, &filter(&[], &[], &["gone-amenity"])), everything, "{backend:?}");
        assert_eq!(search(store, &filter(&["gone-state"], &["gone-city"], &[])), everything, "{backend:?}");
    }
}

#[test]
fn deleted_amenities_stop_constraining() {
    for backend in BACKENDS {
        let fx = Fixture::new(backend);
        let store = fx.store.as_ref();
        let l = listing(store);
        store.delete(&l.wifi.clone().into()).unwrap();

        let found = search(store, &filter(&[&l.state.id], &[], &[&l.wifi.id]));
        assert_eq!(found, BTreeSet::from([l.p1.id.clone(), l.p2.id.clone()]), "{backend:?}");
    }
}

#[test]
fn linking_twice_changes_nothing() {
    for backend in BACKENDS {
        let fx = Fixture::new(backend);
        let store = fx.store.as_ref();
        let l = listing(store);
        let resolver = Resolver::new(store);

        assert!(resolver.link_amenity_to_place(&l.p1, &l.wifi).unwrap(), "{backend:?}");
        let once = resolver.amenity_ids_of_place(&l.p1).unwrap();
        assert!(!resolver.link_amenity_to_place(&l.p1, &l.wifi).unwrap(), "{backend:?}");
        assert_eq!(resolver.amenity_ids_of_place(&l.p1).unwrap(), once, "{backend:?}");

        assert!(!resolver.unlink_amenity_from_place(&l.p2, &l.wifi).unwrap(), "{backend:?}");
        assert!(resolver.amenity_ids_of_place(&l.p2).unwrap().is_empty(), "{backend:?}");
    }
}

#[test]
fn results_survive_a_reload() {
    for backend in BACKENDS {
        let mut fx = Fixture::new(backend);
        let l = listing(fx.store.as_ref());
        Resolver::new(fx.store.as_ref())
            .link_amenity_to_place(&l.p2, &l.wifi)
            .unwrap();
        fx.reopen();

        let found = search(fx.store.as_ref(), &filter(&[], &[&l.city.id], &[&l.wifi.id]));
        assert_eq!(found, BTreeSet::from([l.p2.id.clone()]), "{backend:?}");
    }
}

#[test]
fn outbound_documents_hide_the_amenity_association() {
    for backend in BACKENDS {
        let fx = Fixture::new(backend);
        let store = fx.store.as_ref();
        let l = listing(store);
        Resolver::new(store).link_amenity_to_place(&l.p1, &l.wifi).unwrap();

        let places = search_places(store, &filter(&[], &[], &[&l.wifi.id])).unwrap();
        let docs = to_documents(places);
        assert_eq!(docs.len(), 1, "{backend:?}");
        let doc = &docs[0];
        assert_eq!(doc["__class__"], json!("Place"), "{backend:?}");
        assert_eq!(doc["id"], json!(l.p1.id), "{backend:?}");
        assert_eq!(doc["city_id"], json!(l.city.id), "{backend:?}");
        assert!(!doc.contains_key("amenity_ids"), "{backend:?}");
        assert!(!doc.contains_key("amenities"), "{backend:?}");
        assert_eq!(store.count(Some(EntityKind::Place)).unwrap(), 2, "{backend:?}");
    }
}
