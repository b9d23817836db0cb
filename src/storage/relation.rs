use crate::models::{Entity, EntityKind};

/// One-to-many foreign key relations between stored kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    CitiesOfState,
    PlacesOfCity,
    PlacesOfUser,
    ReviewsOfPlace,
    ReviewsOfUser,
}

impl Relation {
    pub const ALL: [Relation; 5] = [
        Relation::CitiesOfState,
        Relation::PlacesOfCity,
        Relation::PlacesOfUser,
        Relation::ReviewsOfPlace,
        Relation::ReviewsOfUser,
    ];

    pub fn parent(self) -> EntityKind {
        match self {
            Relation::CitiesOfState => EntityKind::State,
            Relation::PlacesOfCity => EntityKind::City,
            Relation::PlacesOfUser | Relation::ReviewsOfUser => EntityKind::User,
            Relation::ReviewsOfPlace => EntityKind::Place,
        }
    }

    pub fn child(self) -> EntityKind {
        match self {
            Relation::CitiesOfState => EntityKind::City,
            Relation::PlacesOfCity | Relation::PlacesOfUser => EntityKind::Place,
            Relation::ReviewsOfPlace | Relation::ReviewsOfUser => EntityKind::Review,
        }
    }

    /// Foreign key column on the child.
    pub fn column(self) -> &'static str {
        match self {
            Relation::CitiesOfState => "state_id",
            Relation::PlacesOfCity => "city_id",
            Relation::PlacesOfUser | Relation::ReviewsOfUser => "user_id",
            Relation::ReviewsOfPlace => "place_id",
        }
    }

    /// The foreign key value `entity` holds for this relation, if it is a child.
    pub fn parent_id(self, entity: &Entity) -> Option<&str> {
        match (self, entity) {
            (Relation::CitiesOfState, Entity::City(city)) => Some(city.state_id.as_str()),
            (Relation::PlacesOfCity, Entity::Place(place)) => Some(place.city_id.as_str()),
            (Relation::PlacesOfUser, Entity::Place(place)) => Some(place.user_id.as_str()),
            (Relation::ReviewsOfPlace, Entity::Review(review)) => Some(review.place_id.as_str()),
            (Relation::ReviewsOfUser, Entity::Review(review)) => Some(review.user_id.as_str()),
            _ => None,
        }
    }

    /// Relations whose children are removed along with a `kind` record.
    pub fn dependents_of(kind: EntityKind) -> impl Iterator<Item = Relation> {
        Relation::ALL
            .into_iter()
            .filter(move |relation| relation.parent() == kind)
    }
}
