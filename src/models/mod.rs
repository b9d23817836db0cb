//! Entity model for the listing domain.
//!
//! Records reference each other only through foreign key scalars. Derived
//! collections (a state's cities, a place's amenities) live in
//! [`crate::resolver`], never on the records themselves.

macro_rules! impl_record {
    ($ty:ident) => {
        impl $crate::models::Record for $ty {
            const KIND: $crate::models::EntityKind = $crate::models::EntityKind::$ty;

            fn id(&self) -> &str {
                &self.id
            }

            fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.updated_at
            }

            fn into_entity(self) -> $crate::models::Entity {
                $crate::models::Entity::$ty(self)
            }

            fn from_entity(entity: $crate::models::Entity) -> Option<Self> {
                match entity {
                    $crate::models::Entity::$ty(record) => Some(record),
                    _ => None,
                }
            }
        }

        impl From<$ty> for $crate::models::Entity {
            fn from(record: $ty) -> Self {
                $crate::models::Entity::$ty(record)
            }
        }
    };
}

mod amenity;
mod city;
mod entity;
mod place;
mod review;
mod state;
mod update;
mod user;

pub use amenity::Amenity;
pub use city::City;
pub use entity::{now, Entity, EntityKind, Record};
pub use place::Place;
pub use review::Review;
pub use state::State;
pub use update::{apply_update, mutable_fields};
pub use user::User;

/// Keeps the records of type `T`, dropping anything else.
pub fn typed<T: Record>(entities: impl IntoIterator<Item = Entity>) -> Vec<T> {
    entities.into_iter().filter_map(T::from_entity).collect()
}
