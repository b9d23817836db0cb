use std::{fmt, str::FromStr};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Amenity, City, Place, Review, State, User};
use crate::error::{StorageError, StorageResult};

/// Current time at microsecond precision, the resolution both backends keep.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Amenity,
    City,
    Place,
    Review,
    State,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Amenity,
        EntityKind::City,
        EntityKind::Place,
        EntityKind::Review,
        EntityKind::State,
        EntityKind::User,
    ];

    pub fn class_name(self) -> &'static str {
        match self {
            EntityKind::Amenity => "Amenity",
            EntityKind::City => "City",
            EntityKind::Place => "Place",
            EntityKind::Review => "Review",
            EntityKind::State => "State",
            EntityKind::User => "User",
        }
    }

    /// Plural collection name, also the relational table name.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Amenity => "amenities",
            EntityKind::City => "cities",
            EntityKind::Place => "places",
            EntityKind::Review => "reviews",
            EntityKind::State => "states",
            EntityKind::User => "users",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

impl FromStr for EntityKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EntityKind::ALL
            .into_iter()
            .find(|kind| {
                kind.class_name().eq_ignore_ascii_case(wanted)
                    || kind.collection().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| StorageError::validation(format!("unknown entity type: {wanted}")))
    }
}

pub trait Record: Sized {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn into_entity(self) -> Entity;
    fn from_entity(entity: Entity) -> Option<Self>;
}

/// Any stored record. Serializes as a flat object tagged with `__class__`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__class__")]
pub enum Entity {
    Amenity(Amenity),
    City(City),
    Place(Place),
    Review(Review),
    State(State),
    User(User),
}

macro_rules! each_entity {
    ($entity:expr, $record:ident => $body:expr) => {
        match $entity {
            Entity::Amenity($record) => $body,
            Entity::City($record) => $body,
            Entity::Place($record) => $body,
            Entity::Review($record) => $body,
            Entity::State($record) => $body,
            Entity::User($record) => $body,
        }
    };
}

impl Entity {
    /// Builds a draft entity from a caller supplied payload. Identity and
    /// timestamps are always assigned by storage, so they are discarded here.
    pub fn from_payload(kind: EntityKind, payload: Value) -> StorageResult<Self> {
        let Value::Object(mut fields) = payload else {
            return Err(StorageError::validation("Not a JSON"));
        };
        for reserved in ["id", "created_at", "updated_at", "__class__"] {
            fields.remove(reserved);
        }
        fields.insert(
            "__class__".to_string(),
            Value::String(kind.class_name().to_string()),
        );
        serde_json::from_value(Value::Object(fields)).map_err(|err| {
            StorageError::validation(format!("invalid {kind} payload: {err}"))
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Amenity(_) => EntityKind::Amenity,
            Entity::City(_) => EntityKind::City,
            Entity::Place(_) => EntityKind::Place,
            Entity::Review(_) => EntityKind::Review,
            Entity::State(_) => EntityKind::State,
            Entity::User(_) => EntityKind::User,
        }
    }

    pub fn id(&self) -> &str {
        each_entity!(self, record => &record.id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        each_entity!(self, record => record.created_at)
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        each_entity!(self, record => record.updated_at)
    }

    /// Assigns identity and timestamps that are still unset.
    pub fn stamp_new(&mut self, at: DateTime<Utc>) {
        let unset = DateTime::<Utc>::default();
        each_entity!(self, record => {
            if record.id.is_empty() {
                record.id = uuid::Uuid::new_v4().to_string();
            }
            if record.created_at == unset {
                record.created_at = at;
            }
            if record.updated_at < record.created_at {
                record.updated_at = record.created_at;
            }
        })
    }

    /// Marks the entity as modified at `at`; never moves `updated_at` before
    /// `created_at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        each_entity!(self, record => {
            record.updated_at = at.max(record.created_at);
        })
    }

    /// Checks that every required field carries a value.
    pub fn validate(&self) -> StorageResult<()> {
        let required: Vec<(&str, &str)> = match self {
            Entity::Amenity(a) => vec![("name", a.name.as_str())],
            Entity::City(c) => vec![("state_id", c.state_id.as_str()), ("name", c.name.as_str())],
            Entity::Place(p) => vec![
                ("city_id", p.city_id.as_str()),
                ("user_id", p.user_id.as_str()),
                ("name", p.name.as_str()),
            ],
            Entity::Review(r) => vec![
                ("place_id", r.place_id.as_str()),
                ("user_id", r.user_id.as_str()),
                ("text", r.text.as_str()),
            ],
            Entity::State(s) => vec![("name", s.name.as_str())],
            Entity::User(u) => vec![("email", u.email.as_str()), ("password", u.password.as_str())],
        };
        match required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(StorageError::validation(format!("Missing {field}"))),
            None => Ok(()),
        }
    }

    /// Foreign keys carried by this entity, as `(referenced kind, id)`.
    pub fn references(&self) -> Vec<(EntityKind, &str)> {
        match self {
            Entity::City(c) => vec![(EntityKind::State, c.state_id.as_str())],
            Entity::Place(p) => vec![
                (EntityKind::City, p.city_id.as_str()),
                (EntityKind::User, p.user_id.as_str()),
            ],
            Entity::Review(r) => vec![
                (EntityKind::Place, r.place_id.as_str()),
                (EntityKind::User, r.user_id.as_str()),
            ],
            Entity::Amenity(_) | Entity::State(_) | Entity::User(_) => Vec::new(),
        }
    }

    /// Outbound representation: every field plus the `__class__` tag.
    pub fn to_document(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Records only hold strings, numbers and timestamps.
            _ => Map::new(),
        }
    }

    pub fn from_document(document: Map<String, Value>) -> StorageResult<Self> {
        serde_json::from_value(Value::Object(document))
            .map_err(|err| StorageError::validation(format!("invalid record: {err}")))
    }
}
