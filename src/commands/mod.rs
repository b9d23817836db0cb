use serde_json::Value;

use crate::cli::Command;
use crate::storage::Storage;

mod records;
mod relations;

/// A one-shot operation against an open storage scope. The returned value is
/// what gets printed.
pub trait CommandRunner {
    fn run(&self, storage: &dyn Storage) -> anyhow::Result<Value>;
}

impl CommandRunner for Command {
    fn run(&self, storage: &dyn Storage) -> anyhow::Result<Value> {
        match self {
            Command::Status => records::status(storage),
            Command::Stats => records::stats(storage),
            Command::List { kind } => records::list(storage, *kind),
            Command::Show { kind, id } => records::show(storage, *kind, id),
            Command::Create { kind, payload } => records::create(storage, *kind, payload),
            Command::Update { kind, id, payload } => records::update(storage, *kind, id, payload),
            Command::Delete { kind, id } => records::delete(storage, *kind, id),
            Command::Cities { state_id } => relations::cities(storage, state_id),
            Command::Places { city_id } => relations::places(storage, city_id),
            Command::Reviews { place_id } => relations::reviews(storage, place_id),
            Command::Amenities { place_id } => relations::amenities(storage, place_id),
            Command::Link {
                place_id,
                amenity_id,
            } => relations::link(storage, place_id, amenity_id),
            Command::Unlink {
                place_id,
                amenity_id,
            } => relations::unlink(storage, place_id, amenity_id),
            Command::Search {
                filter,
                states,
                cities,
                amenities,
            } => relations::search(storage, filter.as_deref(), states, cities, amenities),
        }
    }
}
