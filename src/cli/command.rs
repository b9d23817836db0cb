use clap::Subcommand;

use crate::models::EntityKind;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(about = "Check that the configured storage opens")]
    Status,
    #[command(about = "Count stored records per type")]
    Stats,
    #[command(about = "List every record of a type")]
    List {
        #[arg(value_name = "TYPE", help = "states, cities, places, amenities, users or reviews")]
        kind: EntityKind,
    },
    #[command(about = "Show one record")]
    Show {
        #[arg(value_name = "TYPE")]
        kind: EntityKind,
        id: String,
    },
    #[command(
        about = "Create a record",
        long_about = "Create a record from a JSON object. Foreign keys (state_id, city_id, user_id, place_id) must reference existing records; id and timestamps are assigned automatically."
    )]
    Create {
        #[arg(value_name = "TYPE")]
        kind: EntityKind,
        #[arg(value_name = "JSON")]
        payload: String,
    },
    #[command(
        about = "Update fields of a record",
        long_about = "Update a record from a JSON object. Only descriptive fields may change; ids, foreign keys and timestamps are rejected."
    )]
    Update {
        #[arg(value_name = "TYPE")]
        kind: EntityKind,
        id: String,
        #[arg(value_name = "JSON")]
        payload: String,
    },
    #[command(about = "Delete a record and everything that depends on it")]
    Delete {
        #[arg(value_name = "TYPE")]
        kind: EntityKind,
        id: String,
    },
    #[command(about = "List the cities of a state")]
    Cities { state_id: String },
    #[command(about = "List the places of a city")]
    Places { city_id: String },
    #[command(about = "List the reviews of a place")]
    Reviews { place_id: String },
    #[command(about = "List the amenities of a place")]
    Amenities { place_id: String },
    #[command(about = "Link an amenity to a place")]
    Link { place_id: String, amenity_id: String },
    #[command(about = "Unlink an amenity from a place")]
    Unlink { place_id: String, amenity_id: String },
    #[command(
        about = "Search places by location and amenities",
        long_about = "Search places. Accepts a JSON filter {\"states\": [...], \"cities\": [...], \"amenities\": [...]} and/or repeated --state/--city/--amenity flags; both are combined. States and cities widen the match, amenities must all be present."
    )]
    Search {
        #[arg(value_name = "JSON")]
        filter: Option<String>,
        #[arg(long = "state", value_name = "ID")]
        states: Vec<String>,
        #[arg(long = "city", value_name = "ID")]
        cities: Vec<String>,
        #[arg(long = "amenity", value_name = "ID")]
        amenities: Vec<String>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Status => "status",
            Command::Stats => "stats",
            Command::List { .. } => "list",
            Command::Show { .. } => "show",
            Command::Create { .. } => "create",
            Command::Update { .. } => "update",
            Command::Delete { .. } => "delete",
            Command::Cities { .. } => "cities",
            Command::Places { .. } => "places",
            Command::Reviews { .. } => "reviews",
            Command::Amenities { .. } => "amenities",
            Command::Link { .. } => "link",
            Command::Unlink { .. } => "unlink",
            Command::Search { .. } => "search",
        }
    }
}
