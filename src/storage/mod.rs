mod file;
mod relation;
mod scope;
pub mod sqlite;
pub mod traits;

pub use file::FileStorage;
pub use relation::Relation;
pub use scope::{Snapshot, StorageScope};
pub use sqlite::SqliteStorage;
pub use traits::Storage;
