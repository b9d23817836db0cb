#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command as ProcCommand;

use hbnb::models::{Amenity, City, Place, Record, State, User};
use hbnb::storage::{FileStorage, SqliteStorage, Storage};
use tempfile::TempDir;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    File,
    Db,
}

pub const BACKENDS: [Backend; 2] = [Backend::File, Backend::Db];

impl Backend {
    pub fn flag(self) -> &'static str {
        match self {
            Backend::File => "file",
            Backend::Db => "db",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Backend::File => "file.json",
            Backend::Db => "hbnb.sqlite",
        }
    }
}

/// A backend opened on a private temp directory.
pub struct Fixture {
    pub backend: Backend,
    pub store: Box<dyn Storage>,
    pub path: PathBuf,
    _dir: TempDir,
}

impl Fixture {
    pub fn new(backend: Backend) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(backend.file_name());
        let store = open(backend, &path);
        Self {
            backend,
            store,
            path,
            _dir: dir,
        }
    }

    /// Persists, shuts the current handle down and opens a fresh one on the
    /// same data.
    pub fn reopen(&mut self) {
        self.store.persist().expect("persist");
        self.store.shutdown().expect("shutdown");
        self.store = open(self.backend, &self.path);
    }
}

pub fn open(backend: Backend, path: &Path) -> Box<dyn Storage> {
    match backend {
        Backend::File => Box::new(FileStorage::open(path).expect("open document store")),
        Backend::Db => Box::new(SqliteStorage::open(path).expect("open sqlite store")),
    }
}

pub fn create<T: Record>(store: &dyn Storage, record: T) -> T {
    let entity = store.create(record.into_entity()).expect("create");
    T::from_entity(entity).expect("same kind")
}

/// State CA with city SF, one host user and two places in SF.
pub struct Listing {
    pub state: State,
    pub city: City,
    pub user: User,
    pub p1: Place,
    pub p2: Place,
    pub wifi: Amenity,
}

pub fn listing(store: &dyn Storage) -> Listing {
    let state = create(store, State::new("CA"));
    let city = create(store, City::new(&state.id, "SF"));
    let user = create(store, User::new("host@example.com", "secret"));
    let p1 = create(store, Place::new(&city.id, &user.id, "Loft"));
    let p2 = create(store, Place::new(&city.id, &user.id, "Studio"));
    let wifi = create(store, Amenity::new("Wifi"));
    Listing {
        state,
        city,
        user,
        p1,
        p2,
        wifi,
    }
}

pub fn base_cmd(backend: Backend, data_dir: &TempDir) -> ProcCommand {
    let mut command = ProcCommand::new(env!("CARGO_BIN_EXE_hbnb"));
    command
        .env_remove("HBNB_TYPE_STORAGE")
        .env_remove("HBNB_DATA_DIR")
        .env_remove("HBNB_LOG_FILE")
        .env("DOTENV_PATH", data_dir.path().join("missing.env"))
        .env("RUST_LOG", "warn")
        .arg("--storage")
        .arg(backend.flag())
        .arg("--data-dir")
        .arg(data_dir.path());
    command
}
