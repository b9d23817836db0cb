use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, types::Type, types::Value as SqlValue, Connection};

use super::traits::check_new;
use super::{Relation, Snapshot, Storage};
use crate::error::{StorageError, StorageResult};
use crate::models::{Amenity, City, Entity, EntityKind, Place, Review, State, User};

const DB_SCHEMA_VERSION: i64 = 1;

const AMENITY_COLUMNS: &[&str] = &["id", "created_at", "updated_at", "name"];
const CITY_COLUMNS: &[&str] = &["id", "created_at", "updated_at", "state_id", "name"];
const PLACE_COLUMNS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    "city_id",
    "user_id",
    "name",
    "description",
    "number_rooms",
    "number_bathrooms",
    "max_guest",
    "price_by_night",
    "latitude",
    "longitude",
];
const REVIEW_COLUMNS: &[&str] = &["id", "created_at", "updated_at", "place_id", "user_id", "text"];
const STATE_COLUMNS: &[&str] = &["id", "created_at", "updated_at", "name"];
const USER_COLUMNS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    "email",
    "password",
    "first_name",
    "last_name",
];

/// Relational backend. One connection per storage scope; every write joins a
/// single `BEGIN IMMEDIATE` transaction that [`Storage::persist`] commits.
pub struct SqliteStorage {
    pub path: String,
    conn: Mutex<Option<Connection>>,
}

fn columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Amenity => AMENITY_COLUMNS,
        EntityKind::City => CITY_COLUMNS,
        EntityKind::Place => PLACE_COLUMNS,
        EntityKind::Review => REVIEW_COLUMNS,
        EntityKind::State => STATE_COLUMNS,
        EntityKind::User => USER_COLUMNS,
    }
}

fn select_sql(kind: EntityKind) -> String {
    format!(
        "SELECT {} FROM {}",
        columns(kind).join(", "),
        kind.collection()
    )
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn get_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn map_row(kind: EntityKind, row: &rusqlite::Row<'_>) -> rusqlite::Result<Entity> {
    let id: String = row.get(0)?;
    let created_at = get_timestamp(row, 1)?;
    let updated_at = get_timestamp(row, 2)?;
    Ok(match kind {
        EntityKind::Amenity => Entity::Amenity(Amenity {
            id,
            created_at,
            updated_at,
            name: row.get(3)?,
        }),
        EntityKind::City => Entity::City(City {
            id,
            created_at,
            updated_at,
            state_id: row.get(3)?,
            name: row.get(4)?,
        }),
        EntityKind::Place => Entity::Place(Place {
            id,
            created_at,
            updated_at,
            city_id: row.get(3)?,
            user_id: row.get(4)?,
            name: row.get(5)?,
            description: row.get(6)?,
            number_rooms: row.get(7)?,
            number_bathrooms: row.get(8)?,
            max_guest: row.get(9)?,
            price_by_night: row.get(10)?,
            latitude: row.get(11)?,
            longitude: row.get(12)?,
        }),
        EntityKind::Review => Entity::Review(Review {
            id,
            created_at,
            updated_at,
            place_id: row.get(3)?,
            user_id: row.get(4)?,
            text: row.get(5)?,
        }),
        EntityKind::State => Entity::State(State {
            id,
            created_at,
            updated_at,
            name: row.get(3)?,
        }),
        EntityKind::User => Entity::User(User {
            id,
            created_at,
            updated_at,
            email: row.get(3)?,
            password: row.get(4)?,
            first_name: row.get(5)?,
            last_name: row.get(6)?,
        }),
    })
}

fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

fn optional_text(value: &Option<String>) -> SqlValue {
    value.as_deref().map_or(SqlValue::Null, text)
}

fn optional_real(value: Option<f64>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::Real)
}

/// Column values in the order of [`columns`].
fn row_values(entity: &Entity) -> Vec<SqlValue> {
    let mut values = vec![
        text(entity.id()),
        SqlValue::Text(format_timestamp(entity.created_at())),
        SqlValue::Text(format_timestamp(entity.updated_at())),
    ];
    match entity {
        Entity::Amenity(a) => values.push(text(&a.name)),
        Entity::City(c) => values.extend([text(&c.state_id), text(&c.name)]),
        Entity::Place(p) => values.extend([
            text(&p.city_id),
            text(&p.user_id),
            text(&p.name),
            optional_text(&p.description),
            SqlValue::Integer(p.number_rooms.into()),
            SqlValue::Integer(p.number_bathrooms.into()),
            SqlValue::Integer(p.max_guest.into()),
            SqlValue::Integer(p.price_by_night.into()),
            optional_real(p.latitude),
            optional_real(p.longitude),
        ]),
        Entity::Review(r) => values.extend([text(&r.place_id), text(&r.user_id), text(&r.text)]),
        Entity::State(s) => values.push(text(&s.name)),
        Entity::User(u) => values.extend([
            text(&u.email),
            text(&u.password),
            optional_text(&u.first_name),
            optional_text(&u.last_name),
        ]),
    }
    values
}

fn db_load(conn: &Connection, kind: EntityKind, id: &str) -> rusqlite::Result<Option<Entity>> {
    let sql = format!("{} WHERE id = ?1", select_sql(kind));
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query_map(params![id], |row| map_row(kind, row))?;
    let entity = rows.next().transpose()?;
    Ok(entity)
}

fn db_list(conn: &Connection, kind: EntityKind) -> rusqlite::Result<Vec<Entity>> {
    let mut stmt = conn.prepare_cached(&select_sql(kind))?;
    let mapped = stmt
        .query_map([], |row| map_row(kind, row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(mapped)
}

fn db_list_children(
    conn: &Connection,
    relation: Relation,
    parent_id: &str,
) -> rusqlite::Result<Vec<Entity>> {
    let kind = relation.child();
    let sql = format!("{} WHERE {} = ?1", select_sql(kind), relation.column());
    let mut stmt = conn.prepare_cached(&sql)?;
    let mapped = stmt
        .query_map(params![parent_id], |row| map_row(kind, row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(mapped)
}

fn db_count(conn: &Connection, kind: EntityKind) -> rusqlite::Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.collection());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as usize)
}

fn db_insert(conn: &Connection, entity: &Entity) -> rusqlite::Result<()> {
    let cols = columns(entity.kind());
    let placeholders = (1..=cols.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        entity.kind().collection(),
        cols.join(", "),
        placeholders
    );
    conn.execute(&sql, params_from_iter(row_values(entity)))?;
    Ok(())
}

fn db_update(conn: &Connection, entity: &Entity) -> rusqlite::Result<usize> {
    let cols = columns(entity.kind());
    // `id` is ?1 and never rewritten.
    let assignments = cols
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, col)| format!("{col} = ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?1",
        entity.kind().collection(),
        assignments
    );
    conn.execute(&sql, params_from_iter(row_values(entity)))
}

fn db_delete(conn: &Connection, kind: EntityKind, id: &str) -> rusqlite::Result<usize> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", kind.collection());
    conn.execute(&sql, params![id])
}

fn db_linked_ids(
    conn: &Connection,
    select: &str,
    filter: &str,
    id: &str,
) -> rusqlite::Result<Vec<String>> {
    let sql = format!("SELECT {select} FROM place_amenity WHERE {filter} = ?1 ORDER BY {select}");
    let mut stmt = conn.prepare_cached(&sql)?;
    let ids = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

impl SqliteStorage {
    /// Opens (creating if needed) the database at `path` and migrates it.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_string_lossy().to_string();
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_millis(500))?;
        Self::migrate(&conn)?;
        log::debug!("SQLite storage opened at {}", path);

        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn reset_all<P: AsRef<Path>>(path: P) -> StorageResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_file(path)?;
        for suffix in ["-wal", "-shm"] {
            let mut side = path.as_os_str().to_owned();
            side.push(suffix);
            let _ = std::fs::remove_file(side);
        }
        Ok(())
    }

    fn migrate(conn: &Connection) -> rusqlite::Result<()> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version == DB_SCHEMA_VERSION {
            return Ok(());
        }

        log::info!(
            "SQLite schema migration: {} -> {}",
            version,
            DB_SCHEMA_VERSION
        );

        if version == 0 {
            conn.execute_batch(
                r#"
            CREATE TABLE states (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL
            );
            CREATE TABLE cities (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                state_id TEXT NOT NULL REFERENCES states(id) ON DELETE CASCADE,
                name TEXT NOT NULL
            );
            CREATE TABLE users (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                email TEXT NOT NULL,
                password TEXT NOT NULL,
                first_name TEXT,
                last_name TEXT
            );
            CREATE TABLE places (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                city_id TEXT NOT NULL REFERENCES cities(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                number_rooms INTEGER NOT NULL DEFAULT 0,
                number_bathrooms INTEGER NOT NULL DEFAULT 0,
                max_guest INTEGER NOT NULL DEFAULT 0,
                price_by_night INTEGER NOT NULL DEFAULT 0,
                latitude REAL,
                longitude REAL
            );
            CREATE TABLE amenities (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL
            );
            CREATE TABLE reviews (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                place_id TEXT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text TEXT NOT NULL
            );
            CREATE TABLE place_amenity (
                place_id TEXT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
                amenity_id TEXT NOT NULL REFERENCES amenities(id) ON DELETE CASCADE,
                PRIMARY KEY (place_id, amenity_id)
            );
            CREATE INDEX cities_state_idx ON cities(state_id);
            CREATE INDEX places_city_idx ON places(city_id);
            CREATE INDEX places_user_idx ON places(user_id);
            CREATE INDEX reviews_place_idx ON reviews(place_id);
            CREATE INDEX reviews_user_idx ON reviews(user_id);
            CREATE INDEX place_amenity_amenity_idx ON place_amenity(amenity_id);
        "#,
            )?;
            conn.pragma_update(None, "user_version", DB_SCHEMA_VERSION)?;
            return Ok(());
        }

        Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::ErrorCode::SchemaChanged as i32),
            Some("database schema version mismatch; please run with --reset option".to_string()),
        ))
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".into()))
    }

    fn with_conn<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        Ok(f(conn)?)
    }

    /// Runs `f` inside the scope's write transaction. The connection lock is
    /// held for the whole closure, so a read-then-write in `f` is atomic.
    fn with_tx<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN IMMEDIATE")?;
        }
        f(conn)
    }
}

impl Storage for SqliteStorage {
    fn all(&self, kind: EntityKind) -> StorageResult<HashMap<String, Entity>> {
        let rows = self.with_conn(|conn| db_list(conn, kind))?;
        Ok(rows
            .into_iter()
            .map(|entity| (entity.id().to_string(), entity))
            .collect())
    }

    fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>> {
        self.with_conn(|conn| db_load(conn, kind, id))
    }

    fn count(&self, kind: Option<EntityKind>) -> StorageResult<usize> {
        self.with_conn(|conn| match kind {
            Some(kind) => db_count(conn, kind),
            None => EntityKind::ALL
                .into_iter()
                .map(|kind| db_count(conn, kind))
                .sum(),
        })
    }

    fn insert(&self, entity: &Entity) -> StorageResult<()> {
        self.with_tx(|conn| Ok(db_insert(conn, entity)?))
    }

    fn insert_new(&self, entity: &Entity) -> StorageResult<()> {
        self.with_tx(|conn| {
            check_new(entity, |kind, id| Ok(db_load(conn, kind, id)?.is_some()))?;
            db_insert(conn, entity)?;
            Ok(())
        })
    }

    fn modify(
        &self,
        kind: EntityKind,
        id: &str,
        change: &mut dyn FnMut(&mut Entity) -> StorageResult<()>,
    ) -> StorageResult<Option<Entity>> {
        self.with_tx(|conn| {
            let Some(mut entity) = db_load(conn, kind, id)? else {
                return Ok(None);
            };
            change(&mut entity)?;
            db_update(conn, &entity)?;
            Ok(Some(entity))
        })
    }

    fn remove(&self, kind: EntityKind, id: &str) -> StorageResult<bool> {
        let changed = self.with_tx(|conn| Ok(db_delete(conn, kind, id)?))?;
        Ok(changed > 0)
    }

    fn children(&self, relation: Relation, parent_id: &str) -> StorageResult<Vec<Entity>> {
        self.with_conn(|conn| db_list_children(conn, relation, parent_id))
    }

    fn linked_amenity_ids(&self, place_id: &str) -> StorageResult<Vec<String>> {
        self.with_conn(|conn| db_linked_ids(conn, "amenity_id", "place_id", place_id))
    }

    fn linked_place_ids(&self, amenity_id: &str) -> StorageResult<Vec<String>> {
        self.with_conn(|conn| db_linked_ids(conn, "place_id", "amenity_id", amenity_id))
    }

    fn insert_link(&self, place_id: &str, amenity_id: &str) -> StorageResult<bool> {
        let changed = self.with_tx(|conn| {
            Ok(conn.execute(
                "INSERT OR IGNORE INTO place_amenity (place_id, amenity_id) VALUES (?1, ?2)",
                params![place_id, amenity_id],
            )?)
        })?;
        Ok(changed > 0)
    }

    fn remove_link(&self, place_id: &str, amenity_id: &str) -> StorageResult<bool> {
        let changed = self.with_tx(|conn| {
            Ok(conn.execute(
                "DELETE FROM place_amenity WHERE place_id = ?1 AND amenity_id = ?2",
                params![place_id, amenity_id],
            )?)
        })?;
        Ok(changed > 0)
    }

    fn snapshot(&self) -> StorageResult<Snapshot<'_>> {
        let started = self.with_conn(|conn| {
            if !conn.is_autocommit() {
                // Already inside the scope's transaction, which is one view.
                return Ok(false);
            }
            conn.execute_batch("BEGIN DEFERRED")?;
            Ok(true)
        })?;
        if !started {
            return Ok(Snapshot::detached());
        }
        Ok(Snapshot::new(move || {
            // Reads only; ending the transaction releases the view.
            if let Err(err) = self.with_conn(|conn| conn.execute_batch("COMMIT")) {
                log::warn!("failed to end read snapshot: {}", err);
            }
        }))
    }

    fn persist(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            if conn.is_autocommit() {
                return Ok(());
            }
            conn.execute_batch("COMMIT")
        })
    }

    fn shutdown(&self) -> StorageResult<()> {
        let Some(conn) = self.lock()?.take() else {
            return Ok(());
        };
        if !conn.is_autocommit() {
            log::warn!("rolling back uncommitted changes in {}", self.path);
            conn.execute_batch("ROLLBACK")?;
        }
        conn.close().map_err(|(_, err)| StorageError::from(err))?;
        log::debug!("SQLite storage {} closed", self.path);
        Ok(())
    }
}
