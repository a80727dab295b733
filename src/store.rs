//! SQLite-backed session persistence.
//!
//! One row per session in `chats`, holding the graph blob plus title and
//! timestamps. Sticky notes and navigation pins live in side tables keyed
//! by `chat_id` with `ON DELETE CASCADE`, so deleting a session removes
//! them in one statement.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::codec;
use crate::error::GraphError;
use crate::geom::{point, size};
use crate::graph::{GraphModel, NavigationPin, Note};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chats (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    data        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notes (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id      INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    content      TEXT NOT NULL,
    pos_x        REAL NOT NULL,
    pos_y        REAL NOT NULL,
    width        REAL NOT NULL,
    height       REAL NOT NULL,
    color        TEXT NOT NULL,
    header_color TEXT
);

CREATE TABLE IF NOT EXISTS pins (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id  INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    title    TEXT NOT NULL,
    note     TEXT NOT NULL,
    pos_x    REAL NOT NULL,
    pos_y    REAL NOT NULL
);
";

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Session row without its graph blob, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMeta {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    /// Open (creating if needed) the database at `path`. Parent
    /// directories are created as well.
    pub fn open(path: &Path) -> Result<Self, GraphError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GraphError::Storage(format!("cannot create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| GraphError::Storage(format!("cannot open {}: {e}", path.display())))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| GraphError::Storage(format!("cannot enable foreign keys: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| GraphError::Storage(format!("cannot apply schema: {e}")))?;
        info!(path = %path.display(), "opened session store");
        Ok(Self { conn })
    }

    /// Default location: `~/.canopy/chats.db`.
    pub fn default_path() -> Result<PathBuf, GraphError> {
        dirs::home_dir()
            .map(|h| h.join(".canopy").join("chats.db"))
            .ok_or_else(|| GraphError::Storage("cannot resolve home directory".into()))
    }

    /// Insert a new session and return its id.
    pub fn create_session(&mut self, title: &str, model: &GraphModel) -> Result<i64, GraphError> {
        let blob = codec::encode(model)?;
        let now = now_iso8601();

        let tx = self
            .conn
            .transaction()
            .map_err(|e| GraphError::Storage(format!("cannot begin transaction: {e}")))?;
        tx.execute(
            "INSERT INTO chats (title, created_at, updated_at, data) VALUES (?1, ?2, ?3, ?4)",
            params![title, now, now, blob],
        )
        .map_err(|e| GraphError::Storage(format!("cannot insert session: {e}")))?;
        let id = tx.last_insert_rowid();
        write_side_tables(&tx, id, model)?;
        tx.commit()
            .map_err(|e| GraphError::Storage(format!("cannot commit session: {e}")))?;

        debug!(session = id, title, "created session");
        Ok(id)
    }

    /// Overwrite an existing session's blob and side tables, bumping
    /// `updated_at`.
    pub fn save_session(&mut self, id: i64, model: &GraphModel) -> Result<(), GraphError> {
        let blob = codec::encode(model)?;
        let now = now_iso8601();

        let tx = self
            .conn
            .transaction()
            .map_err(|e| GraphError::Storage(format!("cannot begin transaction: {e}")))?;
        let changed = tx
            .execute(
                "UPDATE chats SET data = ?1, updated_at = ?2 WHERE id = ?3",
                params![blob, now, id],
            )
            .map_err(|e| GraphError::Storage(format!("cannot update session: {e}")))?;
        if changed == 0 {
            return Err(GraphError::NotFound(format!("session {id}")));
        }
        tx.execute("DELETE FROM notes WHERE chat_id = ?1", params![id])
            .map_err(|e| GraphError::Storage(format!("cannot clear notes: {e}")))?;
        tx.execute("DELETE FROM pins WHERE chat_id = ?1", params![id])
            .map_err(|e| GraphError::Storage(format!("cannot clear pins: {e}")))?;
        write_side_tables(&tx, id, model)?;
        tx.commit()
            .map_err(|e| GraphError::Storage(format!("cannot commit session: {e}")))?;

        debug!(session = id, "saved session");
        Ok(())
    }

    pub fn rename_session(&mut self, id: i64, title: &str) -> Result<(), GraphError> {
        let changed = self
            .conn
            .execute(
                "UPDATE chats SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, now_iso8601(), id],
            )
            .map_err(|e| GraphError::Storage(format!("cannot rename session: {e}")))?;
        if changed == 0 {
            return Err(GraphError::NotFound(format!("session {id}")));
        }
        Ok(())
    }

    /// Load a session: decode its blob, then attach notes and pins from
    /// the side tables.
    pub fn load_session(&self, id: i64) -> Result<GraphModel, GraphError> {
        let blob: String = self
            .conn
            .query_row("SELECT data FROM chats WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    GraphError::NotFound(format!("session {id}"))
                }
                other => GraphError::Storage(format!("cannot read session {id}: {other}")),
            })?;

        let mut model = codec::decode(&blob)?;
        model.set_notes(self.load_notes(id)?);
        model.set_navigation_pins(self.load_pins(id)?);
        Ok(model)
    }

    pub fn delete_session(&mut self, id: i64) -> Result<(), GraphError> {
        let changed = self
            .conn
            .execute("DELETE FROM chats WHERE id = ?1", params![id])
            .map_err(|e| GraphError::Storage(format!("cannot delete session: {e}")))?;
        if changed == 0 {
            return Err(GraphError::NotFound(format!("session {id}")));
        }
        debug!(session = id, "deleted session");
        Ok(())
    }

    /// All sessions, most recently updated first.
    pub fn list_sessions(&self) -> Result<Vec<SessionMeta>, GraphError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, created_at, updated_at FROM chats
                 ORDER BY updated_at DESC, id DESC",
            )
            .map_err(|e| GraphError::Storage(format!("cannot prepare listing: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SessionMeta {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })
            .map_err(|e| GraphError::Storage(format!("cannot list sessions: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| GraphError::Storage(format!("cannot read session row: {e}")))
    }

    fn load_notes(&self, id: i64) -> Result<Vec<Note>, GraphError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT content, pos_x, pos_y, width, height, color, header_color
                 FROM notes WHERE chat_id = ?1 ORDER BY id",
            )
            .map_err(|e| GraphError::Storage(format!("cannot prepare notes query: {e}")))?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(Note {
                    content: row.get(0)?,
                    pos: point(row.get(1)?, row.get(2)?),
                    size: size(row.get(3)?, row.get(4)?),
                    color: row.get(5)?,
                    header_color: row.get(6)?,
                })
            })
            .map_err(|e| GraphError::Storage(format!("cannot read notes: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| GraphError::Storage(format!("cannot read note row: {e}")))
    }

    fn load_pins(&self, id: i64) -> Result<Vec<NavigationPin>, GraphError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT title, note, pos_x, pos_y
                 FROM pins WHERE chat_id = ?1 ORDER BY id",
            )
            .map_err(|e| GraphError::Storage(format!("cannot prepare pins query: {e}")))?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(NavigationPin {
                    title: row.get(0)?,
                    note: row.get(1)?,
                    pos: point(row.get(2)?, row.get(3)?),
                })
            })
            .map_err(|e| GraphError::Storage(format!("cannot read pins: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| GraphError::Storage(format!("cannot read pin row: {e}")))
    }
}

fn write_side_tables(
    tx: &rusqlite::Transaction<'_>,
    id: i64,
    model: &GraphModel,
) -> Result<(), GraphError> {
    for note in model.notes() {
        tx.execute(
            "INSERT INTO notes (chat_id, content, pos_x, pos_y, width, height, color, header_color)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                note.content,
                note.pos.x,
                note.pos.y,
                note.size.width,
                note.size.height,
                note.color,
                note.header_color,
            ],
        )
        .map_err(|e| GraphError::Storage(format!("cannot insert note: {e}")))?;
    }
    for pin in model.navigation_pins() {
        tx.execute(
            "INSERT INTO pins (chat_id, title, note, pos_x, pos_y)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, pin.title, pin.note, pin.pos.x, pin.pos.y],
        )
        .map_err(|e| GraphError::Storage(format!("cannot insert pin: {e}")))?;
    }
    Ok(())
}
