//! [`TagSource`] over a SQLite `tags (id, name)` table.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row};

use super::{Tag, TagSource};
use crate::db::DbError;

pub struct SqliteTagSource {
    conn: Mutex<Connection>,
}

impl SqliteTagSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path).map_err(|err| DbError::Unavailable(err.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn one(&self, sql: &str, param: impl rusqlite::ToSql) -> Result<Tag, DbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql).map_err(query_error)?;
        stmt.query_row([param], tag_from_row)
            .optional()
            .map_err(query_error)?
            .ok_or(DbError::NoRows)
    }
}

impl TagSource for SqliteTagSource {
    fn tag_by_name(&self, name: &str) -> Result<Tag, DbError> {
        self.one("SELECT id, name FROM tags WHERE name = ?1", name)
    }

    fn tag_by_id(&self, id: i64) -> Result<Tag, DbError> {
        self.one("SELECT id, name FROM tags WHERE id = ?1", id)
    }

    fn all_tags(&self) -> Result<Vec<Tag>, DbError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT id, name FROM tags ORDER BY id")
            .map_err(query_error)?;
        let rows = stmt.query_map([], tag_from_row).map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }
}

impl std::fmt::Debug for SqliteTagSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTagSource").finish_non_exhaustive()
    }
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn query_error(err: rusqlite::Error) -> DbError {
    DbError::Query(err.to_string())
}
