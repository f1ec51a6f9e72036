use crate::clock::Timestamp;
use crate::error::ArchiveError;
use crate::session::{Lap, NewSession, Session};
use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// Durable, ordered history of finished sessions. Most recent first.
pub trait SessionArchive {
    /// Store a session at the most-recent position
    fn append(&mut self, session: NewSession, timestamp: Timestamp)
        -> Result<Session, ArchiveError>;

    /// Returns whether a session was removed
    fn delete(&mut self, session_id: &str) -> Result<bool, ArchiveError>;

    /// Remove one lap from a stored session. Sibling laps keep their
    /// recorded `lap_time`; the session's `total_time` is left as stored.
    fn delete_lap(&mut self, session_id: &str, lap_id: &str) -> Result<bool, ArchiveError>;

    fn list(&self) -> Result<Vec<Session>, ArchiveError>;

    fn get(&self, session_id: &str) -> Result<Option<Session>, ArchiveError>;

    fn clear(&mut self) -> Result<(), ArchiveError>;
}

/// SQLite-backed archive
#[derive(Debug)]
pub struct SqliteArchive {
    conn: Connection,
}

impl SqliteArchive {
    /// Open (creating if needed) the archive at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        tracing::debug!(path = %path.display(), "opened session archive");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, ArchiveError> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    fn init(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS sessions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                timestamp INTEGER NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                total_time INTEGER NOT NULL,
                label TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS laps (
                session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                id TEXT NOT NULL,
                total_time INTEGER NOT NULL,
                lap_time INTEGER NOT NULL,
                label TEXT NOT NULL,
                PRIMARY KEY (session_id, id)
            );

            CREATE INDEX IF NOT EXISTS idx_laps_session ON laps(session_id, position);
            "#,
        )
    }

    fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
        Ok(Session {
            id: row.get(0)?,
            timestamp: Timestamp::from_millis(row.get(1)?),
            start_time: Timestamp::from_millis(row.get(2)?),
            end_time: Timestamp::from_millis(row.get(3)?),
            total_time: row.get(4)?,
            laps: Vec::new(),
            label: row.get(5)?,
        })
    }

    fn lap_from_row(row: &Row<'_>) -> rusqlite::Result<Lap> {
        Ok(Lap {
            id: row.get(0)?,
            total_time: row.get(1)?,
            lap_time: row.get(2)?,
            label: row.get(3)?,
        })
    }

    fn laps_for(&self, session_id: &str) -> rusqlite::Result<Vec<Lap>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, total_time, lap_time, label FROM laps WHERE session_id = ?1 ORDER BY position",
        )?;
        let laps = stmt
            .query_map([session_id], Self::lap_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(laps)
    }
}

impl SessionArchive for SqliteArchive {
    fn append(
        &mut self,
        session: NewSession,
        timestamp: Timestamp,
    ) -> Result<Session, ArchiveError> {
        let session = Session::from_new(session, timestamp);
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO sessions (id, timestamp, start_time, end_time, total_time, label)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                session.id,
                session.timestamp.as_millis(),
                session.start_time.as_millis(),
                session.end_time.as_millis(),
                session.total_time,
                session.label,
            ],
        )?;

        for (position, lap) in session.laps.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO laps (session_id, position, id, total_time, lap_time, label)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    session.id,
                    position as i64,
                    lap.id,
                    lap.total_time,
                    lap.lap_time,
                    lap.label,
                ],
            )?;
        }

        tx.commit()?;
        tracing::info!(id = %session.id, laps = session.laps.len(), "session archived");
        Ok(session)
    }

    fn delete(&mut self, session_id: &str) -> Result<bool, ArchiveError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM laps WHERE session_id = ?1", [session_id])?;
        let removed = tx.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn delete_lap(&mut self, session_id: &str, lap_id: &str) -> Result<bool, ArchiveError> {
        let removed = self.conn.execute(
            "DELETE FROM laps WHERE session_id = ?1 AND id = ?2",
            params![session_id, lap_id],
        )?;
        Ok(removed > 0)
    }

    fn list(&self) -> Result<Vec<Session>, ArchiveError> {
        let mut laps: HashMap<String, Vec<Lap>> = {
            let mut stmt = self.conn.prepare(
                "SELECT session_id, id, total_time, lap_time, label FROM laps ORDER BY session_id, position",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let session_id: String = row.get(0)?;
                    Ok((
                        session_id,
                        Lap {
                            id: row.get(1)?,
                            total_time: row.get(2)?,
                            lap_time: row.get(3)?,
                            label: row.get(4)?,
                        },
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().into_group_map()
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, timestamp, start_time, end_time, total_time, label
            FROM sessions
            ORDER BY seq DESC
            "#,
        )?;
        let mut sessions = stmt
            .query_map([], Self::session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for session in &mut sessions {
            session.laps = laps.remove(&session.id).unwrap_or_default();
        }
        Ok(sessions)
    }

    fn get(&self, session_id: &str) -> Result<Option<Session>, ArchiveError> {
        let session = self
            .conn
            .query_row(
                r#"
                SELECT id, timestamp, start_time, end_time, total_time, label
                FROM sessions WHERE id = ?1
                "#,
                [session_id],
                Self::session_from_row,
            )
            .optional()?;

        match session {
            Some(mut session) => {
                session.laps = self.laps_for(&session.id)?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    fn clear(&mut self) -> Result<(), ArchiveError> {
        self.conn
            .execute_batch("DELETE FROM laps; DELETE FROM sessions;")?;
        Ok(())
    }
}

/// Archive kept only in memory, for runs without a database
#[derive(Debug, Default)]
pub struct MemoryArchive {
    sessions: Vec<Session>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionArchive for MemoryArchive {
    fn append(
        &mut self,
        session: NewSession,
        timestamp: Timestamp,
    ) -> Result<Session, ArchiveError> {
        let session = Session::from_new(session, timestamp);
        self.sessions.insert(0, session.clone());
        Ok(session)
    }

    fn delete(&mut self, session_id: &str) -> Result<bool, ArchiveError> {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != session_id);
        Ok(self.sessions.len() != before)
    }

    fn delete_lap(&mut self, session_id: &str, lap_id: &str) -> Result<bool, ArchiveError> {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) else {
            return Ok(false);
        };
        match session.laps.iter().position(|l| l.id == lap_id) {
            Some(idx) => {
                session.laps.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list(&self) -> Result<Vec<Session>, ArchiveError> {
        Ok(self.sessions.clone())
    }

    fn get(&self, session_id: &str) -> Result<Option<Session>, ArchiveError> {
        Ok(self.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    fn clear(&mut self) -> Result<(), ArchiveError> {
        self.sessions.clear();
        Ok(())
    }
}
