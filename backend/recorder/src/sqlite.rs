use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use clawpilot_core::{ActionResult, Instruction, PilotError, Session, SessionRecorder};

struct Inner {
    conn: Connection,
    active: Option<String>,
}

/// SQLite-backed session recorder. Sessions survive restarts.
///
/// Timestamps are stored as Unix milliseconds; results as JSON in append
/// order.
pub struct SqliteRecorder {
    inner: Mutex<Inner>,
}

fn db_err(e: rusqlite::Error) -> PilotError {
    PilotError::Recorder(e.to_string())
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

impl SqliteRecorder {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self, PilotError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PilotError::Recorder(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        let recorder = Self::with_connection(conn)?;
        info!(path = %path.display(), "Session store opened");
        Ok(recorder)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, PilotError> {
        Self::with_connection(Connection::open_in_memory().map_err(db_err)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PilotError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                instruction TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS results (
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                result TEXT NOT NULL,
                PRIMARY KEY (session_id, seq)
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at);",
        )
        .map_err(db_err)?;
        Ok(Self {
            inner: Mutex::new(Inner { conn, active: None }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, PilotError> {
        self.inner
            .lock()
            .map_err(|_| PilotError::Recorder("session store lock poisoned".into()))
    }

    fn load(conn: &Connection, row: (String, String, i64, i64)) -> Result<Session, PilotError> {
        let (id, instruction, created_at, updated_at) = row;
        let mut stmt = conn
            .prepare("SELECT result FROM results WHERE session_id = ?1 ORDER BY seq ASC")
            .map_err(db_err)?;
        let raw: Vec<String> = stmt
            .query_map(params![id], |r| r.get(0))
            .map_err(db_err)?
            .collect::<Result<_, _>>()
            .map_err(db_err)?;
        let results = raw
            .iter()
            .map(|json| serde_json::from_str::<ActionResult>(json))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PilotError::Recorder(format!("corrupt result in session {id}: {e}")))?;
        Ok(Session {
            id,
            instruction,
            results,
            created_at: from_millis(created_at),
            updated_at: from_millis(updated_at),
        })
    }
}

impl SessionRecorder for SqliteRecorder {
    fn create_session(&self, instruction: &Instruction) -> Result<String, PilotError> {
        let session = Session::new(instruction);
        let mut inner = self.lock()?;
        inner
            .conn
            .execute(
                "INSERT INTO sessions (id, instruction, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.id,
                    session.instruction,
                    session.created_at.timestamp_millis(),
                    session.updated_at.timestamp_millis(),
                ],
            )
            .map_err(db_err)?;
        inner.active = Some(session.id.clone());
        debug!(session_id = %session.id, "Session created");
        Ok(session.id)
    }

    fn append(&self, session_id: &str, result: &ActionResult) -> Result<(), PilotError> {
        let json = serde_json::to_string(result)
            .map_err(|e| PilotError::Recorder(format!("cannot encode result: {e}")))?;
        let mut inner = self.lock()?;
        let tx = inner.conn.transaction().map_err(db_err)?;
        let touched = tx
            .execute(
                "UPDATE sessions SET updated_at = ?2 WHERE id = ?1",
                params![session_id, Utc::now().timestamp_millis()],
            )
            .map_err(db_err)?;
        if touched == 0 {
            return Err(PilotError::Recorder(format!("unknown session {session_id}")));
        }
        tx.execute(
            "INSERT INTO results (session_id, seq, result)
             VALUES (?1, (SELECT COALESCE(MAX(seq), -1) + 1 FROM results WHERE session_id = ?1), ?2)",
            params![session_id, json],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)
    }

    fn get(&self, session_id: &str) -> Result<Option<Session>, PilotError> {
        let inner = self.lock()?;
        let row = inner
            .conn
            .query_row(
                "SELECT id, instruction, created_at, updated_at FROM sessions WHERE id = ?1",
                params![session_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()
            .map_err(db_err)?;
        row.map(|row| Self::load(&inner.conn, row)).transpose()
    }

    fn history(&self, limit: usize) -> Result<Vec<Session>, PilotError> {
        let inner = self.lock()?;
        let mut stmt = inner
            .conn
            .prepare(
                "SELECT id, instruction, created_at, updated_at FROM sessions
                 ORDER BY updated_at DESC, rowid DESC LIMIT ?1",
            )
            .map_err(db_err)?;
        let rows: Vec<(String, String, i64, i64)> = stmt
            .query_map(params![limit as i64], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })
            .map_err(db_err)?
            .collect::<Result<_, _>>()
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| Self::load(&inner.conn, row))
            .collect()
    }

    fn prune_older_than(&self, max_age: Duration) -> Result<usize, PilotError> {
        let Some(cutoff) = crate::prune_cutoff(max_age) else {
            return Ok(0);
        };
        let mut inner = self.lock()?;
        let active = inner.active.clone().unwrap_or_default();
        let tx = inner.conn.transaction().map_err(db_err)?;
        tx.execute(
            "DELETE FROM results WHERE session_id IN
                (SELECT id FROM sessions WHERE updated_at <= ?1 AND id != ?2)",
            params![cutoff.timestamp_millis(), active],
        )
        .map_err(db_err)?;
        let pruned = tx
            .execute(
                "DELETE FROM sessions WHERE updated_at <= ?1 AND id != ?2",
                params![cutoff.timestamp_millis(), active],
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        if pruned > 0 {
            info!(pruned, "Pruned stale sessions");
        }
        Ok(pruned)
    }
}
