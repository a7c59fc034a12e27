use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use clawpilot_core::{ActionResult, Instruction, PilotError, Session, SessionRecorder};

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    active: Option<String>,
}

/// Process-local session recorder. Sessions are lost on exit.
#[derive(Default)]
pub struct MemoryRecorder {
    inner: Mutex<Inner>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, PilotError> {
        self.inner
            .lock()
            .map_err(|_| PilotError::Recorder("session store lock poisoned".into()))
    }
}

impl SessionRecorder for MemoryRecorder {
    fn create_session(&self, instruction: &Instruction) -> Result<String, PilotError> {
        let session = Session::new(instruction);
        let id = session.id.clone();
        let mut inner = self.lock()?;
        inner.sessions.insert(id.clone(), session);
        inner.active = Some(id.clone());
        debug!(session_id = %id, "Session created");
        Ok(id)
    }

    fn append(&self, session_id: &str, result: &ActionResult) -> Result<(), PilotError> {
        let mut inner = self.lock()?;
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| PilotError::Recorder(format!("unknown session {session_id}")))?;
        session.results.push(result.clone());
        session.updated_at = Utc::now();
        Ok(())
    }

    fn get(&self, session_id: &str) -> Result<Option<Session>, PilotError> {
        Ok(self.lock()?.sessions.get(session_id).cloned())
    }

    fn history(&self, limit: usize) -> Result<Vec<Session>, PilotError> {
        let inner = self.lock()?;
        let mut sessions: Vec<Session> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    fn prune_older_than(&self, max_age: Duration) -> Result<usize, PilotError> {
        let Some(cutoff) = crate::prune_cutoff(max_age) else {
            return Ok(0);
        };
        let mut inner = self.lock()?;
        let active = inner.active.clone();
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|id, s| Some(id) == active.as_ref() || s.updated_at > cutoff);
        let pruned = before - inner.sessions.len();
        if pruned > 0 {
            debug!(pruned, "Pruned stale sessions");
        }
        Ok(pruned)
    }
}
