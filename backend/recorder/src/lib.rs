pub mod memory;
pub mod sqlite;

pub use memory::MemoryRecorder;
pub use sqlite::SqliteRecorder;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use clawpilot_config::SessionsConfig;
use clawpilot_core::{PilotError, SessionRecorder};

/// Open the recorder named by the `sessions` config section (memory by default).
pub fn open_recorder(
    config: Option<&SessionsConfig>,
) -> Result<Arc<dyn SessionRecorder>, PilotError> {
    let store = config.and_then(|c| c.store.as_deref()).unwrap_or("memory");
    match store {
        "memory" => Ok(Arc::new(MemoryRecorder::new())),
        "sqlite" => {
            let path = config
                .and_then(|c| c.path.as_deref())
                .ok_or_else(|| PilotError::Config("sqlite store requires sessions.path".into()))?;
            Ok(Arc::new(SqliteRecorder::open(Path::new(path))?))
        }
        other => Err(PilotError::Config(format!("unknown session store '{other}'"))),
    }
}

/// Sessions last updated at or before the returned instant are stale.
/// `None` when `max_age` reaches back past the representable range.
pub(crate) fn prune_cutoff(max_age: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_memory() {
        assert!(open_recorder(None).is_ok());
    }

    #[test]
    fn sqlite_needs_a_path() {
        let config = SessionsConfig {
            store: Some("sqlite".into()),
            path: None,
        };
        assert!(matches!(
            open_recorder(Some(&config)),
            Err(PilotError::Config(_))
        ));
    }

    #[test]
    fn huge_retention_prunes_nothing() {
        assert!(prune_cutoff(Duration::from_secs(u64::MAX)).is_none());
        let recorder = MemoryRecorder::new();
        assert_eq!(
            recorder.prune_older_than(Duration::from_secs(u64::MAX)).unwrap(),
            0
        );
    }
}
