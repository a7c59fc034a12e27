//! `clawpilot sessions`: list recorded runs from the configured store.

use anyhow::{Context, Result};

use clawpilot_config::PilotConfig;
use clawpilot_core::Session;
use clawpilot_recorder::open_recorder;

use crate::terminal_output::{note_info, render_table, Column};

pub fn list(config: &PilotConfig, limit: Option<usize>) -> Result<()> {
    let limit = limit.unwrap_or_else(|| config.settings.history_limit());
    let recorder = open_recorder(config.sessions.as_ref()).context("Failed to open session store")?;
    let sessions = recorder.history(limit)?;

    if sessions.is_empty() {
        let store = config
            .sessions
            .as_ref()
            .and_then(|s| s.store.as_deref())
            .unwrap_or("memory");
        note_info(&format!("No sessions recorded (store: {store})."));
        return Ok(());
    }

    let columns = [
        Column::left("Session"),
        Column::left("Updated"),
        Column::right("Actions"),
        Column::right("Failed"),
        Column::left("Instruction").max_width(50),
    ];
    let rows: Vec<Vec<String>> = sessions.iter().map(session_row).collect();
    print!("{}", render_table(&columns, &rows));
    Ok(())
}

fn session_row(session: &Session) -> Vec<String> {
    let real: Vec<_> = session.results.iter().filter(|r| r.is_real()).collect();
    let failed = real.iter().filter(|r| !r.success).count();
    vec![
        session.id.clone(),
        session.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        real.len().to_string(),
        failed.to_string(),
        session.instruction.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawpilot_core::{ActionResult, Instruction, ResultKind};

    #[test]
    fn row_counts_only_real_results() {
        let mut session = Session::new(&Instruction::new("open the docs").unwrap());
        session.results = vec![
            ActionResult::artifact(ResultKind::Screenshot, 1),
            ActionResult::ok("a1").with_data("action", "click"),
            ActionResult::failed("a2", "timeout").with_data("action", "type"),
        ];
        let row = session_row(&session);
        assert_eq!(row[2], "2");
        assert_eq!(row[3], "1");
        assert_eq!(row[4], "open the docs");
    }
}
