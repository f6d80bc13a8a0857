//! Console rendering for streamed chat turns.

use std::io::{self, Write};

use serde_json::{json, Value};
use tau_chat_runtime::ChatSnapshot;
use tau_transcript::TurnRole;

/// Prints the assistant text of the newest turn as it grows.
#[derive(Debug, Default)]
pub(crate) struct TextRenderer {
    turn_id: Option<String>,
    printed: usize,
}

impl TextRenderer {
    pub(crate) fn render<W: Write>(&mut self, snapshot: &ChatSnapshot, out: &mut W) -> io::Result<()> {
        let Some(turn) = snapshot
            .last_turn()
            .filter(|turn| turn.role == TurnRole::Assistant)
        else {
            return Ok(());
        };
        if self.turn_id.as_deref() != Some(turn.id.as_str()) {
            self.turn_id = Some(turn.id.clone());
            self.printed = 0;
        }

        let text = turn.text_content();
        let Some(pending) = text.get(self.printed..).filter(|pending| !pending.is_empty()) else {
            return Ok(());
        };
        out.write_all(pending.as_bytes())?;
        out.flush()?;
        self.printed = text.len();
        Ok(())
    }

    pub(crate) fn printed_any(&self) -> bool {
        self.printed > 0
    }
}

pub(crate) fn snapshot_to_json(snapshot: &ChatSnapshot) -> Value {
    json!({
        "status": snapshot.status,
        "error": snapshot.error,
        "turns": snapshot.transcript.as_ref(),
    })
}
