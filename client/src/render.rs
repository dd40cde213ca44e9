//! Plain-terminal rendering of [`SessionUpdate`]s.

use crate::controller::SessionUpdate;

const ASSISTANT_PROMPT: &str = "assistant> ";
/// Carriage return plus "erase entire line".
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Turns updates into text for a line-oriented terminal.
///
/// Remembers what was already printed for the current answer so the final
/// text can replace it: a streamed prefix is completed in place, a single
/// diverging line is redrawn, anything else is printed again below.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    shown: String,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output for one update, or `None` when nothing should be written.
    pub fn render(&mut self, update: SessionUpdate) -> Option<String> {
        match update {
            SessionUpdate::TurnStarted { .. } => {
                self.shown.clear();
                Some(ASSISTANT_PROMPT.to_string())
            }
            SessionUpdate::ThreadAssigned { .. } => None,
            SessionUpdate::Fragment { text } => {
                self.shown.push_str(&text);
                Some(text)
            }
            SessionUpdate::Finalized { text } => {
                let shown = std::mem::take(&mut self.shown);
                Some(match text.strip_prefix(shown.as_str()) {
                    Some(rest) => format!("{rest}\n"),
                    None if !shown.contains('\n') => format!("{CLEAR_LINE}{ASSISTANT_PROMPT}{text}\n"),
                    None => format!("\n{ASSISTANT_PROMPT}{text}\n"),
                })
            }
            SessionUpdate::Failed { message } => {
                self.shown.clear();
                Some(format!("\n[error] {message}\n"))
            }
            SessionUpdate::Cancelled => {
                self.shown.clear();
                Some("\n[cancelled]\n".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn play(updates: Vec<SessionUpdate>) -> String {
        let mut renderer = TerminalRenderer::new();
        updates.into_iter().filter_map(|u| renderer.render(u)).collect()
    }

    fn started() -> SessionUpdate {
        SessionUpdate::TurnStarted { user_text: "hi".into() }
    }

    fn fragment(text: &str) -> SessionUpdate {
        SessionUpdate::Fragment { text: text.into() }
    }

    fn finalized(text: &str) -> SessionUpdate {
        SessionUpdate::Finalized { text: text.into() }
    }

    #[test]
    fn buffered_answer_is_printed_in_full() {
        let out = play(vec![
            started(),
            SessionUpdate::ThreadAssigned { thread_id: "thread_1".into() },
            finalized("Hello there!"),
        ]);
        assert_eq!(out, "assistant> Hello there!\n");
    }

    #[test]
    fn streamed_prefix_is_completed_by_the_final_text() {
        let out = play(vec![started(), fragment("Hello "), fragment("ther"), finalized("Hello there!")]);
        assert_eq!(out, "assistant> Hello there!\n");
    }

    #[test]
    fn matching_stream_just_ends_the_line() {
        let out = play(vec![started(), fragment("ok"), finalized("ok")]);
        assert_eq!(out, "assistant> ok\n");
    }

    #[test]
    fn diverging_single_line_is_redrawn() {
        let out = play(vec![started(), fragment("Helo"), finalized("Hello")]);
        assert_eq!(out, "assistant> Helo\r\x1b[2Kassistant> Hello\n");
    }

    #[test]
    fn diverging_multi_line_text_is_printed_again() {
        let out = play(vec![started(), fragment("a\nb"), finalized("a\nc")]);
        assert_eq!(out, "assistant> a\nb\nassistant> a\nc\n");
    }

    #[test]
    fn each_turn_starts_fresh() {
        let mut renderer = TerminalRenderer::new();
        renderer.render(started());
        renderer.render(fragment("first"));
        renderer.render(SessionUpdate::Failed { message: "boom".into() });
        renderer.render(started());
        assert_eq!(renderer.render(finalized("second")).as_deref(), Some("second\n"));
    }
}
