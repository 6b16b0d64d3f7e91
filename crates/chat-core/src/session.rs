use crate::types::{Role, Turn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered, append-only history of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// True when the last turn is a human message that never got an answer.
    pub fn has_dangling_human(&self) -> bool {
        matches!(self.last(), Some(t) if t.role() == Role::Human)
    }
}

/// Where a session is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    AwaitingAgent,
}

/// Everything the display layer needs to draw a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub turns: Vec<Turn>,
    /// Busy indicator; set only while the agent call is in flight.
    pub thinking: bool,
    /// Inline error banner from the most recent failed submission.
    pub error: Option<String>,
}

/// One user's conversation. Dropping the session discards its transcript.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    transcript: Transcript,
    state: LoopState,
    last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            transcript: Transcript::new(),
            state: LoopState::Idle,
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn render(&self) -> Frame {
        Frame {
            turns: self.transcript.turns().to_vec(),
            thinking: self.state == LoopState::AwaitingAgent,
            error: self.last_error.clone(),
        }
    }

    pub(crate) fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub(crate) fn set_state(&mut self, state: LoopState) {
        self.state = state;
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty_and_idle() {
        let session = Session::new();
        assert!(session.transcript().is_empty());
        assert_eq!(session.state(), LoopState::Idle);
        assert!(session.last_error().is_none());
        let frame = session.render();
        assert!(frame.turns.is_empty());
        assert!(!frame.thinking);
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        assert_ne!(Session::new().id(), Session::new().id());
    }

    #[test]
    fn test_dangling_human() {
        let mut transcript = Transcript::new();
        assert!(!transcript.has_dangling_human());
        transcript.push(Turn::human("hi"));
        assert!(transcript.has_dangling_human());
        transcript.push(Turn::ai("hello"));
        assert!(!transcript.has_dangling_human());
    }

    #[test]
    fn test_frame_serializes_roles() {
        let mut session = Session::new();
        session.transcript_mut().push(Turn::human("hi"));
        session.transcript_mut().push(Turn::ai("hello"));
        let json = serde_json::to_value(session.render()).unwrap();
        assert_eq!(json["turns"][0]["role"], "human");
        assert_eq!(json["turns"][1]["role"], "ai");
        assert_eq!(json["turns"][1]["content"], "hello");
        assert_eq!(json["thinking"], false);
        assert!(json["error"].is_null());
    }
}
