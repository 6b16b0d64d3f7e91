use crate::agent::AgentExecutor;
use crate::session::{Frame, LoopState, Session};
use crate::types::{AgentRequest, Turn};
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives a fresh frame every time a session changes.
pub trait DisplaySink: Send {
    fn render(&mut self, frame: &Frame);
}

/// A display that discards every frame.
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn render(&mut self, _frame: &Frame) {}
}

/// Result of one `submit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing was appended or sent.
    Ignored,
    /// The agent answered and this AI turn was appended.
    Answered(Turn),
    /// The agent call failed. The human turn stays in the transcript.
    Failed(String),
}

/// Drives one request/response cycle per user submission.
///
/// The session is borrowed mutably for the whole cycle, so a second
/// submission to the same session cannot start until the first one has
/// finished.
pub struct ConversationLoop {
    executor: Arc<dyn AgentExecutor>,
}

impl ConversationLoop {
    pub fn new(executor: Arc<dyn AgentExecutor>) -> Self {
        Self { executor }
    }

    pub async fn submit(
        &self,
        session: &mut Session,
        user_text: &str,
        display: &mut dyn DisplaySink,
    ) -> SubmitOutcome {
        if user_text.trim().is_empty() {
            debug!("Ignoring blank submission");
            return SubmitOutcome::Ignored;
        }

        // History is captured before the new turn goes in: the executor gets
        // the new message as `input` only.
        let chat_history = session.transcript().turns().to_vec();
        session.transcript_mut().push(Turn::human(user_text));
        session.set_error(None);
        session.set_state(LoopState::AwaitingAgent);
        display.render(&session.render());

        let request = AgentRequest {
            input: user_text.to_string(),
            chat_history,
        };
        debug!(
            session = session.id(),
            history = request.chat_history.len(),
            "Dispatching turn to agent"
        );

        let outcome = match self.executor.invoke(request).await {
            Ok(response) => {
                let turn = Turn::ai(response.output);
                session.transcript_mut().push(turn.clone());
                SubmitOutcome::Answered(turn)
            }
            Err(e) => {
                // No rollback: the unanswered human turn stays and is part of
                // the next turn's history.
                warn!(session = session.id(), "Agent call failed: {}", e);
                let message = format!("An unexpected error occurred: {}", e);
                session.set_error(Some(message.clone()));
                SubmitOutcome::Failed(message)
            }
        };

        session.set_state(LoopState::Idle);
        display.render(&session.render());
        outcome
    }
}
