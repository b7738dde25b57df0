use crypto_core::{ConversationTurn, RagError, Role};

use crate::llm::prompt_formatter::recent_turns;

/// Turns of one conversation, oldest first
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    turns: Vec<ConversationTurn>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_turn(&mut self, role: Role, text: impl Into<String>) -> Result<(), RagError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(RagError::MalformedInput(format!(
                "{} turn must not be empty",
                role
            )));
        }

        self.turns.push(ConversationTurn::new(role, text));
        Ok(())
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        recent_turns(&self.turns, n)
    }

    pub fn reset(&mut self) {
        tracing::debug!("Clearing {} conversation turns", self.turns.len());
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
