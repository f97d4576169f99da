//! Conversation turn log
//!
//! A session's conversation is an append-only sequence of role-tagged turns.
//! The log only ever grows during a session; reset clears it wholesale.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Ordered, append-only log of turns for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn push_user(&mut self, content: &str) {
        self.turns.push(Turn {
            role: Role::User,
            content: content.to_string(),
        });
    }

    pub fn push_bot(&mut self, content: &str) {
        self.turns.push(Turn {
            role: Role::Bot,
            content: content.to_string(),
        });
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

    /// Render turns as role-prefixed lines for prompt assembly.
    ///
    /// `skip_last` excludes the most recent turns, so the current question
    /// can be kept out of the history block it follows.
    pub fn render_history(&self, skip_last: usize) -> String {
        let end = self.turns.len().saturating_sub(skip_last);
        self.turns[..end]
            .iter()
            .map(|t| {
                let prefix = match t.role {
                    Role::User => "User",
                    Role::Bot => "Bot",
                };
                format!("{}: {}", prefix, t.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_order() {
        let mut memory = ConversationMemory::new();
        memory.push_user("What treats a headache?");
        memory.push_bot("Ibuprofen is commonly used.");

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.turns()[0].role, Role::User);
        assert_eq!(memory.turns()[1].role, Role::Bot);
    }

    #[test]
    fn test_render_history() {
        let mut memory = ConversationMemory::new();
        memory.push_user("Hello");
        memory.push_bot("Hi there");
        memory.push_user("Another question");

        let history = memory.render_history(1);
        assert_eq!(history, "User: Hello\nBot: Hi there");

        let full = memory.render_history(0);
        assert!(full.ends_with("User: Another question"));
    }

    #[test]
    fn test_render_empty() {
        let memory = ConversationMemory::new();
        assert_eq!(memory.render_history(0), "");
    }
}
