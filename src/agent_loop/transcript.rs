//! Conversation transcript owned by a turn controller.

use crate::types::{Message, Role};

/// Ordered message history whose first element is always a system message.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(system_message: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_message)],
        }
    }

    /// Seed from prior history. A leading system message in `history` is
    /// kept; otherwise `system_message` is prepended.
    pub fn from_history(system_message: impl Into<String>, history: Vec<Message>) -> Self {
        match history.first() {
            Some(first) if first.role() == Role::System => Self { messages: history },
            _ => {
                let mut messages = Vec::with_capacity(history.len() + 1);
                messages.push(Message::system(system_message));
                messages.extend(history);
                Self { messages }
            }
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true: every constructor inserts a system message.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_without_system_gets_one_prepended() {
        let t = Transcript::from_history("sys", vec![Message::user("hi"), Message::assistant("hello", vec![])]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.messages()[0], Message::system("sys"));
    }

    #[test]
    fn history_with_system_is_kept() {
        let t = Transcript::from_history("ignored", vec![Message::system("custom"), Message::user("hi")]);
        assert_eq!(t.messages()[0], Message::system("custom"));
        assert_eq!(t.len(), 2);
    }
}
