use chrono::{DateTime, Local};

use crate::envelope::ResultLink;

/// Identifier shared by conversation entries and upload notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

/// Hands out strictly increasing ids, so two entries created within the
/// same clock tick still get distinct ids.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn next_id(&mut self) -> EntryId {
        self.next += 1;
        EntryId(self.next)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: EntryId,
    pub query: String,
    /// Markdown-subset text, see [`crate::format`].
    pub response: String,
    pub links: Vec<ResultLink>,
    pub created_at: DateTime<Local>,
}

/// Ordered log of completed exchanges. Display order is insertion order.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Drops every entry (used by "new chat").
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn get(&self, id: EntryId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(ids: &mut IdGenerator, query: &str) -> ChatMessage {
        ChatMessage {
            id: ids.next_id(),
            query: query.to_string(),
            response: format!("answer to {}", query),
            links: Vec::new(),
            created_at: Local::now(),
        }
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut ids = IdGenerator::default();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_insertion_order_and_clear() {
        let mut ids = IdGenerator::default();
        let mut conversation = Conversation::new();
        conversation.push(message(&mut ids, "first"));
        conversation.push(message(&mut ids, "second"));

        let queries: Vec<&str> = conversation.messages().iter().map(|m| m.query.as_str()).collect();
        assert_eq!(queries, vec!["first", "second"]);
        assert_eq!(conversation.last().map(|m| m.query.as_str()), Some("second"));

        conversation.clear();
        assert!(conversation.is_empty());
        assert_eq!(conversation.len(), 0);
    }

    #[test]
    fn test_get_by_id() {
        let mut ids = IdGenerator::default();
        let mut conversation = Conversation::new();
        let entry = message(&mut ids, "osmosis?");
        let id = entry.id;
        conversation.push(entry);
        conversation.push(message(&mut ids, "diffusion?"));

        assert_eq!(conversation.get(id).map(|m| m.query.as_str()), Some("osmosis?"));
    }
}
