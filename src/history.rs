use unicode_width::UnicodeWidthChar;

use crate::conversation::{Conversation, EntryId};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub prompt: String,
    pub preview: String,
    pub time_label: String,
}

/// Newest-first view of the asked queries, for the history panel.
pub fn list_entries(
    conversation: &Conversation,
    limit: usize,
    preview_width: usize,
) -> Vec<HistoryEntry> {
    conversation
        .messages()
        .iter()
        .rev()
        .take(limit)
        .map(|m| HistoryEntry {
            id: m.id,
            prompt: m.query.clone(),
            preview: truncate_to_width(&m.query, preview_width),
            time_label: m.created_at.format("%H:%M").to_string(),
        })
        .collect()
}

pub fn get_entry(conversation: &Conversation, id: EntryId) -> Option<HistoryEntry> {
    conversation.get(id).map(|m| HistoryEntry {
        id: m.id,
        prompt: m.query.clone(),
        preview: m.query.clone(),
        time_label: m.created_at.format("%H:%M").to_string(),
    })
}

/// Cuts `text` to at most `width` terminal columns, ending in `…` when cut.
/// Newlines collapse to spaces.
fn truncate_to_width(text: &str, width: usize) -> String {
    let flat: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let total: usize = flat.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return flat;
    }

    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for c in flat.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ChatMessage, IdGenerator};
    use chrono::Local;

    fn conversation_with(queries: &[&str]) -> Conversation {
        let mut ids = IdGenerator::default();
        let mut conversation = Conversation::new();
        for q in queries {
            conversation.push(ChatMessage {
                id: ids.next_id(),
                query: q.to_string(),
                response: String::new(),
                links: Vec::new(),
                created_at: Local::now(),
            });
        }
        conversation
    }

    #[test]
    fn test_newest_first_with_limit() {
        let conversation = conversation_with(&["one", "two", "three"]);
        let entries = list_entries(&conversation, 2, 40);
        let prompts: Vec<&str> = entries.iter().map(|e| e.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["three", "two"]);
    }

    #[test]
    fn test_listing_does_not_mutate() {
        let conversation = conversation_with(&["one", "two"]);
        let _ = list_entries(&conversation, 10, 40);
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("summarize chapter four", 10), "summarize…");
        assert_eq!(truncate_to_width("line one\nline two", 40), "line one line two");
    }

    #[test]
    fn test_truncate_wide_chars() {
        // Each CJK character is two columns wide.
        assert_eq!(truncate_to_width("光合作用とは", 7), "光合作…");
    }

    #[test]
    fn test_get_entry() {
        let conversation = conversation_with(&["what is ATP?"]);
        let id = conversation.messages()[0].id;
        let entry = get_entry(&conversation, id).expect("entry exists");
        assert_eq!(entry.prompt, "what is ATP?");
    }
}
