//! Renders the small markdown subset the backend speaks into display blocks.
//!
//! Only two paragraph shapes exist: a numbered item with a bold title
//! (`3. **Title**: description`) and free text with `**bold**` spans.
//! Anything else (links, code, headers) is left as plain text.

use once_cell::sync::Lazy;
use regex::Regex;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("paragraph pattern is valid"));

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(\d+)\.\s+\*\*(.+?)\*\*:?\s*(.*)$").expect("list item pattern is valid")
});

static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\*\*(.+?)\*\*").expect("emphasis pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Plain(String),
    Emphasis(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// `<number>. **<title>**: <description>`
    ListItem {
        number: String,
        title: String,
        description: String,
    },
    Paragraph(Vec<Inline>),
}

/// Splits `text` on blank lines and classifies each non-empty paragraph.
pub fn format_response(text: &str) -> Vec<Block> {
    let normalized = text.replace("\r\n", "\n");

    PARAGRAPH_BREAK
        .split(&normalized)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(format_paragraph)
        .collect()
}

fn format_paragraph(paragraph: &str) -> Block {
    if let Some(caps) = LIST_ITEM.captures(paragraph) {
        return Block::ListItem {
            number: caps[1].to_string(),
            title: caps[2].trim().to_string(),
            description: caps[3].trim().to_string(),
        };
    }

    Block::Paragraph(split_emphasis(paragraph))
}

fn split_emphasis(paragraph: &str) -> Vec<Inline> {
    let mut inlines = Vec::new();
    let mut cursor = 0;

    for caps in EMPHASIS.captures_iter(paragraph) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > cursor {
            inlines.push(Inline::Plain(paragraph[cursor..whole.start()].to_string()));
        }
        inlines.push(Inline::Emphasis(inner.as_str().to_string()));
        cursor = whole.end();
    }

    if cursor < paragraph.len() {
        inlines.push(Inline::Plain(paragraph[cursor..].to_string()));
    }

    inlines
}

/// Plain-text rendition of the blocks, used for clipboard copies.
pub fn to_plain_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| match block {
            Block::ListItem {
                number,
                title,
                description,
            } if description.is_empty() => format!("{}. {}", number, title),
            Block::ListItem {
                number,
                title,
                description,
            } => format!("{}. {}: {}", number, title, description),
            Block::Paragraph(inlines) => inlines
                .iter()
                .map(|inline| match inline {
                    Inline::Plain(s) | Inline::Emphasis(s) => s.as_str(),
                })
                .collect::<String>(),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
