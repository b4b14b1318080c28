//! Query responses arrive as a tagged JSON envelope (`"type": ...`). This
//! module turns each shape into the markdown subset understood by
//! [`crate::format`], plus the clickable links of web results.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const NO_RESULTS: &str = "No results found.";
const NO_PASSAGES: &str = "No matching passages found in your documents.";
const DIVIDER: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLink {
    pub title: String,
    pub url: String,
}

/// Text stored on a conversation entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rendered {
    pub text: String,
    pub links: Vec<ResultLink>,
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileSummary {
    pub file: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageSummary {
    pub file: String,
    #[serde(default, alias = "page_numbers", deserialize_with = "null_as_default")]
    pub pages: Vec<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConceptHit {
    pub file: String,
    pub page: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relevance_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preview_summary: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SerpResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, alias = "url", deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    FullPdfSummary {
        summaries: Vec<FileSummary>,
    },
    PageSummary {
        summaries: Vec<PageSummary>,
    },
    ConceptSearch {
        expert_summary: Option<String>,
        core_keyword: Option<String>,
        results: Vec<ConceptHit>,
    },
    SerpFallback {
        expert_summary: Option<String>,
        core_keyword: Option<String>,
        results: Vec<SerpResult>,
    },
    Error {
        response: String,
    },
    /// Unknown tag, or a known tag whose payload did not match.
    Other(Value),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Tagged {
    // The list fields are required: without them the payload is not a
    // summary or a search result and falls back to `Envelope::Other`.
    FullPdfSummary {
        #[serde(alias = "results")]
        summaries: Vec<FileSummary>,
    },
    PageSummary {
        #[serde(alias = "results")]
        summaries: Vec<PageSummary>,
    },
    ConceptSearch {
        expert_summary: Option<String>,
        core_keyword: Option<String>,
        results: Vec<ConceptHit>,
    },
    SerpFallback {
        expert_summary: Option<String>,
        core_keyword: Option<String>,
        serp_results: Option<Vec<SerpResult>>,
    },
    Error {
        response: String,
    },
}

impl From<Tagged> for Envelope {
    fn from(tagged: Tagged) -> Self {
        match tagged {
            Tagged::FullPdfSummary { summaries } => Envelope::FullPdfSummary { summaries },
            Tagged::PageSummary { summaries } => Envelope::PageSummary { summaries },
            Tagged::ConceptSearch {
                expert_summary,
                core_keyword,
                results,
            } => Envelope::ConceptSearch {
                expert_summary,
                core_keyword,
                results,
            },
            Tagged::SerpFallback {
                expert_summary,
                core_keyword,
                serp_results,
            } => Envelope::SerpFallback {
                expert_summary,
                core_keyword,
                results: serp_results.unwrap_or_default(),
            },
            Tagged::Error { response } => Envelope::Error { response },
        }
    }
}

impl Envelope {
    /// Never fails: anything that does not match a known shape becomes
    /// [`Envelope::Other`].
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<Tagged>(value.clone()) {
            Ok(tagged) => tagged.into(),
            Err(e) => {
                tracing::debug!(error = %e, "envelope did not match a known shape");
                Envelope::Other(value)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::FullPdfSummary { .. } => "full_pdf_summary",
            Envelope::PageSummary { .. } => "page_summary",
            Envelope::ConceptSearch { .. } => "concept_search",
            Envelope::SerpFallback { .. } => "serp_fallback",
            Envelope::Error { .. } => "error",
            Envelope::Other(_) => "other",
        }
    }

    pub fn render(&self) -> Rendered {
        match self {
            Envelope::FullPdfSummary { summaries } => Rendered {
                text: join_blocks(
                    summaries
                        .iter()
                        .map(|s| titled_block(&format!("Summary of {}", s.file), &s.summary)),
                ),
                links: Vec::new(),
            },
            Envelope::PageSummary { summaries } => Rendered {
                text: join_blocks(summaries.iter().map(|s| {
                    let title = if s.pages.is_empty() {
                        format!("Summary of {}", s.file)
                    } else {
                        let pages: Vec<String> = s.pages.iter().map(u32::to_string).collect();
                        format!("Summary of {} (pages {})", s.file, pages.join(", "))
                    };
                    titled_block(&title, &s.summary)
                })),
                links: Vec::new(),
            },
            Envelope::ConceptSearch {
                expert_summary,
                core_keyword,
                results,
            } => {
                let mut paragraphs = preamble(expert_summary, core_keyword);
                if results.is_empty() {
                    paragraphs.push(NO_PASSAGES.to_string());
                }
                paragraphs.extend(results.iter().enumerate().map(|(i, hit)| {
                    format!(
                        "{}. **{} (page {})**: relevance {:.2} - {}",
                        i + 1,
                        hit.file,
                        hit.page,
                        hit.relevance_score,
                        hit.preview_summary.trim()
                    )
                }));
                Rendered {
                    text: paragraphs.join("\n\n"),
                    links: Vec::new(),
                }
            }
            Envelope::SerpFallback {
                expert_summary,
                core_keyword,
                results,
            } => {
                let mut paragraphs = preamble(expert_summary, core_keyword);
                if results.is_empty() {
                    paragraphs.push(NO_RESULTS.to_string());
                }
                paragraphs.extend(results.iter().enumerate().map(|(i, result)| {
                    format!("{}. **{}**: {}", i + 1, result.title, result.snippet.trim())
                }));
                let links = results
                    .iter()
                    .filter(|r| !r.link.is_empty())
                    .map(|r| ResultLink {
                        title: r.title.clone(),
                        url: r.link.clone(),
                    })
                    .collect();
                Rendered {
                    text: paragraphs.join("\n\n"),
                    links,
                }
            }
            Envelope::Error { response } => Rendered {
                text: response.clone(),
                links: Vec::new(),
            },
            Envelope::Other(value) => Rendered {
                text: match value.get("response").and_then(Value::as_str) {
                    Some(response) => response.to_string(),
                    None => value.to_string(),
                },
                links: Vec::new(),
            },
        }
    }
}

fn titled_block(title: &str, body: &str) -> String {
    format!("**{}**\n\n{}", title, body.trim())
}

fn join_blocks(blocks: impl Iterator<Item = String>) -> String {
    blocks
        .collect::<Vec<_>>()
        .join(&format!("\n\n{}\n\n", DIVIDER))
}

fn preamble(expert_summary: &Option<String>, core_keyword: &Option<String>) -> Vec<String> {
    let mut paragraphs = Vec::new();
    if let Some(summary) = expert_summary.as_deref().filter(|s| !s.trim().is_empty()) {
        paragraphs.push(format!("**Expert summary**: {}", summary.trim()));
    }
    if let Some(keyword) = core_keyword.as_deref().filter(|s| !s.trim().is_empty()) {
        paragraphs.push(format!("**Core keyword**: {}", keyword.trim()));
    }
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{format_response, Block};
    use serde_json::json;

    #[test]
    fn test_full_pdf_summary_blocks_with_divider() {
        let envelope = Envelope::from_value(json!({
            "type": "full_pdf_summary",
            "summaries": [
                {"file": "bio.pdf", "summary": "Cells."},
                {"file": "chem.pdf", "summary": "Atoms."}
            ]
        }));
        let rendered = envelope.render();
        assert_eq!(
            rendered.text,
            "**Summary of bio.pdf**\n\nCells.\n\n---\n\n**Summary of chem.pdf**\n\nAtoms."
        );
    }

    #[test]
    fn test_page_summary_lists_pages() {
        let envelope = Envelope::from_value(json!({
            "type": "page_summary",
            "summaries": [{"file": "bio.pdf", "pages": [2, 3], "summary": "Membranes."}]
        }));
        assert!(envelope
            .render()
            .text
            .starts_with("**Summary of bio.pdf (pages 2, 3)**"));
    }

    #[test]
    fn test_concept_search_first_item() {
        let envelope = Envelope::from_value(json!({
            "type": "concept_search",
            "results": [{"file": "a.pdf", "page": 3, "relevance_score": 0.9, "preview_summary": "p"}],
            "expert_summary": "E",
            "core_keyword": "K"
        }));
        let rendered = envelope.render();
        assert!(rendered.text.starts_with("**Expert summary**: E\n\n**Core keyword**: K"));

        let blocks = format_response(&rendered.text);
        let item = blocks
            .iter()
            .find_map(|b| match b {
                Block::ListItem {
                    number,
                    title,
                    description,
                } if number == "1" => Some((title.clone(), description.clone())),
                _ => None,
            })
            .expect("item 1 is rendered");
        assert!(item.0.contains("a.pdf"));
        assert!(item.0.contains("page 3"));
        assert!(item.1.contains('p'));
    }

    #[test]
    fn test_serp_fallback_empty_results() {
        let envelope = Envelope::from_value(json!({
            "type": "serp_fallback",
            "expert_summary": "E",
            "core_keyword": "K",
            "serp_results": []
        }));
        let rendered = envelope.render();
        assert!(rendered.text.contains(NO_RESULTS));
        assert!(rendered.links.is_empty());
    }

    #[test]
    fn test_serp_fallback_missing_results() {
        let envelope = Envelope::from_value(json!({"type": "serp_fallback"}));
        assert_eq!(envelope.render().text, NO_RESULTS);
    }

    #[test]
    fn test_serp_fallback_links() {
        let envelope = Envelope::from_value(json!({
            "type": "serp_fallback",
            "serp_results": [
                {"title": "Osmosis", "link": "https://example.com/osmosis", "snippet": "water moves"}
            ]
        }));
        let rendered = envelope.render();
        assert_eq!(rendered.text, "1. **Osmosis**: water moves");
        assert_eq!(
            rendered.links,
            vec![ResultLink {
                title: "Osmosis".to_string(),
                url: "https://example.com/osmosis".to_string(),
            }]
        );
    }

    #[test]
    fn test_error_is_verbatim() {
        let envelope = Envelope::from_value(json!({"type": "error", "response": "**No PDF** uploaded"}));
        assert_eq!(envelope.kind(), "error");
        assert_eq!(envelope.render().text, "**No PDF** uploaded");
    }

    #[test]
    fn test_unknown_tag_uses_response_field() {
        let envelope = Envelope::from_value(json!({"type": "chitchat", "response": "Hello!"}));
        assert_eq!(envelope.kind(), "other");
        assert_eq!(envelope.render().text, "Hello!");
    }

    #[test]
    fn test_unknown_tag_without_response_is_serialized() {
        let value = json!({"type": "mystery", "data": [1, 2]});
        let envelope = Envelope::from_value(value.clone());
        assert_eq!(envelope.render().text, value.to_string());
    }

    #[test]
    fn test_summary_without_list_falls_back() {
        let envelope = Envelope::from_value(json!({
            "type": "full_pdf_summary",
            "response": "Here is your summary"
        }));
        assert_eq!(envelope.kind(), "other");
        assert_eq!(envelope.render().text, "Here is your summary");

        let value = json!({"type": "page_summary", "pages": [1]});
        let envelope = Envelope::from_value(value.clone());
        assert_eq!(envelope.render().text, value.to_string());
    }

    #[test]
    fn test_concept_search_without_results_falls_back() {
        let envelope = Envelope::from_value(json!({
            "type": "concept_search",
            "expert_summary": "E",
            "response": "Nothing indexed yet"
        }));
        assert_eq!(envelope.kind(), "other");
        assert_eq!(envelope.render().text, "Nothing indexed yet");
    }

    #[test]
    fn test_null_fields_keep_results() {
        let envelope = Envelope::from_value(json!({
            "type": "concept_search",
            "expert_summary": "E",
            "core_keyword": null,
            "results": [{"file": "a.pdf", "page": 3, "relevance_score": null, "preview_summary": null}]
        }));
        assert_eq!(envelope.kind(), "concept_search");
        let text = envelope.render().text;
        assert!(text.contains("1. **a.pdf (page 3)**: relevance 0.00 - "));

        let envelope = Envelope::from_value(json!({
            "type": "serp_fallback",
            "serp_results": [{"title": "Osmosis", "link": null, "snippet": null}]
        }));
        let rendered = envelope.render();
        assert_eq!(rendered.text, "1. **Osmosis**: ");
        assert!(rendered.links.is_empty());
    }

    #[test]
    fn test_malformed_known_tag_falls_back() {
        let envelope = Envelope::from_value(json!({
            "type": "concept_search",
            "results": "not a list",
            "response": "fallback text"
        }));
        assert_eq!(envelope.kind(), "other");
        assert_eq!(envelope.render().text, "fallback text");
    }
}
