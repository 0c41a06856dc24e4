//! Typed reviewer reply schema and its fallback classifier.
//!
//! A reviewer is asked for a bare JSON object, but the reply is LLM-authored.
//! Classification is a tagged three-way split so each fallback path stays
//! independently testable: structured JSON, raw text, or nothing at all.

use crate::plan::PlanRevision;
use crate::report::fenced_json_block;
use serde::Deserialize;

/// Structured reply a well-behaved reviewer returns.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReply {
    pub approved: bool,
    pub feedback: String,
    #[serde(default)]
    pub suggested_changes: Vec<String>,
    #[serde(default)]
    pub revised_plan: Option<PlanRevision>,
}

/// Classification of one reviewer reply.
#[derive(Debug, Clone)]
pub enum ReviewParse {
    Structured(ReviewReply),
    RawText(String),
    Empty,
}

/// Classify a raw reviewer reply.
///
/// Tries the whole trimmed reply as JSON first, then the first fenced json
/// block, then falls back to raw text. Never fails.
pub fn classify_review_reply(raw: &str) -> ReviewParse {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ReviewParse::Empty;
    }
    if let Ok(reply) = serde_json::from_str::<ReviewReply>(trimmed) {
        return ReviewParse::Structured(reply);
    }
    if let Some(body) = fenced_json_block(trimmed) {
        if let Ok(reply) = serde_json::from_str::<ReviewReply>(body) {
            return ReviewParse::Structured(reply);
        }
    }
    ReviewParse::RawText(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/review_schema_tests.rs"]
mod tests;
