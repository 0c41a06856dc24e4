//! Tolerant parsing of subagent reports.
//!
//! Workers are asked to end their reply with a fenced ```json block, but the
//! output is LLM-authored and unreliable. Parsing therefore never fails:
//! fenced JSON is used when present and shaped right, anything else falls
//! back to the raw trimmed text.

use regex::Regex;
use serde::Deserialize;

/// Structured payload a well-behaved worker embeds in its reply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportPayload {
    pub summary: Option<String>,
    pub findings: Vec<String>,
    pub decisions: Vec<String>,
    pub blockers: Vec<String>,
    pub artifacts: Vec<String>,
}

impl ReportPayload {
    /// A payload counts as shape-valid only if at least one known field
    /// carries content. An arbitrary JSON object deserializes into all
    /// defaults and must not shadow the raw-text fallback.
    pub fn has_content(&self) -> bool {
        self.summary.is_some()
            || !self.findings.is_empty()
            || !self.decisions.is_empty()
            || !self.blockers.is_empty()
            || !self.artifacts.is_empty()
    }
}

/// Classification of a raw reply, one variant per fallback path.
#[derive(Debug, Clone)]
pub enum ParsedReply {
    Structured(ReportPayload),
    RawText(String),
    Empty,
}

/// Usable report distilled from an arbitrary reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubagentReport {
    pub summary: String,
    pub findings: Vec<String>,
}

/// Return the body of the first fenced ```json block, if any.
pub(crate) fn fenced_json_block(text: &str) -> Option<&str> {
    let re = Regex::new(r"(?s)```json\s*(\{.*?\})\s*```")
        .expect("regex to extract a fenced json block");
    re.captures(text)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str())
}

/// Classify a raw reply into one of the three fallback paths.
pub fn classify_reply(raw: &str) -> ParsedReply {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedReply::Empty;
    }
    if let Some(body) = fenced_json_block(trimmed) {
        if let Ok(payload) = serde_json::from_str::<ReportPayload>(body) {
            if payload.has_content() {
                return ParsedReply::Structured(payload);
            }
        }
    }
    ParsedReply::RawText(trimmed.to_string())
}

/// Distill any reply into a usable report.
///
/// `context` names the worker (a question, a node) and only appears in
/// placeholder summaries when the reply itself carries nothing usable.
pub fn parse_report(raw: &str, context: &str) -> SubagentReport {
    match classify_reply(raw) {
        ParsedReply::Structured(payload) => SubagentReport {
            summary: payload
                .summary
                .unwrap_or_else(|| format!("(no summary from {context})")),
            findings: payload.findings,
        },
        ParsedReply::RawText(text) => SubagentReport {
            summary: text,
            findings: Vec::new(),
        },
        ParsedReply::Empty => SubagentReport {
            summary: format!("(no output from {context})"),
            findings: Vec::new(),
        },
    }
}
