//! Heuristic quality scoring for check-in messages.
//!
//! Three independent signals each contribute one point; a message is Good
//! when at least two fire. Pure and deterministic, no I/O, no failure
//! modes.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Keywords that indicate the message talks about actual work state.
const KEYWORDS: &[&str] = &["completed", "blocked", "planning", "done", "help", "stuck"];

/// Section labels that mark a structured standup-style update.
const SECTION_HEADERS: &[&str] = &[
    "yesterday:",
    "today:",
    "blockers:",
    "completed:",
    "planning:",
];

/// Trimmed length a message must exceed to earn the length point.
const MIN_DETAIL_LEN: usize = 50;

fn bullet_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:[-*\u{2022}]|\d+\.)\s").expect("valid bullet pattern")
    })
}

/// Quality label assigned to a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLabel {
    Good,
    Bad,
}

impl QualityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Good => "good",
            QualityLabel::Bad => "bad",
        }
    }
}

/// Which signals fired (or why none did).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonTag {
    Length,
    Keyword,
    Structure,
    InsufficientDetail,
}

/// Structured result of a quality assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityResult {
    pub label: QualityLabel,
    pub reasons: Vec<ReasonTag>,
}

/// Score a check-in message.
pub fn assess(message: &str) -> QualityResult {
    let normalized = message.trim().to_lowercase();
    let mut reasons = Vec::new();

    let has_length = normalized.chars().count() > MIN_DETAIL_LEN;
    if has_length {
        reasons.push(ReasonTag::Length);
    }

    let has_keyword = KEYWORDS.iter().any(|k| normalized.contains(k));
    if has_keyword {
        reasons.push(ReasonTag::Keyword);
    }

    let has_structure = bullet_line_re().is_match(message)
        || SECTION_HEADERS.iter().any(|h| normalized.contains(h));
    if has_structure {
        reasons.push(ReasonTag::Structure);
    }

    let score = [has_length, has_keyword, has_structure]
        .iter()
        .filter(|s| **s)
        .count();
    let label = if score >= 2 {
        QualityLabel::Good
    } else {
        QualityLabel::Bad
    };

    if reasons.is_empty() {
        reasons.push(ReasonTag::InsufficientDetail);
    }
    QualityResult { label, reasons }
}
