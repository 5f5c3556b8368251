//! Metadata-filter inference for reference retrieval. An ordered rule
//! cascade decides whether a query is clearly about one handbook or
//! about the regulations, so the first search pass can be narrowed.
//! At most one rule fires; no rule firing means no filter.

use std::sync::LazyLock;

use regex::Regex;

use crate::exam::types::RagFilterHint;

pub const DOC_TYPE_REGULATION: &str = "regulation";

/// Handbook rules, most specific first. Bare abbreviations that double
/// as English words (AIM) only match uppercase; full titles match in
/// any case.
const HANDBOOK_RULES: &[(&str, &str)] = &[
    ("PHAK", r"(?i:\bphak\b|pilot'?s handbook of aeronautical knowledge|pilot'?s handbook\b)"),
    ("AFH", r"(?i:\bafh\b|airplane flying handbook)"),
    ("AIM", r"\bAIM\b|(?i:aeronautical information manual)"),
    ("POH", r"(?i:\bpoh\b|pilot'?s operating handbook)"),
    ("AFM", r"(?i:\bafm\b|airplane flight manual)"),
    ("ACS", r"\bACS\b|(?i:airman certification standards)"),
    ("AC", r"(?i:advisory circular|\bac\s+\d{1,3}-\d+)"),
];

static HANDBOOK_MATCHERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    HANDBOOK_RULES
        .iter()
        .map(|(abbr, pattern)| (*abbr, Regex::new(pattern).unwrap()))
        .collect()
});

// A regulatory reference needs a concrete part or section number, or
// an explicit regulatory keyword. "14 CFR" on its own is incidental.
static RE_PART_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpart\s+\d{1,3}\b").unwrap());

static RE_SECTION_SYMBOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"§\s*\d").unwrap());

static RE_SECTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\b").unwrap());

static RE_CFR_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bcfr\b").unwrap());

// FAR the abbreviation, not "far" the word.
static RE_FAR_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bFAR\b").unwrap());

static RE_REGULATORY_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bregulations?\b|\bregulatory\b").unwrap());

/// Infers a retrieval filter from free text. Handbook mentions beat the
/// regulation rule; the regulation rule needs a specific section or
/// part reference, or a regulatory keyword.
pub fn infer_filters(text: &str) -> RagFilterHint {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return RagFilterHint::none();
    }

    for (abbr, matcher) in HANDBOOK_MATCHERS.iter() {
        if matcher.is_match(trimmed) {
            return RagFilterHint::abbreviation(abbr);
        }
    }

    if is_regulatory_reference(trimmed) {
        return RagFilterHint::doc_type(DOC_TYPE_REGULATION);
    }

    RagFilterHint::none()
}

fn is_regulatory_reference(text: &str) -> bool {
    if RE_PART_NUMBER.is_match(text) || RE_SECTION_SYMBOL.is_match(text) {
        return true;
    }
    if (RE_CFR_MENTION.is_match(text) || RE_FAR_MENTION.is_match(text))
        && RE_SECTION_NUMBER.is_match(text)
    {
        return true;
    }
    RE_REGULATORY_KEYWORD.is_match(text)
}
