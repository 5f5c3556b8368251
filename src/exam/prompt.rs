//! Prompt assembly for the examiner turns. The generator is a black
//! box: it gets a system prompt, the element under test and formatted
//! grounding passages, and must answer with strict JSON.

use super::types::ChunkSearchResult;

const MAX_PASSAGE_CHARS: usize = 900;

pub const EXAMINER_SYSTEM_PROMPT: &str = r#"You are an FAA designated pilot examiner conducting the oral portion of a practical test. Ask exactly one clear question that tests the given ACS element, grounded in the supplied reference passages when they are relevant. Do not answer the question yourself.
Output strict JSON: {"question":"...","relatedElementCodes":["PA.I.A.K2"]} where relatedElementCodes lists other ACS element codes your question happens to touch (empty array if none)."#;

pub const ASSESSOR_SYSTEM_PROMPT: &str = r#"You are an FAA designated pilot examiner evaluating an applicant's oral answer against the ACS element being tested. Judge correctness and completeness, not eloquence. Use the supplied reference passages as the authority when they apply.
Output strict JSON: {"outcome":"satisfactory|partial|unsatisfactory","quickFeedback":"one sentence","detailedFeedback":"2-4 sentences citing what was right or missing"}"#;

/// Numbered reference block handed to the generator. Empty input
/// produces an empty string so the caller can skip the section.
pub fn format_grounding(passages: &[ChunkSearchResult]) -> String {
    if passages.is_empty() {
        return String::new();
    }

    let mut out = String::from("Reference passages:\n");
    for (i, p) in passages.iter().enumerate() {
        let mut source = p.doc_title.clone();
        if let Some(abbr) = &p.doc_abbreviation {
            source.push_str(&format!(" ({abbr})"));
        }
        if let Some(heading) = &p.heading {
            source.push_str(&format!(", {heading}"));
        }
        match (p.page_start, p.page_end) {
            (Some(a), Some(b)) if a != b => source.push_str(&format!(", pp. {a}-{b}")),
            (Some(a), _) => source.push_str(&format!(", p. {a}")),
            _ => {}
        }

        let content = truncate_chars(&p.content, MAX_PASSAGE_CHARS);
        out.push_str(&format!("[{}] {}\n{}\n\n", i + 1, source, content));
    }
    out
}

#[derive(Debug, Clone)]
pub struct QuestionPromptInput<'a> {
    pub element_code: &'a str,
    pub element_description: &'a str,
    pub area_name: &'a str,
    pub task_name: &'a str,
    pub attempt_number: u32,
    pub grounding: &'a str,
}

pub fn build_question_prompt(input: &QuestionPromptInput<'_>) -> String {
    let follow_up = if input.attempt_number > 1 {
        format!(
            "\nThis is follow-up attempt {} on the same element; probe the part the applicant previously missed from a different angle.",
            input.attempt_number
        )
    } else {
        String::new()
    };

    let grounding = if input.grounding.is_empty() {
        String::new()
    } else {
        format!("\n\n{}", input.grounding)
    };

    format!(
        "Area of operation: {}\nTask: {}\nElement {}: {}{}{}",
        input.area_name,
        input.task_name,
        input.element_code,
        input.element_description,
        follow_up,
        grounding
    )
}

#[derive(Debug, Clone)]
pub struct AssessmentPromptInput<'a> {
    pub element_code: &'a str,
    pub element_description: &'a str,
    pub question: &'a str,
    pub answer: &'a str,
    pub grounding: &'a str,
}

pub fn build_assessment_prompt(input: &AssessmentPromptInput<'_>) -> String {
    let grounding = if input.grounding.is_empty() {
        String::new()
    } else {
        format!("\n\n{}", input.grounding)
    };

    format!(
        "Element {}: {}\nQuestion asked: {}\nApplicant's answer: {}{}",
        input.element_code, input.element_description, input.question, input.answer, grounding
    )
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(title: &str, abbr: Option<&str>, content: &str) -> ChunkSearchResult {
        ChunkSearchResult {
            id: "c1".into(),
            document_id: "d1".into(),
            heading: Some("Weather Minimums".into()),
            content: content.into(),
            page_start: Some(3),
            page_end: Some(4),
            doc_title: title.into(),
            doc_abbreviation: abbr.map(|s| s.to_string()),
            score: 0.9,
        }
    }

    #[test]
    fn test_empty_grounding_is_empty_string() {
        assert_eq!(format_grounding(&[]), "");
    }

    #[test]
    fn test_grounding_block_carries_source_line() {
        let block = format_grounding(&[passage(
            "Aeronautical Information Manual",
            Some("AIM"),
            "VFR visibility requirements...",
        )]);
        assert!(block.contains("[1] Aeronautical Information Manual (AIM), Weather Minimums, pp. 3-4"));
        assert!(block.contains("VFR visibility requirements"));
    }

    #[test]
    fn test_long_passages_truncated() {
        let long = "x".repeat(5000);
        let block = format_grounding(&[passage("PHAK", None, &long)]);
        assert!(block.len() < 1200);
        assert!(block.contains('…'));
    }

    #[test]
    fn test_follow_up_notice_only_on_retry() {
        let base = QuestionPromptInput {
            element_code: "PA.I.A.K1",
            element_description: "Certification requirements, currency, and experience.",
            area_name: "Preflight Preparation",
            task_name: "Pilot Qualifications",
            attempt_number: 1,
            grounding: "",
        };
        assert!(!build_question_prompt(&base).contains("follow-up"));

        let retry = QuestionPromptInput {
            attempt_number: 2,
            ..base
        };
        assert!(build_question_prompt(&retry).contains("follow-up attempt 2"));
    }
}
