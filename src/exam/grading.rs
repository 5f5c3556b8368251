//! Deterministic session grading from the graded-attempt log.

use std::collections::{BTreeMap, HashMap};

use super::types::{
    area_prefix, AreaBreakdown, AttemptOutcome, EndTrigger, ExamGrade, ExamResult, GradedAttempt,
};

/// Passing bar applied to the deduplicated score.
pub const PASS_THRESHOLD: f64 = 0.70;

/// Computes the final result for a session.
///
/// Attempts are deduplicated by element code, last write wins, so a
/// retried element counts once at its most recent outcome. The grade is
/// `incomplete` when nothing was asked, or when the session ended
/// without explicit user action before covering what the scope
/// requires; a user-initiated end is graded only against what was
/// actually asked.
pub fn compute_result(
    attempts: &[GradedAttempt],
    total_elements_in_scope: usize,
    trigger: EndTrigger,
) -> ExamResult {
    let mut latest: HashMap<&str, AttemptOutcome> = HashMap::new();
    for attempt in attempts {
        latest.insert(attempt.element_code.as_str(), attempt.outcome);
    }

    let asked_count = latest.len();
    let score_percentage = if asked_count == 0 {
        0.0
    } else {
        let total: f64 = latest.values().map(|o| o.points()).sum();
        total / asked_count as f64
    };

    let grade = if asked_count == 0 {
        ExamGrade::Incomplete
    } else if trigger != EndTrigger::UserEnded && asked_count < total_elements_in_scope {
        ExamGrade::Incomplete
    } else if score_percentage >= PASS_THRESHOLD {
        ExamGrade::Satisfactory
    } else {
        ExamGrade::Unsatisfactory
    };

    let mut by_area: BTreeMap<String, AreaBreakdown> = BTreeMap::new();
    for (code, outcome) in &latest {
        let area = area_prefix(code).to_string();
        let entry = by_area.entry(area.clone()).or_insert_with(|| AreaBreakdown {
            area,
            ..Default::default()
        });
        entry.asked += 1;
        match outcome {
            AttemptOutcome::Satisfactory => entry.satisfactory += 1,
            AttemptOutcome::Unsatisfactory => entry.unsatisfactory += 1,
            AttemptOutcome::Partial => {}
        }
    }

    ExamResult {
        score_percentage,
        grade,
        asked_count,
        area_breakdown: by_area.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(code: &str, outcome: AttemptOutcome) -> GradedAttempt {
        GradedAttempt {
            element_code: code.to_string(),
            outcome,
            asked_at: 0,
        }
    }

    #[test]
    fn test_mixed_outcomes_score() {
        let attempts = vec![
            attempt("PA.I.A.K1", AttemptOutcome::Satisfactory),
            attempt("PA.I.A.K2", AttemptOutcome::Partial),
            attempt("PA.II.B.K1", AttemptOutcome::Unsatisfactory),
        ];
        let result = compute_result(&attempts, 3, EndTrigger::Natural);
        assert!((result.score_percentage - (1.0 + 0.7) / 3.0).abs() < 1e-9);
        assert_eq!(result.grade, ExamGrade::Unsatisfactory);
        assert_eq!(result.asked_count, 3);
    }

    #[test]
    fn test_dedupe_last_write_wins() {
        let attempts = vec![
            attempt("PA.I.A.K1", AttemptOutcome::Unsatisfactory),
            attempt("PA.I.A.K1", AttemptOutcome::Satisfactory),
        ];
        let result = compute_result(&attempts, 1, EndTrigger::Natural);
        assert_eq!(result.asked_count, 1);
        assert_eq!(result.score_percentage, 1.0);
        assert_eq!(result.grade, ExamGrade::Satisfactory);
    }

    #[test]
    fn test_nothing_asked_is_incomplete() {
        let result = compute_result(&[], 10, EndTrigger::UserEnded);
        assert_eq!(result.grade, ExamGrade::Incomplete);
        assert_eq!(result.score_percentage, 0.0);
        assert_eq!(result.asked_count, 0);
        assert!(result.area_breakdown.is_empty());
    }

    #[test]
    fn test_user_end_graded_on_asked_only() {
        let attempts = vec![
            attempt("PA.I.A.K1", AttemptOutcome::Satisfactory),
            attempt("PA.I.A.K2", AttemptOutcome::Satisfactory),
        ];
        // 100-element scope, user stopped after two: still a pass.
        let result = compute_result(&attempts, 100, EndTrigger::UserEnded);
        assert_eq!(result.grade, ExamGrade::Satisfactory);
        assert_eq!(result.score_percentage, 1.0);
    }

    #[test]
    fn test_system_end_short_of_scope_is_incomplete() {
        let attempts = vec![attempt("PA.I.A.K1", AttemptOutcome::Satisfactory)];
        let result = compute_result(&attempts, 5, EndTrigger::System);
        assert_eq!(result.grade, ExamGrade::Incomplete);

        let natural = compute_result(&attempts, 5, EndTrigger::Natural);
        assert_eq!(natural.grade, ExamGrade::Incomplete);
    }

    #[test]
    fn test_exact_threshold_passes() {
        let attempts = vec![attempt("PA.I.A.K1", AttemptOutcome::Partial)];
        let result = compute_result(&attempts, 1, EndTrigger::Natural);
        assert_eq!(result.grade, ExamGrade::Satisfactory);
    }

    #[test]
    fn test_area_breakdown() {
        let attempts = vec![
            attempt("PA.I.A.K1", AttemptOutcome::Satisfactory),
            attempt("PA.I.B.K1", AttemptOutcome::Partial),
            attempt("PA.II.A.K1", AttemptOutcome::Unsatisfactory),
            attempt("PA.II.A.R1", AttemptOutcome::Satisfactory),
        ];
        let result = compute_result(&attempts, 4, EndTrigger::Natural);

        assert_eq!(result.area_breakdown.len(), 2);
        let first = &result.area_breakdown[0];
        assert_eq!(first.area, "PA.I");
        assert_eq!(first.asked, 2);
        assert_eq!(first.satisfactory, 1);
        assert_eq!(first.unsatisfactory, 0);

        let second = &result.area_breakdown[1];
        assert_eq!(second.area, "PA.II");
        assert_eq!(second.asked, 2);
        assert_eq!(second.satisfactory, 1);
        assert_eq!(second.unsatisfactory, 1);
    }
}
