//! Element queue construction: turns the loaded curriculum plus the
//! session configuration into the ordered backlog of element codes the
//! planner will serve from.

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use super::types::{
    area_segment, AttemptOutcome, Element, ElementScore, ElementType, SessionConfig, StudyMode,
};

const WEIGHT_UNSATISFACTORY: f64 = 5.0;
const WEIGHT_PARTIAL: f64 = 4.0;
const WEIGHT_NEVER_ATTEMPTED: f64 = 3.0;
const WEIGHT_SATISFACTORY: f64 = 1.0;

/// Builds the ordered queue of element codes for one session.
///
/// Deterministic given the same element list, scores and RNG seed. The
/// input is expected in curriculum order (area, task, order index);
/// `linear` mode preserves that order through the filters.
pub fn build_element_queue<R: Rng + ?Sized>(
    elements: &[Element],
    config: &SessionConfig,
    scores: &HashMap<String, ElementScore>,
    rng: &mut R,
) -> Vec<String> {
    let scoped: Vec<&Element> = if !config.selected_tasks.is_empty() {
        elements
            .iter()
            .filter(|e| config.selected_tasks.iter().any(|t| t == &e.task_id))
            .collect()
    } else if !config.selected_areas.is_empty() {
        elements
            .iter()
            .filter(|e| match area_segment(&e.code) {
                Some(area) => config.selected_areas.iter().any(|a| a == area),
                None => false,
            })
            .collect()
    } else {
        elements.iter().collect()
    };

    // Difficulty narrows the scope but never empties it: an
    // over-restrictive choice falls back to the unfiltered scope.
    let by_difficulty: Vec<&Element> = {
        let matching: Vec<&Element> = scoped
            .iter()
            .copied()
            .filter(|e| config.difficulty.matches(e.difficulty))
            .collect();
        if matching.is_empty() {
            scoped
        } else {
            matching
        }
    };

    // Skill elements are evaluated in flight, not in the oral.
    let mut codes: Vec<String> = by_difficulty
        .into_iter()
        .filter(|e| e.element_type != ElementType::Skill)
        .map(|e| e.code.clone())
        .collect();

    match config.study_mode {
        StudyMode::Linear => {}
        StudyMode::Shuffled => codes.shuffle(rng),
        StudyMode::WeaknessWeighted => {
            if scores.is_empty() {
                codes.shuffle(rng);
            } else {
                weakness_shuffle(&mut codes, scores, rng);
            }
        }
    }

    codes
}

/// Weighted random permutation: each code draws `U(0, weight)` and the
/// list is sorted by the draw, descending. Weak items are likely, not
/// guaranteed, to sort first.
fn weakness_shuffle<R: Rng + ?Sized>(
    codes: &mut [String],
    scores: &HashMap<String, ElementScore>,
    rng: &mut R,
) {
    let mut keyed: Vec<(f64, String)> = codes
        .iter()
        .map(|code| {
            let weight = weakness_weight(scores.get(code));
            (rng.random_range(0.0..weight), code.clone())
        })
        .collect();
    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    for (slot, (_, code)) in codes.iter_mut().zip(keyed) {
        *slot = code;
    }
}

fn weakness_weight(score: Option<&ElementScore>) -> f64 {
    match score.and_then(|s| s.latest_score) {
        Some(AttemptOutcome::Unsatisfactory) => WEIGHT_UNSATISFACTORY,
        Some(AttemptOutcome::Partial) => WEIGHT_PARTIAL,
        Some(AttemptOutcome::Satisfactory) => WEIGHT_SATISFACTORY,
        None => WEIGHT_NEVER_ATTEMPTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::types::{AttemptOutcome, Difficulty, DifficultyFilter};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn element(code: &str, task_id: &str, ty: ElementType, difficulty: Difficulty) -> Element {
        Element {
            code: code.to_string(),
            task_id: task_id.to_string(),
            element_type: ty,
            difficulty,
            order_index: 0,
            weight: 1.0,
            description: String::new(),
            tags: vec![],
        }
    }

    fn sample_elements() -> Vec<Element> {
        vec![
            element("PA.I.A.K1", "PA.I.A", ElementType::Knowledge, Difficulty::Easy),
            element("PA.I.A.K2", "PA.I.A", ElementType::Knowledge, Difficulty::Medium),
            element("PA.I.A.R1", "PA.I.A", ElementType::Risk, Difficulty::Medium),
            element("PA.I.A.S1", "PA.I.A", ElementType::Skill, Difficulty::Medium),
            element("PA.II.B.K1", "PA.II.B", ElementType::Knowledge, Difficulty::Hard),
            element("PA.II.B.R1", "PA.II.B", ElementType::Risk, Difficulty::Hard),
        ]
    }

    fn config(mode: StudyMode) -> SessionConfig {
        SessionConfig {
            rating: "PA".into(),
            aircraft_class: None,
            study_mode: mode,
            difficulty: DifficultyFilter::Mixed,
            selected_areas: vec![],
            selected_tasks: vec![],
        }
    }

    #[test]
    fn test_skill_elements_dropped() {
        let mut rng = StdRng::seed_from_u64(1);
        let queue = build_element_queue(
            &sample_elements(),
            &config(StudyMode::Linear),
            &HashMap::new(),
            &mut rng,
        );
        assert!(!queue.iter().any(|c| c == "PA.I.A.S1"));
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn test_linear_preserves_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let queue = build_element_queue(
            &sample_elements(),
            &config(StudyMode::Linear),
            &HashMap::new(),
            &mut rng,
        );
        assert_eq!(
            queue,
            vec!["PA.I.A.K1", "PA.I.A.K2", "PA.I.A.R1", "PA.II.B.K1", "PA.II.B.R1"]
        );
    }

    #[test]
    fn test_selected_tasks_beat_selected_areas() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cfg = config(StudyMode::Linear);
        cfg.selected_areas = vec!["II".into()];
        cfg.selected_tasks = vec!["PA.I.A".into()];
        let queue = build_element_queue(&sample_elements(), &cfg, &HashMap::new(), &mut rng);
        assert_eq!(queue, vec!["PA.I.A.K1", "PA.I.A.K2", "PA.I.A.R1"]);
    }

    #[test]
    fn test_area_scope() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cfg = config(StudyMode::Linear);
        cfg.selected_areas = vec!["II".into()];
        let queue = build_element_queue(&sample_elements(), &cfg, &HashMap::new(), &mut rng);
        assert_eq!(queue, vec!["PA.II.B.K1", "PA.II.B.R1"]);
    }

    #[test]
    fn test_difficulty_filter_applies() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cfg = config(StudyMode::Linear);
        cfg.difficulty = DifficultyFilter::Hard;
        let queue = build_element_queue(&sample_elements(), &cfg, &HashMap::new(), &mut rng);
        assert_eq!(queue, vec!["PA.II.B.K1", "PA.II.B.R1"]);
    }

    #[test]
    fn test_difficulty_filter_fails_open() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cfg = config(StudyMode::Linear);
        cfg.selected_tasks = vec!["PA.I.A".into()];
        cfg.difficulty = DifficultyFilter::Hard;
        // No hard element under PA.I.A: the filter is skipped rather
        // than returning an empty queue.
        let queue = build_element_queue(&sample_elements(), &cfg, &HashMap::new(), &mut rng);
        assert_eq!(queue, vec!["PA.I.A.K1", "PA.I.A.K2", "PA.I.A.R1"]);
    }

    #[test]
    fn test_shuffled_is_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut queue = build_element_queue(
            &sample_elements(),
            &config(StudyMode::Shuffled),
            &HashMap::new(),
            &mut rng,
        );
        queue.sort();
        assert_eq!(
            queue,
            vec!["PA.I.A.K1", "PA.I.A.K2", "PA.I.A.R1", "PA.II.B.K1", "PA.II.B.R1"]
        );
    }

    #[test]
    fn test_weakness_mode_without_scores_falls_back_to_shuffle() {
        let mut rng = StdRng::seed_from_u64(3);
        let queue = build_element_queue(
            &sample_elements(),
            &config(StudyMode::WeaknessWeighted),
            &HashMap::new(),
            &mut rng,
        );
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn test_weak_elements_tend_to_front() {
        let mut scores = HashMap::new();
        scores.insert(
            "PA.I.A.K1".to_string(),
            ElementScore {
                element_code: "PA.I.A.K1".into(),
                latest_score: Some(AttemptOutcome::Satisfactory),
                total_attempts: 3,
            },
        );
        scores.insert(
            "PA.II.B.R1".to_string(),
            ElementScore {
                element_code: "PA.II.B.R1".into(),
                latest_score: Some(AttemptOutcome::Unsatisfactory),
                total_attempts: 2,
            },
        );

        let mut weak_first = 0;
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let queue = build_element_queue(
                &sample_elements(),
                &config(StudyMode::WeaknessWeighted),
                &scores,
                &mut rng,
            );
            let weak = queue.iter().position(|c| c == "PA.II.B.R1");
            let strong = queue.iter().position(|c| c == "PA.I.A.K1");
            if weak < strong {
                weak_first += 1;
            }
        }
        // P(U(0,5) > U(0,1)) = 0.9; 200 draws landing under 120 would
        // be a broken weighting, not bad luck.
        assert!(weak_first > 120, "weak element led only {weak_first}/200 runs");
    }

    #[test]
    fn test_determinism_per_seed() {
        let elements = sample_elements();
        let cfg = config(StudyMode::Shuffled);
        let a = build_element_queue(
            &elements,
            &cfg,
            &HashMap::new(),
            &mut StdRng::seed_from_u64(99),
        );
        let b = build_element_queue(
            &elements,
            &cfg,
            &HashMap::new(),
            &mut StdRng::seed_from_u64(99),
        );
        assert_eq!(a, b);
    }
}
