//! Property-Based Tests for queue construction and exam plan accounting
//!
//! Tests the following invariants:
//! - Skill elements never enter the oral queue
//! - The queue is duplicate-free and drawn only from the scoped curriculum
//! - Linear mode preserves curriculum order; other modes permute it
//! - Planned question counts stay inside the pacing bounds
//! - Bonus and mention-credit bookkeeping never over- or under-counts

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use checkride_backend_rust::exam::config::PacingConfig;
use checkride_backend_rust::exam::plan::{
    build_plan, can_follow_up, credit_by_mention, record_asked, use_bonus,
};
use checkride_backend_rust::exam::queue::build_element_queue;
use checkride_backend_rust::exam::types::{
    area_segment, CoverageStatus, Difficulty, DifficultyFilter, Element, ElementType,
    SessionConfig, StudyMode,
};

const AREAS: [&str; 4] = ["I", "II", "IV", "IX"];
const TASKS: [&str; 3] = ["A", "B", "C"];

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// One curriculum slot: (area, task, element kind, sequence number).
/// Distinct tuples produce distinct element codes.
fn arb_slot() -> impl Strategy<Value = (u8, u8, u8, u8)> {
    (0u8..AREAS.len() as u8, 0u8..TASKS.len() as u8, 0u8..3, 1u8..=4)
}

fn element_from_slot((area, task, kind, seq): (u8, u8, u8, u8), order_index: i32) -> Element {
    let area_name = AREAS[area as usize];
    let task_name = TASKS[task as usize];
    let (prefix, element_type) = match kind {
        0 => ("K", ElementType::Knowledge),
        1 => ("R", ElementType::Risk),
        _ => ("S", ElementType::Skill),
    };
    let difficulty = match seq % 3 {
        0 => Difficulty::Easy,
        1 => Difficulty::Medium,
        _ => Difficulty::Hard,
    };
    Element {
        code: format!("PA.{area_name}.{task_name}.{prefix}{seq}"),
        task_id: format!("pa-{}-{}", area_name.to_lowercase(), task_name.to_lowercase()),
        element_type,
        difficulty,
        order_index,
        weight: 1.0,
        description: String::new(),
        tags: Vec::new(),
    }
}

/// A small curriculum in canonical order: sorted by area, task, kind,
/// sequence, with codes guaranteed unique.
fn arb_curriculum() -> impl Strategy<Value = Vec<Element>> {
    prop::collection::hash_set(arb_slot(), 1..40).prop_map(|slots| {
        let mut slots: Vec<_> = slots.into_iter().collect();
        slots.sort();
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| element_from_slot(slot, i as i32))
            .collect()
    })
}

fn arb_study_mode() -> impl Strategy<Value = StudyMode> {
    prop_oneof![
        Just(StudyMode::Linear),
        Just(StudyMode::Shuffled),
        Just(StudyMode::WeaknessWeighted),
    ]
}

fn arb_queue() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("PA\\.[IVX]{1,3}\\.[A-C]\\.K[1-9]", 0..30)
        .prop_map(|codes| codes.into_iter().collect())
}

fn full_scope_config(mode: StudyMode) -> SessionConfig {
    SessionConfig {
        rating: "PA".to_string(),
        aircraft_class: None,
        study_mode: mode,
        difficulty: DifficultyFilter::Mixed,
        selected_areas: Vec::new(),
        selected_tasks: Vec::new(),
    }
}

// ============================================================================
// Queue Properties
// ============================================================================

proptest! {
    /// Skill elements are flight-test material and must never be queued
    /// for the oral, in any study mode.
    #[test]
    fn queue_never_contains_skill_elements(
        elements in arb_curriculum(),
        mode in arb_study_mode(),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let queue =
            build_element_queue(&elements, &full_scope_config(mode), &HashMap::new(), &mut rng);

        let skills: HashSet<&str> = elements
            .iter()
            .filter(|e| e.element_type == ElementType::Skill)
            .map(|e| e.code.as_str())
            .collect();
        for code in &queue {
            prop_assert!(!skills.contains(code.as_str()), "skill {} was queued", code);
        }
    }

    /// Every queued code comes from the input curriculum, exactly once.
    #[test]
    fn queue_is_duplicate_free_subset(
        elements in arb_curriculum(),
        mode in arb_study_mode(),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let queue =
            build_element_queue(&elements, &full_scope_config(mode), &HashMap::new(), &mut rng);

        let known: HashSet<&str> = elements.iter().map(|e| e.code.as_str()).collect();
        let mut seen = HashSet::new();
        for code in &queue {
            prop_assert!(known.contains(code.as_str()), "unknown code {}", code);
            prop_assert!(seen.insert(code.clone()), "duplicate code {}", code);
        }
    }

    /// Linear mode with an unrestricted scope is exactly the curriculum
    /// minus skills, in curriculum order.
    #[test]
    fn linear_mode_preserves_curriculum_order(
        elements in arb_curriculum(),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let queue = build_element_queue(
            &elements,
            &full_scope_config(StudyMode::Linear),
            &HashMap::new(),
            &mut rng,
        );

        let expected: Vec<String> = elements
            .iter()
            .filter(|e| e.element_type != ElementType::Skill)
            .map(|e| e.code.clone())
            .collect();
        prop_assert_eq!(queue, expected);
    }

    /// Shuffled and weakness-weighted modes reorder the queue but never
    /// add or drop elements relative to linear mode.
    #[test]
    fn non_linear_modes_are_permutations(
        elements in arb_curriculum(),
        mode in prop_oneof![Just(StudyMode::Shuffled), Just(StudyMode::WeaknessWeighted)],
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let linear = build_element_queue(
            &elements,
            &full_scope_config(StudyMode::Linear),
            &HashMap::new(),
            &mut rng,
        );
        let shuffled =
            build_element_queue(&elements, &full_scope_config(mode), &HashMap::new(), &mut rng);

        let mut sorted_linear = linear;
        sorted_linear.sort();
        let mut sorted_shuffled = shuffled;
        sorted_shuffled.sort();
        prop_assert_eq!(sorted_linear, sorted_shuffled);
    }

    /// Area scoping keeps only codes from the selected areas.
    #[test]
    fn area_scoping_filters_by_area_segment(
        elements in arb_curriculum(),
        area_idx in 0usize..AREAS.len(),
        seed in any::<u64>(),
    ) {
        let area = AREAS[area_idx];
        let mut config = full_scope_config(StudyMode::Linear);
        config.selected_areas = vec![area.to_string()];

        let mut rng = StdRng::seed_from_u64(seed);
        let queue = build_element_queue(&elements, &config, &HashMap::new(), &mut rng);

        for code in &queue {
            prop_assert_eq!(area_segment(code), Some(area), "code {} escaped the scope", code);
        }
    }
}

// ============================================================================
// Plan Properties
// ============================================================================

proptest! {
    /// The planned question count is proportional but always lands
    /// between the configured floor and the queue size.
    #[test]
    fn planned_count_respects_bounds(
        queue in arb_queue(),
        extra_elements in 0usize..60,
    ) {
        let pacing = PacingConfig::default();
        let total = queue.len() + extra_elements;
        let plan = build_plan(&queue, StudyMode::Linear, total, &pacing);

        prop_assert!(plan.planned_question_count <= queue.len());
        if queue.is_empty() {
            prop_assert_eq!(plan.planned_question_count, 0);
        } else {
            prop_assert!(
                plan.planned_question_count >= pacing.min_question_count.min(queue.len()),
                "planned {} below floor for queue of {}",
                plan.planned_question_count,
                queue.len()
            );
        }
        prop_assert_eq!(plan.asked_count, 0);
        prop_assert_eq!(plan.bonus_used, 0);
        prop_assert_eq!(plan.coverage.len(), queue.len());
    }

    /// Bonus draws succeed exactly `bonus_question_max` times and leave
    /// the plan untouched on exhaustion.
    #[test]
    fn bonus_budget_is_exact(queue in arb_queue(), bonus_max in 0u32..6) {
        let pacing = PacingConfig {
            bonus_question_max: bonus_max,
            ..PacingConfig::default()
        };
        let mut plan = build_plan(&queue, StudyMode::Linear, queue.len(), &pacing);

        for draw in 0..bonus_max {
            plan = use_bonus(&plan).unwrap();
            prop_assert_eq!(plan.bonus_used, draw + 1);
        }
        prop_assert_eq!(plan.bonus_used, bonus_max);
        prop_assert!(use_bonus(&plan).is_err());
        prop_assert_eq!(plan.bonus_used, bonus_max);
    }

    /// The follow-up budget counts total attempts, the first ask
    /// included.
    #[test]
    fn follow_up_allowance_matches_budget(
        follow_up_max in 0u32..5,
        attempts in 0u32..10,
    ) {
        let pacing = PacingConfig {
            follow_up_max_per_element: follow_up_max,
            ..PacingConfig::default()
        };
        let plan = build_plan(&[], StudyMode::Linear, 0, &pacing);

        prop_assert_eq!(can_follow_up(&plan, attempts), attempts <= follow_up_max);
    }

    /// Mention credit only ever promotes pending entries; an asked
    /// element keeps its status no matter what the examiner mentions.
    #[test]
    fn mention_credit_never_downgrades_asked(
        queue in arb_queue(),
        ask_mask in prop::collection::vec(any::<bool>(), 30),
    ) {
        let pacing = PacingConfig::default();
        let mut plan = build_plan(&queue, StudyMode::Linear, queue.len(), &pacing);

        let asked: Vec<String> = queue
            .iter()
            .zip(ask_mask.iter())
            .filter(|(_, asked)| **asked)
            .map(|(code, _)| code.clone())
            .collect();
        for code in &asked {
            plan = record_asked(&plan, code);
        }

        let credited = credit_by_mention(&plan, &queue);

        prop_assert_eq!(credited.asked_count, asked.len());
        for code in &queue {
            let status = credited.coverage.get(code);
            if asked.contains(code) {
                prop_assert_eq!(status, Some(&CoverageStatus::Asked));
            } else {
                prop_assert_eq!(status, Some(&CoverageStatus::CreditedByMention));
            }
        }
    }
}
