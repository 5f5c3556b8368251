//! Exam plan: how many questions this session owes, how much bonus and
//! follow-up budget remains, and per-element coverage. Transitions are
//! pure and return new values; a stale copy stays valid as a snapshot.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use super::config::PacingConfig;
use super::types::{CoverageStatus, ExamPlan, StudyMode};

/// Negative signal from `use_bonus`: the bonus budget is spent. The
/// caller branches on it instead of asking another question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("bonus question budget exhausted")]
pub struct BudgetExhausted;

/// Sizes the session proportionally to how much of the rating's
/// curriculum it covers:
/// `clamp(ceil(full_exam_count * |queue| / total), min_question_count, |queue|)`.
/// The cap wins when the queue is smaller than the floor.
pub fn build_plan(
    queue: &[String],
    mode: StudyMode,
    total_elements_in_rating: usize,
    pacing: &PacingConfig,
) -> ExamPlan {
    let queue_len = queue.len();
    let planned_question_count = if queue_len == 0 {
        0
    } else {
        let proportional =
            (pacing.full_exam_count * queue_len).div_ceil(total_elements_in_rating.max(1));
        proportional
            .max(pacing.min_question_count)
            .min(queue_len)
    };

    let coverage = queue
        .iter()
        .map(|code| (code.clone(), CoverageStatus::Pending))
        .collect();

    ExamPlan {
        version: 0,
        planned_question_count,
        bonus_question_max: pacing.bonus_question_max,
        bonus_used: 0,
        follow_up_max_per_element: pacing.follow_up_max_per_element,
        asked_count: 0,
        mode,
        coverage,
        created_at: chrono::Utc::now().timestamp_millis(),
    }
}

/// Marks a question as asked. Overwrites any prior coverage status for
/// the code, including `credited_by_mention`.
pub fn record_asked(plan: &ExamPlan, code: &str) -> ExamPlan {
    let mut next = plan.clone();
    next.asked_count += 1;
    next.coverage
        .insert(code.to_string(), CoverageStatus::Asked);
    next.version += 1;
    next
}

/// Draws one bonus question from the budget, or signals exhaustion
/// without changing anything.
pub fn use_bonus(plan: &ExamPlan) -> Result<ExamPlan, BudgetExhausted> {
    if plan.bonus_used >= plan.bonus_question_max {
        return Err(BudgetExhausted);
    }
    let mut next = plan.clone();
    next.bonus_used += 1;
    next.version += 1;
    Ok(next)
}

/// Credits elements the examiner's output touched in passing. Only
/// `pending` entries move; `asked` always outranks mention credit, and
/// codes outside the plan are ignored.
pub fn credit_by_mention(plan: &ExamPlan, codes: &[String]) -> ExamPlan {
    let mut next = plan.clone();
    let mut changed = false;
    for code in codes {
        if let Some(status) = next.coverage.get_mut(code) {
            if *status == CoverageStatus::Pending {
                *status = CoverageStatus::CreditedByMention;
                changed = true;
            }
        }
    }
    if changed {
        next.version += 1;
    }
    next
}

/// The follow-up budget counts total attempts on an element, the
/// initial ask included.
pub fn can_follow_up(plan: &ExamPlan, attempts_so_far: u32) -> bool {
    attempts_so_far <= plan.follow_up_max_per_element
}

/// A session is eligible to end once every granted bonus question has
/// also been asked; unused bonus budget never shortens it.
pub fn is_complete(plan: &ExamPlan) -> bool {
    plan.asked_count >= plan.planned_question_count + plan.bonus_used as usize
}

/// Topic-coherent reordering: greedily chains codes by tag overlap
/// (Jaccard) so adjacent questions feel related. Codes with no
/// fingerprint go to the back; when nothing has a fingerprint the whole
/// list is shuffled uniformly.
pub fn connected_walk<R: Rng + ?Sized>(
    codes: &[String],
    fingerprints: &HashMap<String, HashSet<String>>,
    rng: &mut R,
) -> Vec<String> {
    let (mut pool, untagged): (Vec<String>, Vec<String>) = codes
        .iter()
        .cloned()
        .partition(|code| fingerprints.get(code).is_some_and(|fp| !fp.is_empty()));

    if pool.is_empty() {
        let mut all: Vec<String> = codes.to_vec();
        all.shuffle(rng);
        return all;
    }

    let empty = HashSet::new();
    let fp = |code: &str| fingerprints.get(code).unwrap_or(&empty);

    let mut walk = Vec::with_capacity(codes.len());
    let start = rng.random_range(0..pool.len());
    let mut current = pool.swap_remove(start);
    walk.push(current.clone());

    while !pool.is_empty() {
        let mut best_score = f64::NEG_INFINITY;
        let mut best: Vec<usize> = Vec::new();
        for (i, candidate) in pool.iter().enumerate() {
            let score = jaccard(fp(&current), fp(candidate));
            if score > best_score {
                best_score = score;
                best.clear();
                best.push(i);
            } else if score == best_score {
                best.push(i);
            }
        }
        let pick = best[rng.random_range(0..best.len())];
        current = pool.swap_remove(pick);
        walk.push(current.clone());
    }

    walk.extend(untagged);
    walk
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}
