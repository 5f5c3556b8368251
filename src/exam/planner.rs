//! Single-step planner transition: serves the next element code from
//! the queue while avoiding short-term repeats.

use super::types::{PlannerState, RECENT_WINDOW};

/// Serves one code from the queue. Returns `None` only when the queue
/// is empty; completion is the exam plan's call, never the planner's.
///
/// Scans forward from the cursor, wrapping, for the first code not in
/// the recency window; when every code is recent (queue shorter than
/// the window) it falls back to the code at the cursor so the planner
/// stays live. The returned state has the cursor advanced past the
/// pick, the window updated, the pick's attempt count bumped and the
/// version incremented.
pub fn pick_next(state: &PlannerState) -> Option<(String, PlannerState)> {
    if state.queue.is_empty() {
        return None;
    }

    let len = state.queue.len();
    let start = state.cursor % len;

    let mut picked = start;
    for offset in 0..len {
        let idx = (start + offset) % len;
        if !state.recent.contains(&state.queue[idx]) {
            picked = idx;
            break;
        }
    }

    let code = state.queue[picked].clone();
    let mut next = state.clone();
    next.cursor = (picked + 1) % len;
    next.recent.push_back(code.clone());
    while next.recent.len() > RECENT_WINDOW {
        next.recent.pop_front();
    }
    *next.attempts.entry(code.clone()).or_insert(0) += 1;
    next.version += 1;

    Some((code, next))
}
