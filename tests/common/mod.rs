#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;

use checkride_backend_rust::exam::types::{Difficulty, Element, ElementType, Task};
use checkride_backend_rust::exam::ExamEngine;
use checkride_backend_rust::routes;
use checkride_backend_rust::state::AppState;

pub const TEST_RATING: &str = "PA";

fn element(
    code: &str,
    task_id: &str,
    element_type: ElementType,
    order_index: i32,
    description: &str,
    tags: &[&str],
) -> Element {
    Element {
        code: code.to_string(),
        task_id: task_id.to_string(),
        element_type,
        difficulty: Difficulty::Medium,
        order_index,
        weight: 1.0,
        description: description.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// A small private-pilot curriculum: two areas of operation plus one
/// skill-only task, nine askable elements in total.
pub fn sample_tasks() -> Vec<Task> {
    vec![
        Task {
            id: "pa-i-a".to_string(),
            rating: TEST_RATING.to_string(),
            area_id: "PA.I".to_string(),
            area_name: "Preflight Preparation".to_string(),
            task_name: "Pilot Qualifications".to_string(),
            sort_order: 0,
            applicable_classes: Vec::new(),
            knowledge_elements: vec![
                element(
                    "PA.I.A.K1",
                    "pa-i-a",
                    ElementType::Knowledge,
                    0,
                    "Certification requirements, currency, and experience requirements",
                    &["certificates", "currency"],
                ),
                element(
                    "PA.I.A.K2",
                    "pa-i-a",
                    ElementType::Knowledge,
                    1,
                    "Medical certificates: class, expiration, and privileges",
                    &["medical"],
                ),
            ],
            risk_elements: vec![element(
                "PA.I.A.R1",
                "pa-i-a",
                ElementType::Risk,
                0,
                "Failure to distinguish proficiency versus currency",
                &["currency", "proficiency"],
            )],
            skill_elements: Vec::new(),
        },
        Task {
            id: "pa-i-b".to_string(),
            rating: TEST_RATING.to_string(),
            area_id: "PA.I".to_string(),
            area_name: "Preflight Preparation".to_string(),
            task_name: "Airworthiness Requirements".to_string(),
            sort_order: 1,
            applicable_classes: vec!["ASEL".to_string()],
            knowledge_elements: vec![
                element(
                    "PA.I.B.K1",
                    "pa-i-b",
                    ElementType::Knowledge,
                    0,
                    "Required aircraft certificates and documents",
                    &["airworthiness", "documents"],
                ),
                element(
                    "PA.I.B.K2",
                    "pa-i-b",
                    ElementType::Knowledge,
                    1,
                    "Required inspections and airworthiness directives",
                    &["airworthiness", "inspections"],
                ),
            ],
            risk_elements: Vec::new(),
            skill_elements: vec![element(
                "PA.I.B.S1",
                "pa-i-b",
                ElementType::Skill,
                0,
                "Locate and describe airworthiness documents in the aircraft",
                &["airworthiness"],
            )],
        },
        Task {
            id: "pa-ix-a".to_string(),
            rating: TEST_RATING.to_string(),
            area_id: "PA.IX".to_string(),
            area_name: "Emergency Operations".to_string(),
            task_name: "Emergency Descent".to_string(),
            sort_order: 2,
            applicable_classes: Vec::new(),
            knowledge_elements: vec![element(
                "PA.IX.A.K1",
                "pa-ix-a",
                ElementType::Knowledge,
                0,
                "Situations that require an emergency descent",
                &["emergency", "descent"],
            )],
            risk_elements: vec![element(
                "PA.IX.A.R1",
                "pa-ix-a",
                ElementType::Risk,
                0,
                "Altitude, wind, and terrain considerations during a descent",
                &["emergency", "terrain"],
            )],
            skill_elements: Vec::new(),
        },
        Task {
            id: "pa-ix-b".to_string(),
            rating: TEST_RATING.to_string(),
            area_id: "PA.IX".to_string(),
            area_name: "Emergency Operations".to_string(),
            task_name: "Engine Failure".to_string(),
            sort_order: 3,
            applicable_classes: Vec::new(),
            knowledge_elements: vec![
                element(
                    "PA.IX.B.K1",
                    "pa-ix-b",
                    ElementType::Knowledge,
                    0,
                    "Immediate actions after an engine failure in flight",
                    &["emergency", "engine"],
                ),
                element(
                    "PA.IX.B.K2",
                    "pa-ix-b",
                    ElementType::Knowledge,
                    1,
                    "Best glide speed and landing site selection",
                    &["emergency", "glide"],
                ),
            ],
            risk_elements: Vec::new(),
            skill_elements: Vec::new(),
        },
        // A maneuvers task with no oral-examinable elements.
        Task {
            id: "pa-iv-a".to_string(),
            rating: TEST_RATING.to_string(),
            area_id: "PA.IV".to_string(),
            area_name: "Takeoffs, Landings, and Go-Arounds".to_string(),
            task_name: "Normal Takeoff and Climb".to_string(),
            sort_order: 4,
            applicable_classes: Vec::new(),
            knowledge_elements: Vec::new(),
            risk_elements: Vec::new(),
            skill_elements: vec![
                element(
                    "PA.IV.A.S1",
                    "pa-iv-a",
                    ElementType::Skill,
                    0,
                    "Perform a normal takeoff and climb",
                    &[],
                ),
                element(
                    "PA.IV.A.S2",
                    "pa-iv-a",
                    ElementType::Skill,
                    1,
                    "Maintain centerline and climb speed",
                    &[],
                ),
            ],
        },
    ]
}

/// Engine with no database and no cache: sessions live in memory,
/// question generation uses the scripted fallback, grading relies on
/// self-reported outcomes.
pub async fn test_engine() -> Arc<ExamEngine> {
    let engine = AppState::create_exam_engine(None, None);
    engine
        .curriculum()
        .register_rating(TEST_RATING, sample_tasks())
        .await;
    engine
}

pub async fn create_test_app() -> Router {
    let engine = test_engine().await;
    let state = AppState::new(None, engine, None);
    routes::router(state)
}
