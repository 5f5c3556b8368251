use serde::{Deserialize, Serialize};

/// Question-count pacing knobs. `full_exam_count` is the nominal length
/// of a complete oral exam covering the whole rating; sessions scoped to
/// a subset of the curriculum get a proportional share of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    pub full_exam_count: usize,
    pub min_question_count: usize,
    pub bonus_question_max: u32,
    pub follow_up_max_per_element: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            full_exam_count: 40,
            min_question_count: 5,
            bonus_question_max: 3,
            follow_up_max_per_element: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub enabled: bool,
    pub filter_inference_enabled: bool,
    pub top_k: usize,
    pub similarity_floor: f64,
    pub min_filtered_results: usize,
    pub min_top_score: f64,
    pub timeout_ms: u64,
    pub min_query_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter_inference_enabled: true,
            top_k: 5,
            similarity_floor: 0.30,
            min_filtered_results: 3,
            min_top_score: 0.50,
            timeout_ms: 2500,
            min_query_chars: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamConfig {
    pub pacing: PacingConfig,
    pub retrieval: RetrievalConfig,
    pub session_expire_hours: i64,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            retrieval: RetrievalConfig::default(),
            session_expire_hours: 24,
        }
    }
}

impl ExamConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("EXAM_FULL_COUNT") {
            config.pacing.full_exam_count = val.parse().unwrap_or(40);
        }
        if let Ok(val) = std::env::var("EXAM_MIN_QUESTIONS") {
            config.pacing.min_question_count = val.parse().unwrap_or(5);
        }
        if let Ok(val) = std::env::var("EXAM_BONUS_MAX") {
            config.pacing.bonus_question_max = val.parse().unwrap_or(3);
        }
        if let Ok(val) = std::env::var("EXAM_FOLLOW_UP_MAX") {
            config.pacing.follow_up_max_per_element = val.parse().unwrap_or(2);
        }
        if let Ok(val) = std::env::var("RAG_ENABLED") {
            config.retrieval.enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RAG_FILTER_INFERENCE_ENABLED") {
            config.retrieval.filter_inference_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RAG_TOP_K") {
            config.retrieval.top_k = val.parse().unwrap_or(5);
        }
        if let Ok(val) = std::env::var("RAG_SIMILARITY_FLOOR") {
            config.retrieval.similarity_floor = val.parse().unwrap_or(0.30);
        }
        if let Ok(val) = std::env::var("RAG_MIN_FILTERED_RESULTS") {
            config.retrieval.min_filtered_results = val.parse().unwrap_or(3);
        }
        if let Ok(val) = std::env::var("RAG_MIN_TOP_SCORE") {
            config.retrieval.min_top_score = val.parse().unwrap_or(0.50);
        }
        if let Ok(val) = std::env::var("RAG_TIMEOUT_MS") {
            config.retrieval.timeout_ms = val.parse().unwrap_or(2500);
        }
        if let Ok(val) = std::env::var("SESSION_EXPIRE_HOURS") {
            config.session_expire_hours = val.parse().unwrap_or(24);
        }

        config
    }
}
