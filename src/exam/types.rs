#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// How many previously served codes the planner refuses to repeat.
pub const RECENT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ElementType {
    #[default]
    Knowledge,
    Risk,
    Skill,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Risk => "risk",
            Self::Skill => "skill",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "risk" => Self::Risk,
            "skill" => Self::Skill,
            _ => Self::Knowledge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum DifficultyFilter {
    Easy,
    Medium,
    Hard,
    #[default]
    Mixed,
}

impl DifficultyFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "easy" => Self::Easy,
            "medium" => Self::Medium,
            "hard" => Self::Hard,
            _ => Self::Mixed,
        }
    }

    pub fn matches(&self, difficulty: Difficulty) -> bool {
        match self {
            Self::Mixed => true,
            Self::Easy => difficulty == Difficulty::Easy,
            Self::Medium => difficulty == Difficulty::Medium,
            Self::Hard => difficulty == Difficulty::Hard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum StudyMode {
    #[default]
    Linear,
    Shuffled,
    WeaknessWeighted,
}

impl StudyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Shuffled => "shuffled",
            Self::WeaknessWeighted => "weakness_weighted",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "shuffled" => Self::Shuffled,
            "weakness_weighted" => Self::WeaknessWeighted,
            _ => Self::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum CoverageStatus {
    #[default]
    Pending,
    Asked,
    CreditedByMention,
}

impl CoverageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Asked => "asked",
            Self::CreditedByMention => "credited_by_mention",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Satisfactory,
    Partial,
    Unsatisfactory,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Satisfactory => "satisfactory",
            Self::Partial => "partial",
            Self::Unsatisfactory => "unsatisfactory",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "satisfactory" => Some(Self::Satisfactory),
            "partial" => Some(Self::Partial),
            "unsatisfactory" => Some(Self::Unsatisfactory),
            _ => None,
        }
    }

    /// Point value used by the grading function.
    pub fn points(&self) -> f64 {
        match self {
            Self::Satisfactory => 1.0,
            Self::Partial => 0.7,
            Self::Unsatisfactory => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum EndTrigger {
    #[default]
    Natural,
    System,
    UserEnded,
}

impl EndTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::System => "system",
            Self::UserEnded => "user_ended",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "system" => Self::System,
            "user_ended" => Self::UserEnded,
            _ => Self::Natural,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamGrade {
    Satisfactory,
    Unsatisfactory,
    Incomplete,
}

impl ExamGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Satisfactory => "satisfactory",
            Self::Unsatisfactory => "unsatisfactory",
            Self::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum SessionStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Abandoned,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "abandoned" => Self::Abandoned,
            "expired" => Self::Expired,
            _ => Self::Active,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned | Self::Expired)
    }
}

/// Smallest gradable curriculum unit. Codes are hierarchical,
/// `RATING.AREA.TASK.SEQ`, e.g. `PA.I.A.K1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub code: String,
    pub task_id: String,
    pub element_type: ElementType,
    pub difficulty: Difficulty,
    pub order_index: i32,
    pub weight: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub rating: String,
    pub area_id: String,
    pub area_name: String,
    pub task_name: String,
    pub sort_order: i32,
    #[serde(default)]
    pub applicable_classes: Vec<String>,
    #[serde(default)]
    pub knowledge_elements: Vec<Element>,
    #[serde(default)]
    pub risk_elements: Vec<Element>,
    #[serde(default)]
    pub skill_elements: Vec<Element>,
}

impl Task {
    /// Tasks with an empty class list apply to every aircraft class.
    pub fn applies_to_class(&self, class: Option<&str>) -> bool {
        match class {
            None => true,
            Some(c) => {
                self.applicable_classes.is_empty()
                    || self.applicable_classes.iter().any(|a| a.eq_ignore_ascii_case(c))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub rating: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aircraft_class: Option<String>,
    #[serde(default)]
    pub study_mode: StudyMode,
    #[serde(default)]
    pub difficulty: DifficultyFilter,
    #[serde(default)]
    pub selected_areas: Vec<String>,
    #[serde(default)]
    pub selected_tasks: Vec<String>,
}

/// Cursor/recency/attempt tracker over the session queue. Mutated only
/// through `planner::pick_next`, which returns a new value.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlannerState {
    pub version: u64,
    pub queue: Vec<String>,
    pub cursor: usize,
    pub recent: VecDeque<String>,
    pub attempts: HashMap<String, u32>,
}

impl PlannerState {
    pub fn new(queue: Vec<String>) -> Self {
        Self {
            version: 0,
            queue,
            cursor: 0,
            recent: VecDeque::with_capacity(RECENT_WINDOW),
            attempts: HashMap::new(),
        }
    }

    pub fn attempts_for(&self, code: &str) -> u32 {
        self.attempts.get(code).copied().unwrap_or(0)
    }
}

/// Pacing and coverage tracker. All transitions live in `plan.rs` and
/// return new values; stale copies stay valid as snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPlan {
    pub version: u64,
    pub planned_question_count: usize,
    pub bonus_question_max: u32,
    pub bonus_used: u32,
    pub follow_up_max_per_element: u32,
    pub asked_count: usize,
    pub mode: StudyMode,
    pub coverage: HashMap<String, CoverageStatus>,
    pub created_at: i64,
}

/// Read-only attempt history for one element, used to weight the
/// weakness ordering policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementScore {
    pub element_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_score: Option<AttemptOutcome>,
    pub total_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAttempt {
    pub element_code: String,
    pub outcome: AttemptOutcome,
    pub asked_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AreaBreakdown {
    pub area: String,
    pub asked: u32,
    pub satisfactory: u32,
    pub unsatisfactory: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub score_percentage: f64,
    pub grade: ExamGrade,
    pub asked_count: usize,
    pub area_breakdown: Vec<AreaBreakdown>,
}

/// One ranked passage out of the hybrid reference search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSearchResult {
    pub id: String,
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_start: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_end: Option<i32>,
    pub doc_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_abbreviation: Option<String>,
    pub score: f64,
}

/// Inferred metadata filter for retrieval. At most one field is set;
/// both `None` means no confident filter.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RagFilterHint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_doc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_abbreviation: Option<String>,
}

impl RagFilterHint {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn abbreviation(abbr: &str) -> Self {
        Self {
            filter_doc_type: None,
            filter_abbreviation: Some(abbr.to_string()),
        }
    }

    pub fn doc_type(doc_type: &str) -> Self {
        Self {
            filter_doc_type: Some(doc_type.to_string()),
            filter_abbreviation: None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.filter_doc_type.is_none() && self.filter_abbreviation.is_none()
    }
}

/// Per-session aggregate owned by the engine: immutable config plus the
/// planner, plan and attempt log, all guarded by one session version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSession {
    pub id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub version: i64,
    pub config: SessionConfig,
    pub planner: PlannerState,
    pub plan: ExamPlan,
    #[serde(default)]
    pub attempts: Vec<GradedAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExamResult>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// `PA.I.A.K1` -> `PA.I`; codes with fewer than two segments come back
/// unchanged.
pub fn area_prefix(code: &str) -> &str {
    let mut dots = 0;
    for (i, ch) in code.char_indices() {
        if ch == '.' {
            dots += 1;
            if dots == 2 {
                return &code[..i];
            }
        }
    }
    code
}

/// Second segment of a code: `PA.I.A.K1` -> `I`.
pub fn area_segment(code: &str) -> Option<&str> {
    code.split('.').nth(1)
}
