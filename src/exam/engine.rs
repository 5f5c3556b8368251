use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::RedisCache;
use crate::db::operations::scores as score_ops;
use crate::db::operations::sessions as session_ops;
use crate::db::DatabaseProxy;
use crate::exam::config::ExamConfig;
use crate::exam::grading::compute_result;
use crate::exam::plan;
use crate::exam::planner::pick_next;
use crate::exam::prompt::{
    build_assessment_prompt, build_question_prompt, format_grounding, AssessmentPromptInput,
    QuestionPromptInput, ASSESSOR_SYSTEM_PROMPT, EXAMINER_SYSTEM_PROMPT,
};
use crate::exam::queue::build_element_queue;
use crate::exam::types::{
    area_prefix, AttemptOutcome, ChunkSearchResult, EndTrigger, ExamSession, GradedAttempt,
    PlannerState, SessionConfig, SessionStatus, StudyMode,
};
use crate::rag::{QueryEmbeddingService, Retriever};
use crate::services::curriculum::{CurriculumError, CurriculumService};
use crate::services::embedding_provider::EmbeddingProvider;
use crate::services::llm_provider::{LLMError, LLMProvider};

#[derive(Debug, Error)]
pub enum ExamError {
    #[error("no examinable elements match the session configuration")]
    EmptyQueue,
    #[error("session not found")]
    SessionNotFound,
    #[error("session version is stale; refetch the session and retry")]
    StaleSession,
    #[error("session is no longer active")]
    SessionNotActive,
    #[error(transparent)]
    Curriculum(#[from] CurriculumError),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
}

/// Where the session currently stands against its plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub asked_count: usize,
    pub planned_question_count: usize,
    pub bonus_used: u32,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTurn {
    pub session_id: String,
    pub version: i64,
    pub element_code: String,
    pub question: String,
    pub is_follow_up: bool,
    pub progress: SessionProgress,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub grounding: Vec<ChunkSearchResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TurnOutput {
    #[serde(rename = "question")]
    Question(QuestionTurn),
    #[serde(rename = "complete")]
    Complete(SessionProgress),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    #[serde(default)]
    pub answer_text: Option<String>,
    /// Self-graded outcome; takes precedence over `answer_text` when
    /// both are present.
    #[serde(default)]
    pub self_outcome: Option<AttemptOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub element_code: String,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_feedback: Option<String>,
    pub follow_up_granted: bool,
    pub next: TurnOutput,
}

struct ElementContext {
    area_name: String,
    task_name: String,
    description: String,
}

impl ElementContext {
    fn fallback(code: &str) -> Self {
        Self {
            area_name: area_prefix(code).to_string(),
            task_name: code.to_string(),
            description: format!("the knowledge required by ACS element {code}"),
        }
    }
}

/// Orchestrates oral exam sessions: builds the queue and plan at start,
/// serves one grounded question at a time, grades answers, and closes
/// the session out with a summary.
///
/// Sessions live in memory and are written through to Postgres when a
/// proxy is attached; without one the engine still works, which is how
/// the tests run it. Every mutation is guarded by the session version.
pub struct ExamEngine {
    config: ExamConfig,
    db_proxy: Option<Arc<DatabaseProxy>>,
    curriculum: Arc<CurriculumService>,
    retriever: Retriever,
    llm: Arc<LLMProvider>,
    sessions: Arc<RwLock<HashMap<String, ExamSession>>>,
}

impl ExamEngine {
    pub fn new(
        config: ExamConfig,
        db_proxy: Option<Arc<DatabaseProxy>>,
        cache: Option<Arc<RedisCache>>,
    ) -> Self {
        let curriculum = Arc::new(CurriculumService::new(db_proxy.clone(), cache.clone()));
        let embedding = QueryEmbeddingService::new(
            Arc::new(EmbeddingProvider::from_env()),
            db_proxy.clone(),
            cache.clone(),
        );
        let retriever = Retriever::new(config.retrieval.clone(), embedding, db_proxy.clone());
        let llm = Arc::new(LLMProvider::from_env());

        Self {
            config,
            db_proxy,
            curriculum,
            retriever,
            llm,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ExamConfig {
        &self.config
    }

    pub fn curriculum(&self) -> &Arc<CurriculumService> {
        &self.curriculum
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Starts a session: loads the rating's curriculum, builds the
    /// element queue for the requested scope and ordering, sizes the
    /// plan, and supersedes any session the user already had running.
    pub async fn start_session(
        &self,
        user_id: &str,
        config: SessionConfig,
    ) -> Result<ExamSession, ExamError> {
        let rating = config.rating.trim().to_string();
        if rating.is_empty() {
            return Err(ExamError::Validation("rating is required".into()));
        }

        let curriculum = self.curriculum.load_rating(&rating).await?;
        let aircraft_class = config.aircraft_class.as_deref();
        let elements = curriculum.elements_for_class(aircraft_class);

        let scores = match (&self.db_proxy, config.study_mode) {
            (Some(db), StudyMode::WeaknessWeighted) => {
                match score_ops::load_element_scores(db, user_id, &rating).await {
                    Ok(scores) => scores,
                    Err(e) => {
                        warn!(error = %e, user_id, "score history unavailable, ordering without weights");
                        HashMap::new()
                    }
                }
            }
            _ => HashMap::new(),
        };

        let queue = {
            let mut rng = rand::rng();
            let mut queue = build_element_queue(&elements, &config, &scores, &mut rng);
            if config.study_mode == StudyMode::Shuffled && spans_multiple_areas(&queue) {
                queue = plan::connected_walk(&queue, &curriculum.fingerprints(), &mut rng);
            }
            queue
        };
        if queue.is_empty() {
            return Err(ExamError::EmptyQueue);
        }

        let exam_plan = plan::build_plan(
            &queue,
            config.study_mode,
            curriculum.askable_count(aircraft_class),
            &self.config.pacing,
        );

        let now = Utc::now().timestamp_millis();
        let session = ExamSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            status: SessionStatus::Active,
            version: 1,
            config,
            planner: PlannerState::new(queue),
            plan: exam_plan,
            attempts: Vec::new(),
            current_element: None,
            current_question: None,
            result: None,
            created_at: now,
            updated_at: now,
        };

        {
            let mut sessions = self.sessions.write().await;
            for other in sessions.values_mut() {
                if other.user_id == session.user_id && other.status == SessionStatus::Active {
                    other.status = SessionStatus::Paused;
                    other.version += 1;
                    other.updated_at = now;
                }
            }
            sessions.insert(session.id.clone(), session.clone());
        }

        if let Some(db) = &self.db_proxy {
            session_ops::pause_other_active_sessions(db, &session.user_id, &session.id).await?;
            session_ops::insert_session(db, &session).await?;
        }

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            rating = %session.config.rating,
            queue_len = session.planner.queue.len(),
            planned = session.plan.planned_question_count,
            "exam session started"
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<ExamSession>, ExamError> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                return Ok(Some(session.clone()));
            }
        }

        if let Some(db) = &self.db_proxy {
            if let Some(session) = session_ops::load_session(db, session_id).await? {
                let mut sessions = self.sessions.write().await;
                let entry = sessions
                    .entry(session.id.clone())
                    .or_insert_with(|| session.clone());
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    /// The user's most recently touched active session, if any.
    pub async fn active_session(&self, user_id: &str) -> Result<Option<ExamSession>, ExamError> {
        {
            let sessions = self.sessions.read().await;
            let best = sessions
                .values()
                .filter(|s| s.user_id == user_id && s.status == SessionStatus::Active)
                .max_by_key(|s| s.updated_at);
            if let Some(session) = best {
                return Ok(Some(session.clone()));
            }
        }

        if let Some(db) = &self.db_proxy {
            if let Some(session) = session_ops::find_active_session(db, user_id).await? {
                let mut sessions = self.sessions.write().await;
                let entry = sessions
                    .entry(session.id.clone())
                    .or_insert_with(|| session.clone());
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    /// Serves the next question. Re-serves the outstanding question
    /// verbatim when one has not been answered yet, so a client retry
    /// after a dropped response never burns a queue slot.
    pub async fn next_question(
        &self,
        session_id: &str,
        expected_version: i64,
    ) -> Result<TurnOutput, ExamError> {
        let session = self.snapshot_for_write(session_id, expected_version).await?;

        if let (Some(code), Some(question)) = (
            session.current_element.clone(),
            session.current_question.clone(),
        ) {
            debug!(session_id, element = %code, "re-serving outstanding question");
            let is_follow_up = has_graded_attempt(&session, &code);
            return Ok(TurnOutput::Question(QuestionTurn {
                session_id: session.id.clone(),
                version: session.version,
                element_code: code,
                question,
                is_follow_up,
                progress: progress_of(&session),
                grounding: Vec::new(),
            }));
        }

        if plan::is_complete(&session.plan) {
            return Ok(TurnOutput::Complete(progress_of(&session)));
        }

        let Some((code, next_planner)) = pick_next(&session.planner) else {
            return Ok(TurnOutput::Complete(progress_of(&session)));
        };

        let attempt_number = next_planner.attempts_for(&code);
        let (question, related, grounding) = self
            .generate_question(&session, &code, attempt_number, None)
            .await;

        let mut updated = session.clone();
        updated.planner = next_planner;
        updated.plan = plan::record_asked(&updated.plan, &code);
        credit_mentions(&mut updated, &code, &related);
        updated.current_element = Some(code.clone());
        updated.current_question = Some(question.clone());
        updated.version = session.version + 1;
        updated.updated_at = Utc::now().timestamp_millis();

        let committed = self.commit(updated, session.version).await?;
        let is_follow_up = attempt_number > 1;
        Ok(TurnOutput::Question(QuestionTurn {
            session_id: committed.id.clone(),
            version: committed.version,
            element_code: code,
            question,
            is_follow_up,
            progress: progress_of(&committed),
            grounding,
        }))
    }

    /// Grades the outstanding answer and advances the exam in one
    /// round trip: assessment of the current answer runs concurrently
    /// with retrieval for the next question, then the engine decides
    /// between a follow-up on the same element and moving on.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        expected_version: i64,
        input: AnswerInput,
    ) -> Result<AnswerFeedback, ExamError> {
        let session = self.snapshot_for_write(session_id, expected_version).await?;

        let Some(code) = session.current_element.clone() else {
            return Err(ExamError::Validation(
                "no question is outstanding for this session".into(),
            ));
        };
        let question = session.current_question.clone().unwrap_or_default();

        let answer_text = input
            .answer_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if input.self_outcome.is_none() && answer_text.is_none() {
            return Err(ExamError::Validation(
                "either selfOutcome or answerText is required".into(),
            ));
        }

        // Peek at the element we would advance to so its retrieval can
        // overlap the assessment call.
        let advance_pick = pick_next(&session.planner);

        let ((outcome, quick_feedback, detailed_feedback), prefetched) = tokio::join!(
            self.grade_answer(&session, &code, &question, input.self_outcome, answer_text),
            self.prefetch_grounding(&session, advance_pick.as_ref().map(|(c, _)| c.as_str()))
        );

        let now = Utc::now().timestamp_millis();
        let mut updated = session.clone();
        updated.attempts.push(GradedAttempt {
            element_code: code.clone(),
            outcome,
            asked_at: now,
        });
        updated.current_element = None;
        updated.current_question = None;

        let attempts_so_far = updated
            .attempts
            .iter()
            .filter(|a| a.element_code == code)
            .count() as u32;

        let mut follow_up_granted = false;
        if outcome != AttemptOutcome::Satisfactory
            && plan::can_follow_up(&updated.plan, attempts_so_far)
        {
            match plan::use_bonus(&updated.plan) {
                Ok(with_bonus) => {
                    updated.plan = with_bonus;
                    follow_up_granted = true;
                }
                Err(exhausted) => {
                    debug!(session_id, element = %code, "{exhausted}, advancing instead");
                }
            }
        }

        let next = if follow_up_granted {
            let (follow_up, related, grounding) = self
                .generate_question(&updated, &code, attempts_so_far + 1, None)
                .await;
            updated.plan = plan::record_asked(&updated.plan, &code);
            credit_mentions(&mut updated, &code, &related);
            updated.current_element = Some(code.clone());
            updated.current_question = Some(follow_up.clone());
            NextTurn::FollowUp {
                question: follow_up,
                grounding,
            }
        } else if plan::is_complete(&updated.plan) {
            NextTurn::Complete
        } else if let Some((next_code, next_planner)) = advance_pick {
            let attempt_number = next_planner.attempts_for(&next_code);
            let (next_question, related, grounding) = self
                .generate_question(&updated, &next_code, attempt_number, Some(prefetched))
                .await;
            updated.planner = next_planner;
            updated.plan = plan::record_asked(&updated.plan, &next_code);
            credit_mentions(&mut updated, &next_code, &related);
            updated.current_element = Some(next_code.clone());
            updated.current_question = Some(next_question.clone());
            NextTurn::Advance {
                code: next_code,
                attempt_number,
                question: next_question,
                grounding,
            }
        } else {
            NextTurn::Complete
        };

        updated.version = session.version + 1;
        updated.updated_at = now;
        let committed = self.commit(updated, session.version).await?;

        let next = match next {
            NextTurn::Complete => TurnOutput::Complete(progress_of(&committed)),
            NextTurn::FollowUp { question, grounding } => TurnOutput::Question(QuestionTurn {
                session_id: committed.id.clone(),
                version: committed.version,
                element_code: code.clone(),
                question,
                is_follow_up: true,
                progress: progress_of(&committed),
                grounding,
            }),
            NextTurn::Advance {
                code: next_code,
                attempt_number,
                question,
                grounding,
            } => TurnOutput::Question(QuestionTurn {
                session_id: committed.id.clone(),
                version: committed.version,
                element_code: next_code,
                question,
                is_follow_up: attempt_number > 1,
                progress: progress_of(&committed),
                grounding,
            }),
        };

        Ok(AnswerFeedback {
            element_code: code,
            outcome,
            quick_feedback,
            detailed_feedback,
            follow_up_granted,
            next,
        })
    }

    /// Closes the session and grades it. Ending an already-ended
    /// session returns it unchanged.
    pub async fn end_session(
        &self,
        session_id: &str,
        expected_version: Option<i64>,
        trigger: EndTrigger,
    ) -> Result<ExamSession, ExamError> {
        let session = self
            .get_session(session_id)
            .await?
            .ok_or(ExamError::SessionNotFound)?;

        if session.status.is_terminal() {
            return Ok(session);
        }
        if let Some(expected) = expected_version {
            if session.version != expected {
                return Err(ExamError::StaleSession);
            }
        }

        let required = session.plan.planned_question_count + session.plan.bonus_used as usize;
        let result = compute_result(&session.attempts, required, trigger);

        let mut updated = session.clone();
        updated.status = match trigger {
            EndTrigger::System => SessionStatus::Abandoned,
            EndTrigger::Natural | EndTrigger::UserEnded => SessionStatus::Completed,
        };
        updated.result = Some(result);
        updated.current_element = None;
        updated.current_question = None;
        updated.version = session.version + 1;
        updated.updated_at = Utc::now().timestamp_millis();

        let committed = self.commit(updated, session.version).await?;

        if let Some(db) = &self.db_proxy {
            let mut latest: HashMap<&str, AttemptOutcome> = HashMap::new();
            for attempt in &committed.attempts {
                latest.insert(attempt.element_code.as_str(), attempt.outcome);
            }
            for (element_code, outcome) in latest {
                if let Err(e) =
                    score_ops::upsert_element_score(db, &committed.user_id, element_code, outcome)
                        .await
                {
                    warn!(error = %e, element_code, "element score write failed");
                }
            }
        }

        if let Some(result) = &committed.result {
            info!(
                session_id = %committed.id,
                user_id = %committed.user_id,
                trigger = trigger.as_str(),
                grade = result.grade.as_str(),
                score = result.score_percentage,
                asked = result.asked_count,
                "exam session ended"
            );
        }
        Ok(committed)
    }

    /// Expires idle sessions in memory and in storage, and evicts
    /// long-terminal sessions from the in-memory map so it stays
    /// bounded. Returns how many sessions were expired.
    pub async fn expire_stale_sessions(&self) -> Result<u64, ExamError> {
        let now = Utc::now().timestamp_millis();
        let idle_hours = self.config.session_expire_hours;
        let cutoff = now - (idle_hours as i64) * 3_600_000;

        let mut expired = 0u64;
        {
            let mut sessions = self.sessions.write().await;
            for session in sessions.values_mut() {
                if !session.status.is_terminal() && session.updated_at < cutoff {
                    session.status = SessionStatus::Expired;
                    session.version += 1;
                    session.updated_at = now;
                    expired += 1;
                }
            }
            sessions.retain(|_, s| !(s.status.is_terminal() && s.updated_at < cutoff));
        }

        if let Some(db) = &self.db_proxy {
            expired = session_ops::expire_stale_sessions(db, idle_hours as i32).await?;
        }
        Ok(expired)
    }
}

enum NextTurn {
    FollowUp {
        question: String,
        grounding: Vec<ChunkSearchResult>,
    },
    Advance {
        code: String,
        attempt_number: u32,
        question: String,
        grounding: Vec<ChunkSearchResult>,
    },
    Complete,
}

impl ExamEngine {
    async fn snapshot_for_write(
        &self,
        session_id: &str,
        expected_version: i64,
    ) -> Result<ExamSession, ExamError> {
        let session = self
            .get_session(session_id)
            .await?
            .ok_or(ExamError::SessionNotFound)?;
        if session.status != SessionStatus::Active {
            return Err(ExamError::SessionNotActive);
        }
        if session.version != expected_version {
            return Err(ExamError::StaleSession);
        }
        Ok(session)
    }

    /// Installs an updated session if nobody else advanced it since the
    /// snapshot was taken, in memory first and then through the guarded
    /// row update. A lost storage race evicts the local copy so the
    /// next read refetches.
    async fn commit(
        &self,
        updated: ExamSession,
        expected_version: i64,
    ) -> Result<ExamSession, ExamError> {
        {
            let mut sessions = self.sessions.write().await;
            if let Some(current) = sessions.get(&updated.id) {
                if current.version != expected_version {
                    return Err(ExamError::StaleSession);
                }
            }
            sessions.insert(updated.id.clone(), updated.clone());
        }

        if let Some(db) = &self.db_proxy {
            let stored = session_ops::update_session_guarded(db, &updated, expected_version).await?;
            if !stored {
                let mut sessions = self.sessions.write().await;
                sessions.remove(&updated.id);
                return Err(ExamError::StaleSession);
            }
        }
        Ok(updated)
    }

    async fn element_context(&self, session: &ExamSession, code: &str) -> ElementContext {
        match self.curriculum.load_rating(session.config.rating.trim()).await {
            Ok(curriculum) => match curriculum.element_by_code(code) {
                Some((task, element)) => ElementContext {
                    area_name: task.area_name.clone(),
                    task_name: task.task_name.clone(),
                    description: element.description.clone(),
                },
                None => {
                    warn!(code, "element missing from curriculum, using code-derived context");
                    ElementContext::fallback(code)
                }
            },
            Err(e) => {
                warn!(error = %e, "curriculum unavailable mid-session, using code-derived context");
                ElementContext::fallback(code)
            }
        }
    }

    async fn prefetch_grounding(
        &self,
        session: &ExamSession,
        code: Option<&str>,
    ) -> Vec<ChunkSearchResult> {
        let Some(code) = code else {
            return Vec::new();
        };
        let context = self.element_context(session, code).await;
        let query = format!("{}: {}", context.task_name, context.description);
        self.retriever.retrieve_with_timeout(&query).await
    }

    /// Produces the question text for an element, grounded in retrieved
    /// reference passages. Falls back to a scripted question whenever
    /// the examiner model is unavailable or returns garbage; a session
    /// never stalls on the generator.
    async fn generate_question(
        &self,
        session: &ExamSession,
        code: &str,
        attempt_number: u32,
        prefetched: Option<Vec<ChunkSearchResult>>,
    ) -> (String, Vec<String>, Vec<ChunkSearchResult>) {
        let context = self.element_context(session, code).await;
        let grounding = match prefetched {
            Some(grounding) => grounding,
            None => {
                let query = format!("{}: {}", context.task_name, context.description);
                self.retriever.retrieve_with_timeout(&query).await
            }
        };

        if !self.llm.is_available() {
            return (
                scripted_question(&context.description, attempt_number),
                Vec::new(),
                grounding,
            );
        }

        let grounding_text = format_grounding(&grounding);
        let user_prompt = build_question_prompt(&QuestionPromptInput {
            element_code: code,
            element_description: &context.description,
            area_name: &context.area_name,
            task_name: &context.task_name,
            attempt_number,
            grounding: &grounding_text,
        });

        match self.llm.complete_json(EXAMINER_SYSTEM_PROMPT, &user_prompt).await {
            Ok(raw) => match parse_question_response(&raw) {
                Ok((question, related)) => (question, related, grounding),
                Err(e) => {
                    warn!(error = %e, code, "examiner response unparseable, using scripted question");
                    (
                        scripted_question(&context.description, attempt_number),
                        Vec::new(),
                        grounding,
                    )
                }
            },
            Err(e) => {
                warn!(error = %e, code, "examiner call failed, using scripted question");
                (
                    scripted_question(&context.description, attempt_number),
                    Vec::new(),
                    grounding,
                )
            }
        }
    }

    /// Grades one answer. A self-graded outcome is taken as-is; free
    /// text goes to the assessor model. Assessor trouble degrades to a
    /// partial credit with an explanatory note rather than failing the
    /// turn.
    async fn grade_answer(
        &self,
        session: &ExamSession,
        code: &str,
        question: &str,
        self_outcome: Option<AttemptOutcome>,
        answer_text: Option<&str>,
    ) -> (AttemptOutcome, Option<String>, Option<String>) {
        if let Some(outcome) = self_outcome {
            return (outcome, None, None);
        }
        let Some(answer) = answer_text else {
            return (AttemptOutcome::Partial, None, None);
        };

        if !self.llm.is_available() {
            return (
                AttemptOutcome::Partial,
                Some("Automated assessment is not configured; the answer was recorded for self-review.".into()),
                None,
            );
        }

        let context = self.element_context(session, code).await;
        let user_prompt = build_assessment_prompt(&AssessmentPromptInput {
            element_code: code,
            element_description: &context.description,
            question,
            answer,
            grounding: "",
        });

        match self.llm.complete_json(ASSESSOR_SYSTEM_PROMPT, &user_prompt).await {
            Ok(raw) => match parse_assessment_response(&raw) {
                Ok((label, quick, detailed)) => {
                    let outcome = match AttemptOutcome::parse(&label) {
                        Some(outcome) => outcome,
                        None => {
                            warn!(label = %label, code, "assessor label outside rubric, scoring partial");
                            AttemptOutcome::Partial
                        }
                    };
                    (outcome, quick, detailed)
                }
                Err(e) => {
                    warn!(error = %e, code, "assessor response unparseable, scoring partial");
                    (
                        AttemptOutcome::Partial,
                        Some("Assessment was unavailable for this answer.".into()),
                        None,
                    )
                }
            },
            Err(e) => {
                warn!(error = %e, code, "assessor call failed, scoring partial");
                (
                    AttemptOutcome::Partial,
                    Some("Assessment was unavailable for this answer.".into()),
                    None,
                )
            }
        }
    }
}

fn progress_of(session: &ExamSession) -> SessionProgress {
    SessionProgress {
        asked_count: session.plan.asked_count,
        planned_question_count: session.plan.planned_question_count,
        bonus_used: session.plan.bonus_used,
        is_complete: plan::is_complete(&session.plan),
    }
}

fn has_graded_attempt(session: &ExamSession, code: &str) -> bool {
    session.attempts.iter().any(|a| a.element_code == code)
}

fn credit_mentions(session: &mut ExamSession, asked_code: &str, related: &[String]) {
    if related.is_empty() {
        return;
    }
    let mentioned: Vec<String> = related
        .iter()
        .filter(|c| c.as_str() != asked_code)
        .cloned()
        .collect();
    if !mentioned.is_empty() {
        session.plan = plan::credit_by_mention(&session.plan, &mentioned);
    }
}

fn spans_multiple_areas(queue: &[String]) -> bool {
    let mut first: Option<&str> = None;
    for code in queue {
        let area = area_prefix(code);
        match first {
            None => first = Some(area),
            Some(seen) if seen != area => return true,
            _ => {}
        }
    }
    false
}

/// Deterministic question used when no examiner model is configured.
fn scripted_question(description: &str, attempt_number: u32) -> String {
    let topic = description.trim().trim_end_matches('.');
    if attempt_number > 1 {
        format!("Let's dig into that further. What else can you tell me about {topic}?")
    } else {
        format!("Tell me about {topic}.")
    }
}

fn parse_question_response(raw: &str) -> Result<(String, Vec<String>), LLMError> {
    let trimmed = raw.trim();
    let json_str = trimmed
        .strip_prefix("```json")
        .and_then(|s| s.strip_suffix("```"))
        .or_else(|| trimmed.strip_prefix("```").and_then(|s| s.strip_suffix("```")))
        .unwrap_or(trimmed);

    #[derive(serde::Deserialize)]
    struct QuestionResponse {
        question: String,
        #[serde(rename = "relatedElementCodes", default)]
        related_element_codes: Vec<String>,
    }

    let parsed: QuestionResponse =
        serde_json::from_str(json_str.trim()).map_err(LLMError::Json)?;
    if parsed.question.trim().is_empty() {
        return Err(LLMError::EmptyChoices);
    }
    Ok((parsed.question, parsed.related_element_codes))
}

fn parse_assessment_response(
    raw: &str,
) -> Result<(String, Option<String>, Option<String>), LLMError> {
    let trimmed = raw.trim();
    let json_str = trimmed
        .strip_prefix("```json")
        .and_then(|s| s.strip_suffix("```"))
        .or_else(|| trimmed.strip_prefix("```").and_then(|s| s.strip_suffix("```")))
        .unwrap_or(trimmed);

    #[derive(serde::Deserialize)]
    struct AssessmentResponse {
        outcome: String,
        #[serde(rename = "quickFeedback", default)]
        quick_feedback: Option<String>,
        #[serde(rename = "detailedFeedback", default)]
        detailed_feedback: Option<String>,
    }

    let parsed: AssessmentResponse =
        serde_json::from_str(json_str.trim()).map_err(LLMError::Json)?;
    Ok((parsed.outcome, parsed.quick_feedback, parsed.detailed_feedback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_question_response_plain_and_fenced() {
        let plain = r#"{"question":"What are the VFR weather minimums for Class E below 10,000 feet?","relatedElementCodes":["PA.I.C.K2"]}"#;
        let (question, related) = parse_question_response(plain).unwrap();
        assert!(question.contains("Class E"));
        assert_eq!(related, vec!["PA.I.C.K2".to_string()]);

        let fenced = "```json\n{\"question\":\"Q?\"}\n```";
        let (question, related) = parse_question_response(fenced.trim()).unwrap();
        assert_eq!(question, "Q?");
        assert!(related.is_empty());
    }

    #[test]
    fn test_parse_question_response_rejects_blank_question() {
        assert!(parse_question_response(r#"{"question":"  "}"#).is_err());
        assert!(parse_question_response("not json").is_err());
    }

    #[test]
    fn test_parse_assessment_response() {
        let raw = r#"{"outcome":"partial","quickFeedback":"Close.","detailedFeedback":"Missed night currency."}"#;
        let (label, quick, detailed) = parse_assessment_response(raw).unwrap();
        assert_eq!(label, "partial");
        assert_eq!(quick.as_deref(), Some("Close."));
        assert_eq!(detailed.as_deref(), Some("Missed night currency."));
    }

    #[test]
    fn test_scripted_question_varies_by_attempt() {
        let first = scripted_question("Weather minimums.", 1);
        let retry = scripted_question("Weather minimums.", 2);
        assert!(first.starts_with("Tell me about"));
        assert_ne!(first, retry);
    }

    #[test]
    fn test_spans_multiple_areas() {
        let one = vec!["PA.I.A.K1".to_string(), "PA.I.B.K1".to_string()];
        assert!(!spans_multiple_areas(&one));
        let two = vec!["PA.I.A.K1".to_string(), "PA.II.A.K1".to_string()];
        assert!(spans_multiple_areas(&two));
        assert!(!spans_multiple_areas(&[]));
    }
}
