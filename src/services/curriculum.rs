use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{keys, RedisCache};
use crate::db::operations::curriculum as curriculum_ops;
use crate::db::DatabaseProxy;
use crate::exam::types::{Element, ElementType, Task};

#[derive(Debug, Error)]
pub enum CurriculumError {
    #[error("no curriculum found for rating {0}")]
    NotFound(String),
    #[error("curriculum store unavailable")]
    Unavailable,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// One rating's task list with a code index on top. Built once per
/// load; sessions only read from it.
#[derive(Debug, Clone)]
pub struct RatingCurriculum {
    pub rating: String,
    pub tasks: Vec<Task>,
    index: HashMap<String, (usize, ElementType, usize)>,
}

impl RatingCurriculum {
    pub fn new(rating: String, tasks: Vec<Task>) -> Self {
        let mut index = HashMap::new();
        for (task_idx, task) in tasks.iter().enumerate() {
            for (el_idx, el) in task.knowledge_elements.iter().enumerate() {
                index.insert(el.code.clone(), (task_idx, ElementType::Knowledge, el_idx));
            }
            for (el_idx, el) in task.risk_elements.iter().enumerate() {
                index.insert(el.code.clone(), (task_idx, ElementType::Risk, el_idx));
            }
            for (el_idx, el) in task.skill_elements.iter().enumerate() {
                index.insert(el.code.clone(), (task_idx, ElementType::Skill, el_idx));
            }
        }
        Self { rating, tasks, index }
    }

    /// Elements of every task applicable to the given aircraft class,
    /// in ACS order: tasks by sort order, knowledge then risk then
    /// skill within a task.
    pub fn elements_for_class(&self, aircraft_class: Option<&str>) -> Vec<Element> {
        let mut elements = Vec::new();
        for task in &self.tasks {
            if !task.applies_to_class(aircraft_class) {
                continue;
            }
            elements.extend(task.knowledge_elements.iter().cloned());
            elements.extend(task.risk_elements.iter().cloned());
            elements.extend(task.skill_elements.iter().cloned());
        }
        elements
    }

    /// How many examinable (knowledge and risk) elements the rating
    /// holds for the class. Skills are checked in the aircraft, not
    /// in the oral, so they do not count toward exam length.
    pub fn askable_count(&self, aircraft_class: Option<&str>) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.applies_to_class(aircraft_class))
            .map(|t| t.knowledge_elements.len() + t.risk_elements.len())
            .sum()
    }

    pub fn element_by_code(&self, code: &str) -> Option<(&Task, &Element)> {
        let &(task_idx, element_type, el_idx) = self.index.get(code)?;
        let task = self.tasks.get(task_idx)?;
        let element = match element_type {
            ElementType::Knowledge => task.knowledge_elements.get(el_idx)?,
            ElementType::Risk => task.risk_elements.get(el_idx)?,
            ElementType::Skill => task.skill_elements.get(el_idx)?,
        };
        Some((task, element))
    }

    /// Concept-tag sets keyed by element code, for the topic-adjacency
    /// walk. Elements without tags are simply absent.
    pub fn fingerprints(&self) -> HashMap<String, HashSet<String>> {
        let mut map = HashMap::new();
        for task in &self.tasks {
            for el in task
                .knowledge_elements
                .iter()
                .chain(task.risk_elements.iter())
            {
                if !el.tags.is_empty() {
                    map.insert(el.code.clone(), el.tags.iter().cloned().collect());
                }
            }
        }
        map
    }
}

/// Read-through cache over the curriculum tables: process-local map
/// first, then Redis, then Postgres. Ratings change rarely, so entries
/// live until explicitly invalidated or their TTL lapses.
pub struct CurriculumService {
    db: Option<Arc<DatabaseProxy>>,
    cache: Option<Arc<RedisCache>>,
    local: RwLock<HashMap<String, Arc<RatingCurriculum>>>,
}

impl CurriculumService {
    pub fn new(db: Option<Arc<DatabaseProxy>>, cache: Option<Arc<RedisCache>>) -> Self {
        Self {
            db,
            cache,
            local: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load_rating(&self, rating: &str) -> Result<Arc<RatingCurriculum>, CurriculumError> {
        {
            let local = self.local.read().await;
            if let Some(curriculum) = local.get(rating) {
                return Ok(Arc::clone(curriculum));
            }
        }

        if let Some(cache) = &self.cache {
            if let Some(tasks) = cache.get::<Vec<Task>>(&keys::curriculum_key(rating)).await {
                debug!(rating, "curriculum loaded from redis");
                return Ok(self.store_local(rating, tasks).await);
            }
        }

        let Some(db) = &self.db else {
            return Err(CurriculumError::Unavailable);
        };

        let tasks = curriculum_ops::load_rating_tasks(db, rating).await?;
        if tasks.is_empty() {
            return Err(CurriculumError::NotFound(rating.to_string()));
        }

        if let Some(cache) = &self.cache {
            cache
                .set(&keys::curriculum_key(rating), &tasks, keys::CURRICULUM_TTL)
                .await;
        }
        debug!(rating, task_count = tasks.len(), "curriculum loaded from database");
        Ok(self.store_local(rating, tasks).await)
    }

    /// Installs a curriculum directly, bypassing the database. Lets
    /// deployments without storage, and tests, run against a fixture.
    pub async fn register_rating(&self, rating: &str, tasks: Vec<Task>) {
        if let Some(cache) = &self.cache {
            cache
                .set(&keys::curriculum_key(rating), &tasks, keys::CURRICULUM_TTL)
                .await;
        }
        self.store_local(rating, tasks).await;
    }

    pub async fn invalidate(&self, rating: &str) {
        {
            let mut local = self.local.write().await;
            local.remove(rating);
        }
        if let Some(cache) = &self.cache {
            cache.delete(&keys::curriculum_key(rating)).await;
        }
        warn!(rating, "curriculum cache invalidated");
    }

    async fn store_local(&self, rating: &str, tasks: Vec<Task>) -> Arc<RatingCurriculum> {
        let curriculum = Arc::new(RatingCurriculum::new(rating.to_string(), tasks));
        let mut local = self.local.write().await;
        local.insert(rating.to_string(), Arc::clone(&curriculum));
        Arc::clone(&curriculum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::types::Difficulty;

    fn element(code: &str, task_id: &str, element_type: ElementType) -> Element {
        Element {
            code: code.to_string(),
            task_id: task_id.to_string(),
            element_type,
            difficulty: Difficulty::Medium,
            order_index: 0,
            weight: 1.0,
            description: format!("description for {code}"),
            tags: Vec::new(),
        }
    }

    fn task(id: &str, classes: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            rating: "PA".to_string(),
            area_id: "PA.I".to_string(),
            area_name: "Preflight Preparation".to_string(),
            task_name: format!("Task {id}"),
            sort_order: 0,
            applicable_classes: classes.iter().map(|c| c.to_string()).collect(),
            knowledge_elements: vec![
                element(&format!("{id}.K1"), id, ElementType::Knowledge),
                element(&format!("{id}.K2"), id, ElementType::Knowledge),
            ],
            risk_elements: vec![element(&format!("{id}.R1"), id, ElementType::Risk)],
            skill_elements: vec![element(&format!("{id}.S1"), id, ElementType::Skill)],
        }
    }

    #[test]
    fn test_askable_count_skips_skills() {
        let curriculum =
            RatingCurriculum::new("PA".to_string(), vec![task("PA.I.A", &[]), task("PA.I.B", &[])]);
        assert_eq!(curriculum.askable_count(None), 6);
    }

    #[test]
    fn test_class_filter_drops_inapplicable_tasks() {
        let curriculum = RatingCurriculum::new(
            "PA".to_string(),
            vec![task("PA.I.A", &[]), task("PA.I.B", &["ASES"])],
        );

        let asel = curriculum.elements_for_class(Some("ASEL"));
        assert!(asel.iter().all(|e| e.task_id == "PA.I.A"));

        let ases = curriculum.elements_for_class(Some("ASES"));
        assert_eq!(ases.len(), 8);
    }

    #[test]
    fn test_element_lookup_by_code() {
        let curriculum = RatingCurriculum::new("PA".to_string(), vec![task("PA.I.A", &[])]);
        let (task, element) = curriculum.element_by_code("PA.I.A.R1").unwrap();
        assert_eq!(task.id, "PA.I.A");
        assert_eq!(element.element_type, ElementType::Risk);
        assert!(curriculum.element_by_code("PA.IX.Z.K9").is_none());
    }

    #[tokio::test]
    async fn test_register_then_load_without_database() {
        let service = CurriculumService::new(None, None);
        assert!(matches!(
            service.load_rating("PA").await,
            Err(CurriculumError::Unavailable)
        ));

        service.register_rating("PA", vec![task("PA.I.A", &[])]).await;
        let curriculum = service.load_rating("PA").await.unwrap();
        assert_eq!(curriculum.rating, "PA");
        assert_eq!(curriculum.tasks.len(), 1);
    }
}
