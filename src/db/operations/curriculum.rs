use std::collections::HashMap;

use sqlx::Row;

use crate::db::DatabaseProxy;
use crate::exam::types::{Difficulty, Element, ElementType, Task};

/// Loads every task of a rating with its elements attached, in ACS
/// order: tasks by sort order, elements by order index within a task.
pub async fn load_rating_tasks(
    proxy: &DatabaseProxy,
    rating: &str,
) -> Result<Vec<Task>, sqlx::Error> {
    let task_rows = sqlx::query(
        r#"
        SELECT "id", "rating", "areaId", "areaName", "taskName", "sortOrder", "applicableClasses"
        FROM "curriculum_tasks"
        WHERE "rating" = $1
        ORDER BY "sortOrder" ASC
        "#,
    )
    .bind(rating)
    .fetch_all(proxy.pool())
    .await?;

    let mut tasks = Vec::with_capacity(task_rows.len());
    let mut index_by_id: HashMap<String, usize> = HashMap::new();
    for row in task_rows {
        let id: String = row.get("id");
        index_by_id.insert(id.clone(), tasks.len());
        tasks.push(Task {
            id,
            rating: row.get("rating"),
            area_id: row.get("areaId"),
            area_name: row.get("areaName"),
            task_name: row.get("taskName"),
            sort_order: row.get("sortOrder"),
            applicable_classes: row.get("applicableClasses"),
            knowledge_elements: Vec::new(),
            risk_elements: Vec::new(),
            skill_elements: Vec::new(),
        });
    }

    let element_rows = sqlx::query(
        r#"
        SELECT e."code", e."taskId", e."elementType", e."difficulty", e."orderIndex",
               e."weight", e."description", e."tags"
        FROM "curriculum_elements" e
        JOIN "curriculum_tasks" t ON t."id" = e."taskId"
        WHERE t."rating" = $1
        ORDER BY t."sortOrder" ASC, e."orderIndex" ASC
        "#,
    )
    .bind(rating)
    .fetch_all(proxy.pool())
    .await?;

    for row in element_rows {
        let task_id: String = row.get("taskId");
        let Some(&idx) = index_by_id.get(&task_id) else {
            continue;
        };

        let element_type_raw: String = row.get("elementType");
        let difficulty_raw: String = row.get("difficulty");
        let element = Element {
            code: row.get("code"),
            task_id,
            element_type: ElementType::parse(&element_type_raw),
            difficulty: Difficulty::parse(&difficulty_raw),
            order_index: row.get("orderIndex"),
            weight: row.get("weight"),
            description: row.get("description"),
            tags: row.get("tags"),
        };

        let task = &mut tasks[idx];
        match element.element_type {
            ElementType::Knowledge => task.knowledge_elements.push(element),
            ElementType::Risk => task.risk_elements.push(element),
            ElementType::Skill => task.skill_elements.push(element),
        }
    }

    Ok(tasks)
}
