//! Start-up catalog seeding from a JSON file of projects.

use std::path::Path;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::db;
use crate::errors::{MarketError, Result};
use crate::models::NewProject;

/// Read and validate a JSON array of [`NewProject`] entries.
pub async fn load_seed_file(path: &Path) -> Result<Vec<NewProject>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let projects: Vec<NewProject> = serde_json::from_str(&raw)?;
    for (index, project) in projects.iter().enumerate() {
        project.validate().map_err(|e| {
            MarketError::Validation(format!("seed entry {index} ('{}'): {e}", project.title))
        })?;
    }
    Ok(projects)
}

/// Replace the whole catalog with `projects` in a single transaction.
///
/// Orders are left alone; they keep their title snapshots.
pub async fn replace_catalog(pool: &SqlitePool, projects: Vec<NewProject>) -> Result<usize> {
    let base = Utc::now().timestamp_millis();
    let mut tx = pool.begin().await?;

    let removed = db::clear_projects(&mut *tx).await?;
    let count = projects.len();
    for (offset, project) in (0_i64..).zip(projects) {
        db::insert_project(&mut *tx, &project.into_project(base + offset)).await?;
    }
    tx.commit().await?;

    info!("Seeded catalog: {removed} old projects cleared, {count} inserted");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, test_project};

    fn write_seed(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("seed-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn seed_replaces_existing_catalog_in_file_order() {
        let pool = test_pool().await;
        db::insert_project(&mut *pool.acquire().await.unwrap(), &test_project("old", 1.0, 1))
            .await
            .unwrap();

        let path = write_seed(
            r#"[
                {"title": "Gansu Wind Farm", "description": "Grid-connected wind",
                 "type": "Wind", "price_per_ton": 8, "available_tons": 2000},
                {"title": "Sundarbans Mangroves", "description": "Coastal restoration",
                 "category": "Blue Carbon", "price_per_ton": 24.5, "available_tons": 300,
                 "verification_standard": "Gold Standard", "sdg_impact": [13, 14]}
            ]"#,
        );

        let projects = load_seed_file(&path).await.unwrap();
        assert_eq!(replace_catalog(&pool, projects).await.unwrap(), 2);
        std::fs::remove_file(&path).ok();

        let titles: Vec<String> = db::list_projects(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, ["Gansu Wind Farm", "Sundarbans Mangroves"]);
    }

    #[tokio::test]
    async fn bundled_seed_file_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("seed/projects.json");
        let projects = load_seed_file(&path).await.unwrap();
        assert_eq!(projects.len(), 4);
    }

    #[tokio::test]
    async fn invalid_entries_abort_the_seed() {
        let path = write_seed(
            r#"[{"title": "Bad", "description": "negative stock",
                 "type": "Solar", "price_per_ton": 5, "available_tons": -3}]"#,
        );
        let err = load_seed_file(&path).await.unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, MarketError::Validation(_)));
    }
}
