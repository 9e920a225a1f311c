//! Database layer: migrations, the project catalog and the order ledger.
//!
//! Reads that stand alone take the pool. Writes that settlement or seeding
//! need to group into a transaction take a `&mut SqliteConnection`, so the
//! caller can pass `&mut *tx`.

use std::str::FromStr;
use std::time::Duration;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqliteConnection, SqlitePool,
};
use tracing::info;

use crate::errors::Result;
use crate::models::{MarketStats, Order, Project, ProjectRow};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

const PROJECT_COLUMNS: &str = r#"
    id, title, description, location, image_url, category, price_per_ton,
    currency, available_tons, verification_standard, vintage_year,
    sdg_impact, auditor_reports, created_at
"#;

const ORDER_COLUMNS: &str = r#"
    id, project_id, project_title, user_email, user_name, quantity_tons,
    total_price, currency, registry_serial_number, transaction_hash, status,
    created_at
"#;

// ─────────────────────────────────────────────────────────
// Project catalog
// ─────────────────────────────────────────────────────────

pub async fn insert_project(conn: &mut SqliteConnection, project: &Project) -> Result<()> {
    let sdg_impact = serde_json::to_string(&project.sdg_impact)?;
    let auditor_reports = serde_json::to_string(&project.auditor_reports)?;
    sqlx::query(
        r#"
        INSERT INTO projects
            (id, title, description, location, image_url, category, price_per_ton,
             currency, available_tons, verification_standard, vintage_year,
             sdg_impact, auditor_reports, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&project.id)
    .bind(&project.title)
    .bind(&project.description)
    .bind(&project.location)
    .bind(&project.image_url)
    .bind(project.category.as_str())
    .bind(project.price_per_ton)
    .bind(&project.currency)
    .bind(project.available_tons)
    .bind(project.verification_standard.map(|s| s.as_str()))
    .bind(project.vintage_year)
    .bind(sdg_impact)
    .bind(auditor_reports)
    .bind(project.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// All catalog entries in listing order.
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at ASC, rowid ASC"
    ))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Project::try_from).collect()
}

pub async fn get_project(pool: &SqlitePool, id: &str) -> Result<Option<Project>> {
    let mut conn = pool.acquire().await?;
    fetch_project(&mut conn, id).await
}

/// Same as [`get_project`], but on a caller-supplied connection or transaction.
pub async fn fetch_project(conn: &mut SqliteConnection, id: &str) -> Result<Option<Project>> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    row.map(Project::try_from).transpose()
}

/// Hard delete. Returns `true` when a row was removed.
pub async fn delete_project(pool: &SqlitePool, id: &str) -> Result<bool> {
    let rows_affected = sqlx::query("DELETE FROM projects WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows_affected > 0)
}

/// Remove every catalog entry. Used by the start-up seed.
pub async fn clear_projects(conn: &mut SqliteConnection) -> Result<u64> {
    let rows_affected = sqlx::query("DELETE FROM projects")
        .execute(conn)
        .await?
        .rows_affected();
    Ok(rows_affected)
}

/// Slack allowed when comparing tons, so rounding left over from earlier
/// fractional sales does not refuse stock the catalog still holds.
pub const TONS_EPSILON: f64 = 1e-9;

/// Subtract `quantity` from the project's inventory, but only if at least that
/// much is available (within [`TONS_EPSILON`]). The stored value never drops
/// below zero. Returns `false` when the project is missing or short.
pub async fn decrement_inventory(
    conn: &mut SqliteConnection,
    project_id: &str,
    quantity: f64,
) -> Result<bool> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE projects
        SET    available_tons = MAX(0.0, available_tons - ?1)
        WHERE  id = ?2 AND available_tons >= ?1 - ?3
        "#,
    )
    .bind(quantity)
    .bind(project_id)
    .bind(TONS_EPSILON)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(rows_affected == 1)
}

// ─────────────────────────────────────────────────────────
// Order ledger
// ─────────────────────────────────────────────────────────

pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders
            (id, project_id, project_title, user_email, user_name, quantity_tons,
             total_price, currency, registry_serial_number, transaction_hash, status,
             created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&order.id)
    .bind(&order.project_id)
    .bind(&order.project_title)
    .bind(&order.user_email)
    .bind(&order.user_name)
    .bind(order.quantity_tons)
    .bind(order.total_price)
    .bind(&order.currency)
    .bind(&order.registry_serial_number)
    .bind(&order.transaction_hash)
    .bind(order.status)
    .bind(order.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_order(pool: &SqlitePool, id: &str) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(order)
}

/// The `limit` most recent orders, newest first. Orders created in the same
/// millisecond come back in reverse insertion order.
pub async fn recent_orders(pool: &SqlitePool, limit: u32) -> Result<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        r#"
        SELECT {ORDER_COLUMNS}
        FROM   orders
        ORDER  BY created_at DESC, rowid DESC
        LIMIT  ?1
        "#
    ))
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

pub async fn market_stats(pool: &SqlitePool) -> Result<MarketStats> {
    let (total_tons, total_orders): (f64, i64) = sqlx::query_as(
        "SELECT CAST(COALESCE(SUM(quantity_tons), 0) AS REAL), COUNT(*) FROM orders",
    )
    .fetch_one(pool)
    .await?;
    let (total_projects,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
        .fetch_one(pool)
        .await?;
    Ok(MarketStats {
        total_tons,
        total_projects,
        total_orders,
    })
}

/// Pool for tests: a single in-memory connection that is never recycled,
/// so the database lives as long as the pool.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");
    pool
}

/// Catalog entry for tests: $10/ton, hydro.
#[cfg(test)]
pub fn test_project(id: &str, available_tons: f64, created_at: i64) -> Project {
    use crate::models::ProjectCategory;

    Project {
        id: id.to_string(),
        title: format!("Project {id}"),
        description: "Run-of-river hydro".to_string(),
        location: "Nepal".to_string(),
        image_url: String::new(),
        category: ProjectCategory::Hydro,
        price_per_ton: 10.0,
        currency: "USD".to_string(),
        available_tons,
        verification_standard: None,
        vintage_year: Some(2022),
        sdg_impact: vec![7, 13],
        auditor_reports: vec![],
        created_at,
    }
}
