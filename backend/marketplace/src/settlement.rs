//! Order settlement: turns a purchase request into a persisted ledger entry.
//!
//! The inventory decrement and the order insert run in one SQLite
//! transaction. The decrement is conditional on enough tons being left, so
//! two buyers racing for the last tons cannot both commit.

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::errors::{MarketError, Result};
use crate::models::{Order, OrderStatus, PurchaseRequest};

/// Price hints from the client further than this from the catalog price are logged.
const PRICE_HINT_TOLERANCE: f64 = 0.005;

/// `prefix` followed by six digits drawn uniformly from 100000..=999999.
///
/// Uniqueness is not checked against the ledger.
pub fn generate_serial_number(prefix: &str) -> String {
    let digits: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    format!("{prefix}{digits}")
}

/// Hex SHA-256 over `user_email ‖ project_id ‖ timestamp_ms`.
///
/// Quantity and price are not part of the preimage, so the hash only
/// identifies who bought from which project at what instant.
pub fn compute_transaction_hash(user_email: &str, project_id: &str, timestamp_ms: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_email.as_bytes());
    hasher.update(project_id.as_bytes());
    hasher.update(timestamp_ms.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Settle a purchase and return the committed order.
///
/// Price and project title come from the catalog at transaction time; the
/// client's `total_price` and `project_title` are only compared and logged.
pub async fn settle(pool: &SqlitePool, config: &Config, request: PurchaseRequest) -> Result<Order> {
    request.validate()?;

    let project_id = request.project_id.trim();
    let user_email = request.user_email.trim();
    let quantity = request.quantity_tons;

    let mut tx = pool.begin().await?;

    // Take the write lock first so the read below sees our own decrement.
    let decremented = db::decrement_inventory(&mut *tx, project_id, quantity).await?;

    let project = db::fetch_project(&mut *tx, project_id)
        .await?
        .ok_or_else(|| MarketError::NotFound(format!("Project {project_id}")))?;

    if !decremented {
        return Err(MarketError::InsufficientInventory {
            requested: quantity,
            available: project.available_tons,
        });
    }

    let total_price = quantity * project.price_per_ton;
    if let Some(hint) = request.total_price {
        if (hint - total_price).abs() > PRICE_HINT_TOLERANCE {
            warn!(
                "Ignoring client total_price {hint} for project {project_id}; catalog total is {total_price}"
            );
        }
    }
    if let Some(title) = request.project_title.as_deref() {
        if title != project.title {
            warn!("Ignoring client project_title '{title}' for project {project_id}");
        }
    }

    let created_at = Utc::now().timestamp_millis();
    let order = Order {
        id: Uuid::new_v4().to_string(),
        project_id: project.id.clone(),
        project_title: project.title.clone(),
        user_email: user_email.to_string(),
        user_name: request
            .user_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        quantity_tons: quantity,
        total_price,
        currency: project.currency.clone(),
        registry_serial_number: generate_serial_number(&config.serial_prefix),
        transaction_hash: compute_transaction_hash(user_email, &project.id, created_at),
        status: OrderStatus::Processing,
        created_at,
    };

    db::insert_order(&mut *tx, &order).await?;
    tx.commit().await?;

    info!(
        "Settled order {} ({}): {} t of '{}' for {} {}",
        order.id,
        order.registry_serial_number,
        order.quantity_tons,
        order.project_title,
        order.total_price,
        order.currency
    );
    Ok(order)
}
