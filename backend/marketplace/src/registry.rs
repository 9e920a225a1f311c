//! Public registry: the anonymised feed of recent orders.
//!
//! [`RegistryEntry`] has no email field at all, so nothing built from it can
//! leak a buyer's address. Names are cut to a short prefix.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db;
use crate::errors::Result;
use crate::models::{Order, OrderStatus};

/// Number of entries returned when the caller gives no `limit`.
pub const DEFAULT_REGISTRY_LIMIT: u32 = 20;

const MASK_PREFIX_CHARS: usize = 4;
const MASK_SUFFIX: &str = "***";
const ANONYMOUS: &str = "Anon***";

/// An order as shown on the public registry page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryEntry {
    pub id: String,
    pub project_id: String,
    pub project_title: String,
    pub user_name: String,
    pub quantity_tons: f64,
    pub total_price: f64,
    pub currency: String,
    pub registry_serial_number: String,
    pub transaction_hash: String,
    pub status: OrderStatus,
    pub created_at: i64,
}

impl From<Order> for RegistryEntry {
    fn from(order: Order) -> Self {
        RegistryEntry {
            user_name: mask_name(order.user_name.as_deref()),
            id: order.id,
            project_id: order.project_id,
            project_title: order.project_title,
            quantity_tons: order.quantity_tons,
            total_price: order.total_price,
            currency: order.currency,
            registry_serial_number: order.registry_serial_number,
            transaction_hash: order.transaction_hash,
            status: order.status,
            created_at: order.created_at,
        }
    }
}

/// First four characters of the name followed by `***`; `Anon***` when absent.
pub fn mask_name(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => {
            let prefix: String = n.chars().take(MASK_PREFIX_CHARS).collect();
            format!("{prefix}{MASK_SUFFIX}")
        }
        None => ANONYMOUS.to_string(),
    }
}

/// The `limit` most recent orders, newest first, anonymised.
pub async fn recent_entries(pool: &SqlitePool, limit: u32) -> Result<Vec<RegistryEntry>> {
    let orders = db::recent_orders(pool, limit).await?;
    Ok(orders.into_iter().map(RegistryEntry::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn order(id: &str, name: Option<&str>, created_at: i64) -> Order {
        Order {
            id: id.to_string(),
            project_id: "p1".to_string(),
            project_title: "Mangrove Restoration".to_string(),
            user_email: "secret@example.com".to_string(),
            user_name: name.map(str::to_string),
            quantity_tons: 1.5,
            total_price: 15.0,
            currency: "USD".to_string(),
            registry_serial_number: "VCU-654321".to_string(),
            transaction_hash: "ab".repeat(32),
            status: OrderStatus::Processing,
            created_at,
        }
    }

    #[test]
    fn names_are_truncated_to_four_characters() {
        assert_eq!(mask_name(Some("Greta Thunberg")), "Gret***");
        assert_eq!(mask_name(Some("Anna")), "Anna***");
        assert_eq!(mask_name(Some("Bo")), "Bo***");
        assert_eq!(mask_name(Some("Zoë Åberg")), "Zoë ***");
    }

    #[test]
    fn missing_names_become_anon() {
        assert_eq!(mask_name(None), "Anon***");
        assert_eq!(mask_name(Some("   ")), "Anon***");
    }

    #[test]
    fn entries_never_serialize_an_email() {
        let entry = RegistryEntry::from(order("o1", Some("Greta"), 1));
        let json = serde_json::to_value(&entry).unwrap();
        let fields = json.as_object().unwrap();

        assert!(!fields.contains_key("user_email"));
        assert!(!json.to_string().contains("secret@example.com"));
        assert_eq!(fields["user_name"], "Gret***");
        assert_eq!(fields["registry_serial_number"], "VCU-654321");
        assert_eq!(fields["project_title"], "Mangrove Restoration");
    }

    #[tokio::test]
    async fn returns_the_most_recent_orders_descending() {
        let pool = test_pool().await;
        {
            let mut conn = pool.acquire().await.unwrap();
            for i in 0..25 {
                db::insert_order(&mut conn, &order(&format!("o{i}"), None, 1_000 + i))
                    .await
                    .unwrap();
            }
        }

        let entries = recent_entries(&pool, DEFAULT_REGISTRY_LIMIT).await.unwrap();
        assert_eq!(entries.len(), 20);
        assert_eq!(entries[0].id, "o24");
        assert_eq!(entries[19].id, "o5");
        assert!(entries
            .windows(2)
            .all(|w| w[0].created_at > w[1].created_at));
        assert!(entries.iter().all(|e| e.user_name == "Anon***"));
    }
}
