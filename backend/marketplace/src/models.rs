//! Catalog and ledger types shared by the database layer, settlement and the API.
//!
//! Wire field names (`user_email`, `quantity_tons`, `registry_serial_number`, ...)
//! are the ones the storefront already consumes, so they are kept verbatim.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{MarketError, Result};

// ─────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────

/// Kind of emission-reduction project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectCategory {
    Solar,
    Wind,
    Forestry,
    Biomass,
    Hydro,
    #[serde(rename = "Blue Carbon")]
    BlueCarbon,
}

impl ProjectCategory {
    /// Parse the stored string back into a [`ProjectCategory`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Solar" => Some(Self::Solar),
            "Wind" => Some(Self::Wind),
            "Forestry" => Some(Self::Forestry),
            "Biomass" => Some(Self::Biomass),
            "Hydro" => Some(Self::Hydro),
            "Blue Carbon" => Some(Self::BlueCarbon),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solar => "Solar",
            Self::Wind => "Wind",
            Self::Forestry => "Forestry",
            Self::Biomass => "Biomass",
            Self::Hydro => "Hydro",
            Self::BlueCarbon => "Blue Carbon",
        }
    }
}

/// Certification body the project's credits are issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStandard {
    #[serde(rename = "VERRA")]
    Verra,
    #[serde(rename = "Gold Standard")]
    GoldStandard,
    #[serde(rename = "Climate Action Reserve")]
    ClimateActionReserve,
}

impl VerificationStandard {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "VERRA" => Some(Self::Verra),
            "Gold Standard" => Some(Self::GoldStandard),
            "Climate Action Reserve" => Some(Self::ClimateActionReserve),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verra => "VERRA",
            Self::GoldStandard => "Gold Standard",
            Self::ClimateActionReserve => "Climate Action Reserve",
        }
    }
}

/// Presentation status of an order.
///
/// Orders are persisted as `Processing`; the later stages are only animated by
/// the storefront and no server operation advances them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    Processing,
    Allocating,
    Retiring,
    Certified,
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditorReport {
    pub auditor_name: String,
    pub audit_date: NaiveDate,
    /// 1-10 audit score.
    pub rating: u8,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "default_true")]
    pub verified: bool,
}

/// Fields an administrator supplies when listing a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(alias = "type")]
    pub category: ProjectCategory,
    pub price_per_ton: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(alias = "co2_tons_available")]
    pub available_tons: f64,
    #[serde(default)]
    pub verification_standard: Option<VerificationStandard>,
    #[serde(default)]
    pub vintage_year: Option<i32>,
    #[serde(default)]
    pub sdg_impact: Vec<u8>,
    #[serde(default)]
    pub auditor_reports: Vec<AuditorReport>,
}

impl NewProject {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(invalid("title must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(invalid("description must not be empty"));
        }
        if !(self.price_per_ton.is_finite() && self.price_per_ton > 0.0) {
            return Err(invalid("price_per_ton must be a positive number"));
        }
        if !(self.available_tons.is_finite() && self.available_tons >= 0.0) {
            return Err(invalid("available_tons must be a non-negative number"));
        }
        if self.currency.trim().is_empty() {
            return Err(invalid("currency must not be empty"));
        }
        if let Some(year) = self.vintage_year {
            if !(1990..=2100).contains(&year) {
                return Err(invalid(&format!("vintage_year {year} is out of range")));
            }
        }
        if let Some(sdg) = self.sdg_impact.iter().find(|g| !(1..=17).contains(*g)) {
            return Err(invalid(&format!("sdg_impact {sdg} is not a UN SDG number")));
        }
        for report in &self.auditor_reports {
            if report.auditor_name.trim().is_empty() {
                return Err(invalid("auditor_name must not be empty"));
            }
            if !(1..=10).contains(&report.rating) {
                return Err(invalid(&format!(
                    "auditor rating {} must be between 1 and 10",
                    report.rating
                )));
            }
        }
        Ok(())
    }

    /// Assign a fresh identifier and creation time.
    pub fn into_project(self, created_at: i64) -> Project {
        Project {
            id: Uuid::new_v4().to_string(),
            title: self.title.trim().to_string(),
            description: self.description,
            location: self.location,
            image_url: self.image_url,
            category: self.category,
            price_per_ton: self.price_per_ton,
            currency: self.currency,
            available_tons: self.available_tons,
            verification_standard: self.verification_standard,
            vintage_year: self.vintage_year,
            sdg_impact: self.sdg_impact,
            auditor_reports: self.auditor_reports,
            created_at,
        }
    }
}

/// A catalog entry as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub image_url: String,
    pub category: ProjectCategory,
    pub price_per_ton: f64,
    pub currency: String,
    pub available_tons: f64,
    pub verification_standard: Option<VerificationStandard>,
    pub vintage_year: Option<i32>,
    pub sdg_impact: Vec<u8>,
    pub auditor_reports: Vec<AuditorReport>,
    pub created_at: i64,
}

/// A raw `projects` row; enum and list columns are stored as text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub image_url: String,
    pub category: String,
    pub price_per_ton: f64,
    pub currency: String,
    pub available_tons: f64,
    pub verification_standard: Option<String>,
    pub vintage_year: Option<i64>,
    pub sdg_impact: String,
    pub auditor_reports: String,
    pub created_at: i64,
}

impl TryFrom<ProjectRow> for Project {
    type Error = MarketError;

    fn try_from(row: ProjectRow) -> Result<Self> {
        let category = ProjectCategory::parse(&row.category)
            .ok_or_else(|| corrupt(&format!("unknown project category '{}'", row.category)))?;
        let verification_standard = row
            .verification_standard
            .as_deref()
            .map(|s| {
                VerificationStandard::parse(s)
                    .ok_or_else(|| corrupt(&format!("unknown verification standard '{s}'")))
            })
            .transpose()?;
        let vintage_year = row
            .vintage_year
            .map(|y| i32::try_from(y).map_err(|_| corrupt("vintage_year overflow")))
            .transpose()?;

        Ok(Project {
            id: row.id,
            title: row.title,
            description: row.description,
            location: row.location,
            image_url: row.image_url,
            category,
            price_per_ton: row.price_per_ton,
            currency: row.currency,
            available_tons: row.available_tons,
            verification_standard,
            vintage_year,
            sdg_impact: serde_json::from_str(&row.sdg_impact)?,
            auditor_reports: serde_json::from_str(&row.auditor_reports)?,
            created_at: row.created_at,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────

/// Body of `POST /orders`.
///
/// `total_price` and `project_title` are accepted for compatibility with the
/// storefront but never persisted as-is: both are taken from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub project_id: String,
    pub user_email: String,
    #[serde(default)]
    pub user_name: Option<String>,
    pub quantity_tons: f64,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub project_title: Option<String>,
}

impl PurchaseRequest {
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(invalid("project_id is required"));
        }
        let email = self.user_email.trim();
        if email.is_empty() {
            return Err(invalid("user_email is required"));
        }
        if !email.contains('@') {
            return Err(invalid("user_email is not a valid email address"));
        }
        if !(self.quantity_tons.is_finite() && self.quantity_tons > 0.0) {
            return Err(invalid("quantity_tons must be a positive number"));
        }
        Ok(())
    }
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub project_id: String,
    pub project_title: String,
    pub user_email: String,
    pub user_name: Option<String>,
    pub quantity_tons: f64,
    pub total_price: f64,
    pub currency: String,
    pub registry_serial_number: String,
    pub transaction_hash: String,
    pub status: OrderStatus,
    pub created_at: i64,
}

/// Aggregate figures for the marketing and admin dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub total_tons: f64,
    pub total_projects: i64,
    pub total_orders: i64,
}

// ─────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "USD".to_string()
}

fn invalid(msg: &str) -> MarketError {
    MarketError::Validation(msg.to_string())
}

fn corrupt(msg: &str) -> MarketError {
    MarketError::Database(sqlx::Error::Decode(msg.to_string().into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project() -> NewProject {
        serde_json::from_value(serde_json::json!({
            "title": "Kasigau Corridor",
            "description": "REDD+ forest protection in southeast Kenya",
            "type": "Forestry",
            "price_per_ton": 12.5,
            "co2_tons_available": 5000,
            "verification_standard": "VERRA",
            "vintage_year": 2021,
            "sdg_impact": [13, 15],
            "auditor_reports": [{
                "auditor_name": "SCS Global",
                "audit_date": "2023-04-01",
                "rating": 9,
                "summary": "Baseline and leakage checks passed"
            }]
        }))
        .unwrap()
    }

    #[test]
    fn new_project_accepts_storefront_aliases() {
        let project = sample_project();
        assert_eq!(project.category, ProjectCategory::Forestry);
        assert_eq!(project.available_tons, 5000.0);
        assert_eq!(project.currency, "USD");
        assert!(project.auditor_reports[0].verified);
        assert!(project.validate().is_ok());
    }

    #[test]
    fn blue_carbon_round_trips_through_its_display_name() {
        let parsed: ProjectCategory = serde_json::from_str("\"Blue Carbon\"").unwrap();
        assert_eq!(parsed, ProjectCategory::BlueCarbon);
        assert_eq!(ProjectCategory::parse(parsed.as_str()), Some(parsed));
    }

    #[test]
    fn new_project_rejects_bad_numbers() {
        let mut project = sample_project();
        project.price_per_ton = 0.0;
        assert!(matches!(project.validate(), Err(MarketError::Validation(_))));

        let mut project = sample_project();
        project.available_tons = -1.0;
        assert!(matches!(project.validate(), Err(MarketError::Validation(_))));

        let mut project = sample_project();
        project.auditor_reports[0].rating = 11;
        assert!(matches!(project.validate(), Err(MarketError::Validation(_))));

        let mut project = sample_project();
        project.sdg_impact.push(18);
        assert!(matches!(project.validate(), Err(MarketError::Validation(_))));
    }

    #[test]
    fn purchase_request_validation() {
        let ok = PurchaseRequest {
            project_id: "p1".into(),
            user_email: "buyer@example.com".into(),
            user_name: None,
            quantity_tons: 2.5,
            total_price: None,
            project_title: None,
        };
        assert!(ok.validate().is_ok());

        let no_at = PurchaseRequest {
            user_email: "buyer.example.com".into(),
            ..ok.clone()
        };
        assert!(no_at.validate().is_err());

        let zero = PurchaseRequest {
            quantity_tons: 0.0,
            ..ok.clone()
        };
        assert!(zero.validate().is_err());

        let nan = PurchaseRequest {
            quantity_tons: f64::NAN,
            ..ok
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn order_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Processing).unwrap(),
            "\"processing\""
        );
    }
}
