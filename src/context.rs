//! User-context collaborator
//!
//! Advisors consume a read-only [`UserContext`] snapshot fetched once per
//! turn. The store is the seam between the pipeline and profile storage:
//! a static Punjab profile for database-less runs, and a Postgres-backed
//! store that assembles the snapshot from the users/loans/crops tables and
//! falls back to the static profile when the user is unknown or the
//! database is unreachable.

use std::sync::Arc;

use tracing::warn;

use crate::db::{Database, Page};
use crate::models::{CropHolding, LoanAccount, SoilHealth, UserContext};

/// Per-turn context source.
#[async_trait::async_trait]
pub trait ContextStore: Send + Sync {
    /// Never fails: a missing profile degrades to the default one so the
    /// turn can proceed.
    async fn context_for(&self, user_id: &str) -> UserContext;
}

/// Representative Punjab wheat-farmer profile used when no real profile is
/// available.
pub fn default_context(user_id: &str) -> UserContext {
    UserContext {
        user_id: user_id.to_string(),
        location: "Punjab".to_string(),
        land_area: 5.0,
        current_loans: vec![LoanAccount {
            amount: 50_000.0,
            interest_rate: 7.5,
            remaining: 35_000.0,
            loan_type: Some("crop_loan".to_string()),
        }],
        current_crops: vec![CropHolding {
            name: "wheat".to_string(),
            area: 5.0,
            stage: "growing".to_string(),
        }],
        soil_health: SoilHealth {
            ph: 7.2,
            soil_type: "loamy".to_string(),
            nitrogen: Some("medium".to_string()),
        },
        language: "hi".to_string(),
    }
}

/// Fixed-profile store for tests and deployments without Postgres.
#[derive(Default)]
pub struct StaticContextStore;

impl StaticContextStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ContextStore for StaticContextStore {
    async fn context_for(&self, user_id: &str) -> UserContext {
        default_context(user_id)
    }
}

/// Assembles the snapshot from registered user rows plus their active loans
/// and standing crops.
pub struct PgContextStore {
    db: Arc<Database>,
}

impl PgContextStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn load(&self, user_id: &str) -> crate::Result<UserContext> {
        let user = self.db.get_user(user_id).await?;
        let loans = self.db.loans_for_user(user_id, Page::default()).await?;
        let crops = self.db.crops_for_user(user_id, Page::default()).await?;

        let current_loans = loans
            .into_iter()
            .filter(|loan| loan.status == "active")
            .map(|loan| LoanAccount {
                amount: loan.amount,
                interest_rate: loan.interest_rate,
                remaining: loan.remaining_amount,
                loan_type: Some(loan.loan_type),
            })
            .collect();

        let current_crops = crops
            .into_iter()
            .map(|crop| CropHolding {
                name: crop.crop_name,
                area: crop.area,
                stage: crop.current_stage,
            })
            .collect();

        // Soil reports are not yet captured at registration; the default
        // profile's reading stands in until they are.
        let defaults = default_context(user_id);

        Ok(UserContext {
            user_id: user.id,
            location: user.state,
            land_area: user.land_area,
            current_loans,
            current_crops,
            soil_health: defaults.soil_health,
            language: user.language,
        })
    }
}

#[async_trait::async_trait]
impl ContextStore for PgContextStore {
    async fn context_for(&self, user_id: &str) -> UserContext {
        match self.load(user_id).await {
            Ok(ctx) => ctx,
            Err(error) => {
                warn!(user_id, %error, "context lookup failed, using default profile");
                default_context(user_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_store_returns_punjab_profile() {
        let store = StaticContextStore::new();
        let ctx = store.context_for("farmer-42").await;

        assert_eq!(ctx.user_id, "farmer-42");
        assert_eq!(ctx.location, "Punjab");
        assert_eq!(ctx.land_area, 5.0);
        assert_eq!(ctx.current_loans.len(), 1);
        assert_eq!(ctx.current_loans[0].remaining, 35_000.0);
        assert_eq!(ctx.current_crops[0].name, "wheat");
        assert_eq!(ctx.soil_health.ph, 7.2);
        assert_eq!(ctx.language, "hi");
    }
}
