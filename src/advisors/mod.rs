//! Domain advisors
//!
//! Each advisor is a pure function of (query, context, language) over a static
//! reference table loaded once at startup. Advisors never talk to the network
//! or the database; the orchestrator owns all IO around them.

pub mod agronomy;
pub mod finance;
pub mod market;
pub mod policy;
pub mod risk;

pub use agronomy::AgronomyAdvisor;
pub use finance::FinanceAdvisor;
pub use market::MarketAdvisor;
pub use policy::PolicyAdvisor;
pub use risk::RiskAdvisor;

use crate::error::AdvisorError;
use crate::models::{AdvisorKind, Language, UserContext};
use crate::Result;
use chrono::Datelike;

/// Trait for a single domain advisor.
///
/// `initialize` builds the advisor's static table; a failure there is fatal
/// at startup. `process` failures are per-turn and isolated: the orchestrator
/// substitutes a localized apology and continues with the remaining advisors.
#[async_trait::async_trait]
pub trait Advisor: Send + Sync {
    fn kind(&self) -> AdvisorKind;

    fn is_initialized(&self) -> bool;

    async fn initialize(&self) -> Result<()>;

    async fn process(
        &self,
        query: &str,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError>;
}

/// Agricultural season derived from the calendar month.
/// June through September is kharif, October through January is rabi,
/// the rest is zaid.
pub fn current_season() -> &'static str {
    season_for_month(chrono::Utc::now().month())
}

pub fn season_for_month(month: u32) -> &'static str {
    match month {
        6..=9 => "kharif",
        10..=12 | 1 => "rabi",
        _ => "zaid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_boundaries() {
        assert_eq!(season_for_month(6), "kharif");
        assert_eq!(season_for_month(9), "kharif");
        assert_eq!(season_for_month(10), "rabi");
        assert_eq!(season_for_month(1), "rabi");
        assert_eq!(season_for_month(2), "zaid");
        assert_eq!(season_for_month(5), "zaid");
    }
}
