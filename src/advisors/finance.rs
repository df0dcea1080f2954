//! Finance advisor: debt forecasting, loan and subsidy guidance.

use std::sync::OnceLock;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Advisor;
use crate::error::AdvisorError;
use crate::models::{format_inr, AdvisorKind, Language, UserContext};
use crate::Result;

/// Placeholder monthly income until crop-yield based estimation lands.
/// TODO: derive from current_crops once the market price feed is persisted.
const MONTHLY_INCOME: f64 = 15000.0;

#[derive(Debug, Clone)]
pub struct LoanScheme {
    pub name: &'static str,
    pub interest_rate: f64,
    pub max_amount: f64,
    pub tenure_months: u32,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct SubsidyScheme {
    pub name: &'static str,
    pub amount: f64,
    pub frequency: &'static str,
    pub eligibility: &'static str,
}

#[derive(Debug, Clone)]
pub struct Bank {
    pub name: &'static str,
    pub crop_loan_rate: f64,
    pub max_amount: f64,
    pub processing_days: u32,
}

struct FinanceData {
    loan_schemes: Vec<LoanScheme>,
    subsidy_schemes: Vec<SubsidyScheme>,
    banks: Vec<Bank>,
}

/// Debt freedom forecast for one user, also served directly over
/// `POST /api/v1/chat/debt-forecast/{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtForecast {
    pub current_debt: f64,
    pub monthly_payment: f64,
    pub months_to_freedom: f64,
    pub debt_free_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinanceTopic {
    DebtForecast,
    LoanRecommendation,
    SubsidyInfo,
    RepaymentStrategy,
    General,
}

fn classify_topic(query: &str) -> FinanceTopic {
    let q = query.to_lowercase();
    let matches = |words: &[&str]| words.iter().any(|w| q.contains(w));

    if matches(&["debt", "karz", "udhar", "qarz", "free", "mukt"]) {
        FinanceTopic::DebtForecast
    } else if matches(&["loan", "credit"]) {
        FinanceTopic::LoanRecommendation
    } else if matches(&["subsidy", "yojana", "scheme", "help"]) {
        FinanceTopic::SubsidyInfo
    } else if matches(&["repay", "payment", "installment", "kisht"]) {
        FinanceTopic::RepaymentStrategy
    } else {
        FinanceTopic::General
    }
}

pub struct FinanceAdvisor {
    data: OnceLock<FinanceData>,
}

impl FinanceAdvisor {
    pub fn new() -> Self {
        Self {
            data: OnceLock::new(),
        }
    }

    fn data(&self) -> std::result::Result<&FinanceData, AdvisorError> {
        self.data
            .get()
            .ok_or(AdvisorError::NotInitialized(AdvisorKind::Finance))
    }

    fn load_tables() -> FinanceData {
        let loan_schemes = vec![
            LoanScheme {
                name: "Crop Loan",
                interest_rate: 7.0,
                max_amount: 300_000.0,
                tenure_months: 12,
                description: "Kharif and Rabi crop loans",
            },
            LoanScheme {
                name: "Equipment Loan",
                interest_rate: 8.5,
                max_amount: 500_000.0,
                tenure_months: 36,
                description: "Farm equipment and machinery loans",
            },
            LoanScheme {
                name: "Irrigation Loan",
                interest_rate: 7.5,
                max_amount: 200_000.0,
                tenure_months: 24,
                description: "Irrigation system and water management",
            },
            LoanScheme {
                name: "Dairy Loan",
                interest_rate: 6.5,
                max_amount: 1_000_000.0,
                tenure_months: 60,
                description: "Dairy farming and livestock loans",
            },
            LoanScheme {
                name: "Horticulture Loan",
                interest_rate: 6.8,
                max_amount: 400_000.0,
                tenure_months: 48,
                description: "Fruit and vegetable farming loans",
            },
        ];

        let subsidy_schemes = vec![
            SubsidyScheme {
                name: "PM-KISAN",
                amount: 6000.0,
                frequency: "yearly",
                eligibility: "Small and marginal farmers",
            },
            SubsidyScheme {
                name: "Fertilizer Subsidy",
                amount: 1400.0,
                frequency: "per_bag",
                eligibility: "All farmers",
            },
            SubsidyScheme {
                name: "Seed Subsidy",
                amount: 500.0,
                frequency: "per_quintal",
                eligibility: "Small farmers",
            },
            SubsidyScheme {
                name: "Pesticide Subsidy",
                amount: 300.0,
                frequency: "per_liter",
                eligibility: "All farmers",
            },
            SubsidyScheme {
                name: "Drip Irrigation Subsidy",
                amount: 50_000.0,
                frequency: "one_time",
                eligibility: "Farmers with 2+ acres",
            },
        ];

        let banks = vec![
            Bank {
                name: "Punjab National Bank",
                crop_loan_rate: 6.8,
                max_amount: 350_000.0,
                processing_days: 5,
            },
            Bank {
                name: "State Bank of India",
                crop_loan_rate: 7.0,
                max_amount: 300_000.0,
                processing_days: 7,
            },
            Bank {
                name: "Punjab & Sind Bank",
                crop_loan_rate: 6.9,
                max_amount: 320_000.0,
                processing_days: 6,
            },
            Bank {
                name: "Punjab Cooperative Banks",
                crop_loan_rate: 6.5,
                max_amount: 250_000.0,
                processing_days: 3,
            },
        ];

        FinanceData {
            loan_schemes,
            subsidy_schemes,
            banks,
        }
    }

    /// Total outstanding across all of the user's loans.
    fn total_debt(ctx: &UserContext) -> f64 {
        ctx.current_loans.iter().map(|loan| loan.remaining).sum()
    }

    /// Debt freedom math: pay the smaller of 40% of monthly income and 10%
    /// of outstanding debt each month. Zero debt short-circuits before any
    /// division.
    pub fn compute_debt_forecast(ctx: &UserContext) -> DebtForecast {
        let current_debt = Self::total_debt(ctx);

        if current_debt <= 0.0 {
            return DebtForecast {
                current_debt: 0.0,
                monthly_payment: 0.0,
                months_to_freedom: 0.0,
                debt_free_date: "now".to_string(),
            };
        }

        let monthly_payment = (MONTHLY_INCOME * 0.4).min(current_debt * 0.1);
        let months_to_freedom = current_debt / monthly_payment;
        let debt_free_date = (Utc::now()
            + Duration::days((months_to_freedom * 30.0).round() as i64))
        .format("%B %Y")
        .to_string();

        DebtForecast {
            current_debt,
            monthly_payment,
            months_to_freedom,
            debt_free_date,
        }
    }

    fn render_debt_forecast(ctx: &UserContext, language: Language) -> String {
        let forecast = Self::compute_debt_forecast(ctx);

        if forecast.current_debt <= 0.0 {
            return match language {
                Language::Hindi => {
                    "🎉 बधाई हो! आप कर्ज मुक्त हैं। अपनी बचत को स्मार्ट तरीके से निवेश करें।".to_string()
                }
                Language::English => {
                    "🎉 Congratulations! You are debt-free. Invest your savings wisely.".to_string()
                }
            };
        }

        let recommendations = match language {
            Language::Hindi => {
                "उच्च मूल्य वाली फसलें उगाएं (बाजरा, दालें) | सरकारी सब्सिडी का लाभ उठाएं | मंडी में बेहतर दाम के लिए समय चुनें"
            }
            Language::English => {
                "Grow high-value crops (millets, pulses) | Avail government subsidies | Time your mandi sales for better prices"
            }
        };

        match language {
            Language::Hindi => format!(
                "💰 आपका कर्ज मुक्ति पूर्वानुमान:\n\n\
                 📊 वर्तमान कर्ज: ₹{}\n\
                 📅 अनुमानित कर्ज मुक्ति: {}\n\
                 💵 मासिक भुगतान आवश्यक: ₹{}\n\n\
                 🌱 सुझाव: {}\n\n\
                 🎯 लक्ष्य: हर फसल आपको कर्ज मुक्ति की ओर ले जाती है",
                format_inr(forecast.current_debt),
                forecast.debt_free_date,
                format_inr(forecast.monthly_payment),
                recommendations,
            ),
            Language::English => format!(
                "💰 Your Debt Freedom Forecast:\n\n\
                 📊 Current Debt: ₹{}\n\
                 📅 Estimated Debt-Free Date: {}\n\
                 💵 Monthly Payment Needed: ₹{}\n\n\
                 🌱 Recommendations: {}\n\n\
                 🎯 Goal: Every harvest brings you closer to debt freedom",
                format_inr(forecast.current_debt),
                forecast.debt_free_date,
                format_inr(forecast.monthly_payment),
                recommendations,
            ),
        }
    }

    fn render_loan_recommendation(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;
        let mut recommendations = Vec::new();

        if ctx.land_area > 0.0 {
            // ₹50k per acre, capped at the crop loan scheme maximum
            let crop_loan = data.loan_schemes[0].max_amount.min(ctx.land_area * 50_000.0);
            recommendations.push(match language {
                Language::Hindi => format!("फसल ऋण: ₹{} (7% ब्याज)", format_inr(crop_loan)),
                Language::English => {
                    format!("Crop loan: ₹{} (7% interest)", format_inr(crop_loan))
                }
            });
        }

        let has_equipment_loan = ctx
            .current_loans
            .iter()
            .any(|loan| loan.loan_type.as_deref() == Some("equipment"));
        if !has_equipment_loan {
            recommendations.push(match language {
                Language::Hindi => "उपकरण ऋण: ₹2,00,000 (8.5% ब्याज)".to_string(),
                Language::English => "Equipment loan: ₹2,00,000 (8.5% interest)".to_string(),
            });
        }

        let bullets = recommendations
            .iter()
            .map(|r| format!("• {}", r))
            .collect::<Vec<_>>()
            .join("\n");

        let best_bank = data
            .banks
            .iter()
            .min_by(|a, b| a.crop_loan_rate.total_cmp(&b.crop_loan_rate));
        let bank_line = match (best_bank, language) {
            (Some(bank), Language::Hindi) => {
                format!("🏦 सबसे कम दर: {} ({}%)", bank.name, bank.crop_loan_rate)
            }
            (Some(bank), Language::English) => {
                format!("🏦 Lowest rate: {} ({}%)", bank.name, bank.crop_loan_rate)
            }
            (None, _) => String::new(),
        };

        Ok(match language {
            Language::Hindi => format!(
                "💳 आपके लिए ऋण सिफारिशें:\n\n{}\n\n\
                 📋 आवेदन के लिए आवश्यक दस्तावेज:\n\
                 • आधार कार्ड\n• भूमि के कागजात\n• बैंक खाता\n• फोटो\n\n{}",
                bullets, bank_line,
            ),
            Language::English => format!(
                "💳 Loan Recommendations for You:\n\n{}\n\n\
                 📋 Documents Required:\n\
                 • Aadhaar Card\n• Land Documents\n• Bank Account\n• Photos\n\n{}",
                bullets, bank_line,
            ),
        })
    }

    fn render_subsidy_info(
        &self,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;
        let bullets = data
            .subsidy_schemes
            .iter()
            .map(|s| match language {
                Language::Hindi => {
                    format!("• {}: ₹{} ({})", s.name, format_inr(s.amount), s.frequency)
                }
                Language::English => {
                    format!("• {}: ₹{} ({})", s.name, format_inr(s.amount), s.frequency)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(match language {
            Language::Hindi => format!(
                "🏛️ आपके लिए उपलब्ध सरकारी योजनाएं:\n\n{}\n\n\
                 📞 आवेदन के लिए:\n• कृषि विभाग कार्यालय\n• बैंक शाखा\n• ऑनलाइन पोर्टल\n\n\
                 ✅ सभी छोटे और सीमांत किसानों के लिए उपलब्ध",
                bullets,
            ),
            Language::English => format!(
                "🏛️ Government Schemes Available for You:\n\n{}\n\n\
                 📞 To Apply:\n• Agriculture Department Office\n• Bank Branch\n• Online Portal\n\n\
                 ✅ Available for all small and marginal farmers",
                bullets,
            ),
        })
    }

    fn render_repayment_strategy(ctx: &UserContext, language: Language) -> String {
        if ctx.current_loans.is_empty() {
            return match language {
                Language::Hindi => {
                    "🎉 बधाई हो! आप कर्ज मुक्त हैं। अपनी बचत को स्मार्ट तरीके से निवेश करें।".to_string()
                }
                Language::English => {
                    "🎉 Congratulations! You are debt-free. Invest your savings wisely.".to_string()
                }
            };
        }

        match language {
            Language::Hindi => "💡 कर्ज चुकाने की रणनीति:\n\n\
                 • फसल बिक्री से प्राप्त राशि का 60% कर्ज चुकाने में लगाएं\n\
                 • मंडी में उच्च दाम पर बेचने का इंतजार करें\n\
                 • सरकारी सब्सिडी का लाभ उठाकर कर्ज चुकाएं\n\
                 • अगली फसल के लिए कम लागत वाली फसलें चुनें\n\n\
                 📊 प्राथमिकता क्रम:\n\
                 1. उच्च ब्याज वाले कर्ज पहले चुकाएं\n\
                 2. फसल बिक्री से तुरंत भुगतान करें\n\
                 3. नई फसल के लिए बचत रखें\n\n\
                 🎯 लक्ष्य: अगले 2 साल में कर्ज मुक्त हो जाएं"
                .to_string(),
            Language::English => "💡 Repayment Strategy:\n\n\
                 • Put 60% of crop sale proceeds toward loan repayment\n\
                 • Wait for higher mandi prices before selling\n\
                 • Use government subsidies to repay loans\n\
                 • Choose lower-cost crops for the next season\n\n\
                 📊 Priority Order:\n\
                 1. Pay high-interest loans first\n\
                 2. Make immediate payment from crop sales\n\
                 3. Save for next crop season\n\n\
                 🎯 Goal: Become debt-free in next 2 years"
                .to_string(),
        }
    }

    fn render_general(language: Language) -> String {
        match language {
            Language::Hindi => "💰 वित्तीय सलाह:\n\n\
                 • अपनी फसल का रिकॉर्ड रखें\n\
                 • बाजार के दामों पर नजर रखें\n\
                 • सरकारी योजनाओं का लाभ उठाएं\n\
                 • कर्ज को समझदारी से प्रबंधित करें\n\n\
                 क्या आप कर्ज, सब्सिडी या फसल बिक्री के बारे में जानना चाहते हैं?"
                .to_string(),
            Language::English => "💰 Financial Advice:\n\n\
                 • Keep records of your crops\n\
                 • Monitor market prices\n\
                 • Avail government schemes\n\
                 • Manage loans wisely\n\n\
                 Do you want to know about loans, subsidies, or crop sales?"
                .to_string(),
        }
    }
}

impl Default for FinanceAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Advisor for FinanceAdvisor {
    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Finance
    }

    fn is_initialized(&self) -> bool {
        self.data.get().is_some()
    }

    async fn initialize(&self) -> Result<()> {
        let _ = self.data.set(Self::load_tables());
        info!("finance advisor initialized");
        Ok(())
    }

    async fn process(
        &self,
        query: &str,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        self.data()?;

        Ok(match classify_topic(query) {
            FinanceTopic::DebtForecast => Self::render_debt_forecast(ctx, language),
            FinanceTopic::LoanRecommendation => self.render_loan_recommendation(ctx, language)?,
            FinanceTopic::SubsidyInfo => self.render_subsidy_info(language)?,
            FinanceTopic::RepaymentStrategy => Self::render_repayment_strategy(ctx, language),
            FinanceTopic::General => Self::render_general(language),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LoanAccount, SoilHealth};

    fn test_context(loans: Vec<LoanAccount>) -> UserContext {
        UserContext {
            user_id: "test-user".to_string(),
            location: "Punjab".to_string(),
            land_area: 5.0,
            current_loans: loans,
            current_crops: vec![],
            soil_health: SoilHealth {
                ph: 7.2,
                soil_type: "loamy".to_string(),
                nitrogen: Some("medium".to_string()),
            },
            language: "hi".to_string(),
        }
    }

    fn loan(remaining: f64) -> LoanAccount {
        LoanAccount {
            amount: remaining * 1.5,
            interest_rate: 7.5,
            remaining,
            loan_type: None,
        }
    }

    #[test]
    fn test_debt_forecast_small_debt_pays_ten_percent() {
        // 10% of 35k (3500) < 40% of 15k income (6000)
        let ctx = test_context(vec![loan(35_000.0)]);
        let forecast = FinanceAdvisor::compute_debt_forecast(&ctx);
        assert_eq!(forecast.current_debt, 35_000.0);
        assert_eq!(forecast.monthly_payment, 3500.0);
        assert!((forecast.months_to_freedom - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_debt_forecast_large_debt_caps_at_income_share() {
        // 10% of 200k (20k) > 40% of income (6k), so income cap wins
        let ctx = test_context(vec![loan(150_000.0), loan(50_000.0)]);
        let forecast = FinanceAdvisor::compute_debt_forecast(&ctx);
        assert_eq!(forecast.current_debt, 200_000.0);
        assert_eq!(forecast.monthly_payment, 6000.0);
    }

    #[test]
    fn test_debt_forecast_no_debt_never_divides() {
        let ctx = test_context(vec![]);
        let forecast = FinanceAdvisor::compute_debt_forecast(&ctx);
        assert_eq!(forecast.current_debt, 0.0);
        assert_eq!(forecast.months_to_freedom, 0.0);
        assert_eq!(forecast.debt_free_date, "now");
    }

    #[tokio::test]
    async fn test_uninitialized_advisor_errors() {
        let advisor = FinanceAdvisor::new();
        let ctx = test_context(vec![]);
        let err = advisor
            .process("loan chahiye", &ctx, Language::Hindi)
            .await
            .unwrap_err();
        assert_eq!(err, AdvisorError::NotInitialized(AdvisorKind::Finance));
    }

    #[tokio::test]
    async fn test_debt_query_renders_forecast() {
        let advisor = FinanceAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context(vec![loan(35_000.0)]);
        let out = advisor
            .process("mera karz kab khatam hoga", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("Debt Freedom Forecast"));
        assert!(out.contains("₹35,000"));
        assert!(out.contains("₹3,500"));
    }

    #[tokio::test]
    async fn test_no_debt_congratulates() {
        let advisor = FinanceAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context(vec![]);
        let out = advisor
            .process("debt status", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("debt-free"));
    }

    #[tokio::test]
    async fn test_loan_query_recommends_schemes() {
        let advisor = FinanceAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context(vec![]);
        let out = advisor
            .process("I need a crop loan", &ctx, Language::English)
            .await
            .unwrap();
        // 5 acres * 50k = 250k, below the 300k cap
        assert!(out.contains("₹250,000"));
        assert!(out.contains("Equipment loan"));
    }
}
