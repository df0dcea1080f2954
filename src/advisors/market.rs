//! Market advisor: mandi prices, demand outlook, and selling strategy.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::Advisor;
use crate::error::AdvisorError;
use crate::models::{format_inr, AdvisorKind, Language, UserContext};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTrend {
    Increasing,
    Stable,
    Decreasing,
}

impl PriceTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTrend::Increasing => "increasing",
            PriceTrend::Stable => "stable",
            PriceTrend::Decreasing => "decreasing",
        }
    }

    fn localized(&self, language: Language) -> &'static str {
        match (self, language) {
            (PriceTrend::Increasing, Language::Hindi) => "बढ़ रहा है",
            (PriceTrend::Stable, Language::Hindi) => "स्थिर है",
            (PriceTrend::Decreasing, Language::Hindi) => "गिर रहा है",
            (PriceTrend::Increasing, Language::English) => "Rising",
            (PriceTrend::Stable, Language::English) => "Stable",
            (PriceTrend::Decreasing, Language::English) => "Falling",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CropPrices {
    pub crop: &'static str,
    /// (mandi, price per quintal) pairs
    pub mandi_prices: &'static [(&'static str, f64)],
    pub trend: PriceTrend,
}

impl CropPrices {
    pub fn best_mandi(&self) -> Option<(&'static str, f64)> {
        self.mandi_prices
            .iter()
            .copied()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn lowest(&self) -> Option<f64> {
        self.mandi_prices
            .iter()
            .map(|(_, p)| *p)
            .min_by(|a, b| a.total_cmp(b))
    }
}

#[derive(Debug, Clone)]
pub struct DemandOutlook {
    pub crop: &'static str,
    pub current_demand: &'static str,
    pub six_month_trend: PriceTrend,
    pub reason: &'static str,
    pub recommended_action: &'static str,
}

#[derive(Debug, Clone)]
pub struct MandiInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub location: &'static str,
    pub specialization: &'static str,
    pub storage_capacity_mt: u32,
}

struct MarketData {
    prices: Vec<CropPrices>,
    demand: Vec<DemandOutlook>,
    mandis: Vec<MandiInfo>,
}

/// Market snapshot for one crop, also served over
/// `POST /api/v1/chat/market-insights`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketInsights {
    pub crop: String,
    pub location: String,
    pub current_price: f64,
    pub price_trend: String,
    pub demand_trend: String,
    pub best_mandi: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketTopic {
    PriceInquiry,
    SellingStrategy,
    MandiInfo,
    DemandForecast,
    General,
}

fn classify_topic(query: &str) -> MarketTopic {
    let q = query.to_lowercase();
    let matches = |words: &[&str]| words.iter().any(|w| q.contains(w));

    if matches(&["price", "rate", "bhav", "dam", "cost"]) {
        MarketTopic::PriceInquiry
    } else if matches(&["sell", "bikri"]) {
        MarketTopic::SellingStrategy
    } else if matches(&["mandi", "market", "haat"]) {
        MarketTopic::MandiInfo
    } else if matches(&["demand", "trend", "future", "forecast"]) {
        MarketTopic::DemandForecast
    } else {
        MarketTopic::General
    }
}

pub struct MarketAdvisor {
    data: OnceLock<MarketData>,
}

impl MarketAdvisor {
    pub fn new() -> Self {
        Self {
            data: OnceLock::new(),
        }
    }

    fn data(&self) -> std::result::Result<&MarketData, AdvisorError> {
        self.data
            .get()
            .ok_or(AdvisorError::NotInitialized(AdvisorKind::Market))
    }

    fn load_tables() -> MarketData {
        let prices = vec![
            CropPrices {
                crop: "wheat",
                mandi_prices: &[
                    ("bathinda", 2150.0),
                    ("ludhiana", 2180.0),
                    ("amritsar", 2160.0),
                    ("jalandhar", 2170.0),
                    ("patiala", 2140.0),
                ],
                trend: PriceTrend::Stable,
            },
            CropPrices {
                crop: "rice",
                mandi_prices: &[
                    ("bathinda", 1850.0),
                    ("ludhiana", 1880.0),
                    ("amritsar", 1860.0),
                    ("jalandhar", 1870.0),
                    ("patiala", 1840.0),
                ],
                trend: PriceTrend::Increasing,
            },
            CropPrices {
                crop: "maize",
                mandi_prices: &[
                    ("bathinda", 1650.0),
                    ("ludhiana", 1680.0),
                    ("amritsar", 1660.0),
                    ("jalandhar", 1670.0),
                    ("patiala", 1640.0),
                ],
                trend: PriceTrend::Stable,
            },
            CropPrices {
                crop: "cotton",
                mandi_prices: &[
                    ("bathinda", 6700.0),
                    ("ludhiana", 6750.0),
                    ("amritsar", 6720.0),
                    ("jalandhar", 6730.0),
                    ("patiala", 6680.0),
                ],
                trend: PriceTrend::Decreasing,
            },
            CropPrices {
                crop: "sugarcane",
                mandi_prices: &[
                    ("bathinda", 320.0),
                    ("ludhiana", 325.0),
                    ("amritsar", 322.0),
                    ("jalandhar", 323.0),
                    ("patiala", 318.0),
                ],
                trend: PriceTrend::Stable,
            },
            CropPrices {
                crop: "potato",
                mandi_prices: &[
                    ("bathinda", 850.0),
                    ("ludhiana", 880.0),
                    ("amritsar", 860.0),
                    ("jalandhar", 870.0),
                    ("patiala", 840.0),
                ],
                trend: PriceTrend::Increasing,
            },
        ];

        let demand = vec![
            DemandOutlook {
                crop: "wheat",
                current_demand: "high",
                six_month_trend: PriceTrend::Increasing,
                reason: "Festival season and export demand",
                recommended_action: "Hold stocks for better prices",
            },
            DemandOutlook {
                crop: "rice",
                current_demand: "very_high",
                six_month_trend: PriceTrend::Stable,
                reason: "Export opportunities and domestic consumption",
                recommended_action: "Sell in next 2 months",
            },
            DemandOutlook {
                crop: "maize",
                current_demand: "medium",
                six_month_trend: PriceTrend::Increasing,
                reason: "Poultry feed industry demand",
                recommended_action: "Store for better prices",
            },
            DemandOutlook {
                crop: "cotton",
                current_demand: "low",
                six_month_trend: PriceTrend::Increasing,
                reason: "Textile industry recovery expected",
                recommended_action: "Wait for price improvement",
            },
            DemandOutlook {
                crop: "sugarcane",
                current_demand: "high",
                six_month_trend: PriceTrend::Stable,
                reason: "Sugar mills demand",
                recommended_action: "Sell to nearby mills",
            },
            DemandOutlook {
                crop: "potato",
                current_demand: "very_high",
                six_month_trend: PriceTrend::Decreasing,
                reason: "Seasonal demand pattern",
                recommended_action: "Sell immediately",
            },
        ];

        let mandis = vec![
            MandiInfo {
                id: "bathinda",
                name: "Bathinda Grain Market",
                location: "Bathinda, Punjab",
                specialization: "Wheat, Rice, Cotton",
                storage_capacity_mt: 50_000,
            },
            MandiInfo {
                id: "ludhiana",
                name: "Ludhiana Grain Market",
                location: "Ludhiana, Punjab",
                specialization: "Wheat, Rice, Maize",
                storage_capacity_mt: 75_000,
            },
            MandiInfo {
                id: "amritsar",
                name: "Amritsar Grain Market",
                location: "Amritsar, Punjab",
                specialization: "Wheat, Rice, Potato",
                storage_capacity_mt: 40_000,
            },
            MandiInfo {
                id: "jalandhar",
                name: "Jalandhar Grain Market",
                location: "Jalandhar, Punjab",
                specialization: "Wheat, Rice, Sugarcane",
                storage_capacity_mt: 35_000,
            },
            MandiInfo {
                id: "patiala",
                name: "Patiala Grain Market",
                location: "Patiala, Punjab",
                specialization: "Wheat, Rice, Vegetables",
                storage_capacity_mt: 30_000,
            },
        ];

        MarketData {
            prices,
            demand,
            mandis,
        }
    }

    /// Direct crop/location lookup behind the market-insights endpoint.
    pub fn market_insights(
        &self,
        crop_name: &str,
        location: &str,
    ) -> std::result::Result<MarketInsights, AdvisorError> {
        let data = self.data()?;
        let crop_lower = crop_name.to_lowercase();

        let prices = data.prices.iter().find(|p| p.crop == crop_lower);
        let demand = data.demand.iter().find(|d| d.crop == crop_lower);

        let (current_price, price_trend, best_mandi) = match prices {
            Some(p) => {
                let best = p.best_mandi().map(|(m, _)| m).unwrap_or_default();
                let current = p.mandi_prices.first().map(|(_, v)| *v).unwrap_or(0.0);
                (current, p.trend.as_str(), best)
            }
            None => (0.0, "stable", ""),
        };

        let demand_trend = demand
            .map(|d| d.six_month_trend.as_str())
            .unwrap_or("stable");

        Ok(MarketInsights {
            crop: crop_lower.clone(),
            location: location.to_string(),
            current_price,
            price_trend: price_trend.to_string(),
            demand_trend: demand_trend.to_string(),
            best_mandi: best_mandi.to_string(),
            recommendations: vec![
                format!("Monitor {} prices regularly", crop_lower),
                "Compare prices across mandis before selling".to_string(),
                demand
                    .map(|d| d.recommended_action.to_string())
                    .unwrap_or_else(|| "Sell at optimal time".to_string()),
            ],
        })
    }

    fn no_crops_response(language: Language) -> String {
        match language {
            Language::Hindi => {
                "🌾 आपकी कोई वर्तमान फसल नहीं है। कृपया पहले फसल की जानकारी दें।".to_string()
            }
            Language::English => {
                "🌾 You have no current crops. Please provide crop information first.".to_string()
            }
        }
    }

    fn render_price_inquiry(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;

        if ctx.current_crops.is_empty() {
            return Ok(Self::no_crops_response(language));
        }

        let mut response = match language {
            Language::Hindi => "📊 आपकी फसलों के बाजार भाव:\n\n".to_string(),
            Language::English => "📊 Market Prices for Your Crops:\n\n".to_string(),
        };

        for crop in &ctx.current_crops {
            let Some(prices) = data
                .prices
                .iter()
                .find(|p| p.crop == crop.name.to_lowercase())
            else {
                continue;
            };
            let Some((best_mandi, high)) = prices.best_mandi() else {
                continue;
            };
            let low = prices.lowest().unwrap_or(high);

            response.push_str(&match language {
                Language::Hindi => format!(
                    "🌾 {}:\n📈 सर्वोच्च भाव: ₹{}/क्विंटल\n📉 न्यूनतम भाव: ₹{}/क्विंटल\n\
                     📊 रुझान: {}\n🏪 सर्वोत्तम मंडी: {}\n\n",
                    prices.crop,
                    format_inr(high),
                    format_inr(low),
                    prices.trend.localized(language),
                    best_mandi,
                ),
                Language::English => format!(
                    "🌾 {}:\n📈 Highest Price: ₹{}/quintal\n📉 Lowest Price: ₹{}/quintal\n\
                     📊 Trend: {}\n🏪 Best Mandi: {}\n\n",
                    prices.crop,
                    format_inr(high),
                    format_inr(low),
                    prices.trend.localized(language),
                    best_mandi,
                ),
            });
        }

        response.push_str(match language {
            Language::Hindi => {
                "💡 सुझाव:\n• बाजार के रुझान पर नजर रखें\n• सर्वोत्तम समय पर बेचें\n• कई मंडियों के भाव तुलना करें"
            }
            Language::English => {
                "💡 Tips:\n• Monitor market trends\n• Sell at optimal time\n• Compare prices across mandis"
            }
        });

        Ok(response)
    }

    fn render_selling_strategy(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;

        if ctx.current_crops.is_empty() {
            return Ok(Self::no_crops_response(language));
        }

        let mut response = match language {
            Language::Hindi => "💡 आपकी फसल बिक्री रणनीति:\n\n".to_string(),
            Language::English => "💡 Selling Strategy for Your Crops:\n\n".to_string(),
        };

        for crop in &ctx.current_crops {
            let crop_lower = crop.name.to_lowercase();
            let Some(prices) = data.prices.iter().find(|p| p.crop == crop_lower) else {
                continue;
            };
            let Some((best_id, best_price)) = prices.best_mandi() else {
                continue;
            };
            let mandi_name = data
                .mandis
                .iter()
                .find(|m| m.id == best_id)
                .map(|m| m.name)
                .unwrap_or(best_id);
            let action = data
                .demand
                .iter()
                .find(|d| d.crop == crop_lower)
                .map(|d| d.recommended_action)
                .unwrap_or("Sell at optimal time");

            response.push_str(&match language {
                Language::Hindi => format!(
                    "🌾 {}:\n🏪 सर्वोत्तम मंडी: {}\n💰 भाव: ₹{}/क्विंटल\n⏰ सलाह: {}\n\n",
                    prices.crop,
                    mandi_name,
                    format_inr(best_price),
                    action,
                ),
                Language::English => format!(
                    "🌾 {}:\n🏪 Best Mandi: {}\n💰 Price: ₹{}/quintal\n⏰ Advice: {}\n\n",
                    prices.crop,
                    mandi_name,
                    format_inr(best_price),
                    action,
                ),
            });
        }

        response.push_str(match language {
            Language::Hindi => {
                "📋 बिक्री के लिए सुझाव:\n• फसल की गुणवत्ता बनाए रखें\n• सही पैकिंग करें\n\
                 • परिवहन की व्यवस्था पहले करें"
            }
            Language::English => {
                "📋 Selling Tips:\n• Maintain crop quality\n• Proper packaging\n\
                 • Arrange transport in advance"
            }
        });

        Ok(response)
    }

    fn render_mandi_info(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;
        let location = &ctx.location;

        let mut response = match language {
            Language::Hindi => format!("🏪 {} के निकटवर्ती मंडी:\n\n", location),
            Language::English => format!("🏪 Nearby Mandis in {}:\n\n", location),
        };

        // Mandi directory is Punjab-wide; filter by location prefix when the
        // user lives in a listed city, otherwise show everything.
        let in_city: Vec<&MandiInfo> = data
            .mandis
            .iter()
            .filter(|m| m.location.starts_with(location.as_str()))
            .collect();
        let listing: Vec<&MandiInfo> = if in_city.is_empty() {
            data.mandis.iter().collect()
        } else {
            in_city
        };

        for mandi in listing {
            response.push_str(&match language {
                Language::Hindi => format!(
                    "🏪 {}:\n🌾 विशेषज्ञता: {}\n📦 भंडारण क्षमता: {} MT\n\n",
                    mandi.name, mandi.specialization, mandi.storage_capacity_mt,
                ),
                Language::English => format!(
                    "🏪 {}:\n🌾 Specialization: {}\n📦 Storage Capacity: {} MT\n\n",
                    mandi.name, mandi.specialization, mandi.storage_capacity_mt,
                ),
            });
        }

        response.push_str(match language {
            Language::Hindi => {
                "📞 मंडी से संपर्क करने के लिए:\n• कृषि विभाग कार्यालय\n• मंडी समिति\n• ऑनलाइन पोर्टल"
            }
            Language::English => {
                "📞 To Contact Mandi:\n• Agriculture Department Office\n• Mandi Committee\n• Online Portal"
            }
        });

        Ok(response)
    }

    fn render_demand_forecast(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;

        if ctx.current_crops.is_empty() {
            return Ok(Self::no_crops_response(language));
        }

        let mut response = match language {
            Language::Hindi => "🔮 आपकी फसलों की मांग पूर्वानुमान:\n\n".to_string(),
            Language::English => "🔮 Demand Forecast for Your Crops:\n\n".to_string(),
        };

        for crop in &ctx.current_crops {
            let Some(outlook) = data
                .demand
                .iter()
                .find(|d| d.crop == crop.name.to_lowercase())
            else {
                continue;
            };

            response.push_str(&match language {
                Language::Hindi => format!(
                    "🌾 {}:\n📊 रुझान: {}\n📝 कारण: {}\n\n",
                    outlook.crop,
                    outlook.six_month_trend.localized(language),
                    outlook.reason,
                ),
                Language::English => format!(
                    "🌾 {}:\n📊 Trend: {}\n📝 Reason: {}\n\n",
                    outlook.crop,
                    outlook.six_month_trend.localized(language),
                    outlook.reason,
                ),
            });
        }

        response.push_str(match language {
            Language::Hindi => {
                "💡 सुझाव:\n• बढ़ती मांग वाली फसलें उगाएं\n• बाजार के रुझान पर नजर रखें\n• भविष्य की योजना बनाएं"
            }
            Language::English => {
                "💡 Tips:\n• Grow crops with rising demand\n• Monitor market trends\n• Plan for the future"
            }
        });

        Ok(response)
    }

    fn render_general(language: Language) -> String {
        match language {
            Language::Hindi => "📊 बाजार सलाह:\n\n\
                 • नियमित रूप से मंडी भाव जांचें\n• सर्वोत्तम समय पर फसल बेचें\n\
                 • कई मंडियों के भाव तुलना करें\n• परिवहन और कमीशन लागत ध्यान रखें\n\n\
                 क्या आप फसल के भाव, बिक्री रणनीति या मंडी की जानकारी चाहते हैं?"
                .to_string(),
            Language::English => "📊 Market Advice:\n\n\
                 • Check mandi prices regularly\n• Sell crops at optimal time\n\
                 • Compare prices across mandis\n• Consider transport and commission costs\n\n\
                 Do you want crop prices, selling strategy, or mandi information?"
                .to_string(),
        }
    }
}

impl Default for MarketAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Advisor for MarketAdvisor {
    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Market
    }

    fn is_initialized(&self) -> bool {
        self.data.get().is_some()
    }

    async fn initialize(&self) -> Result<()> {
        let _ = self.data.set(Self::load_tables());
        info!("market advisor initialized");
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
            MarketTopic::PriceInquiry => self.render_price_inquiry(ctx, language)?,
            MarketTopic::SellingStrategy => self.render_selling_strategy(ctx, language)?,
            MarketTopic::MandiInfo => self.render_mandi_info(ctx, language)?,
            MarketTopic::DemandForecast => self.render_demand_forecast(ctx, language)?,
            MarketTopic::General => Self::render_general(language),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CropHolding, SoilHealth};

    fn test_context(crops: Vec<&str>) -> UserContext {
        UserContext {
            user_id: "test-user".to_string(),
            location: "Punjab".to_string(),
            land_area: 5.0,
            current_loans: vec![],
            current_crops: crops
                .into_iter()
                .map(|name| CropHolding {
                    name: name.to_string(),
                    area: 5.0,
                    stage: "growing".to_string(),
                })
                .collect(),
            soil_health: SoilHealth {
                ph: 7.2,
                soil_type: "loamy".to_string(),
                nitrogen: None,
            },
            language: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_price_inquiry_computes_min_max_over_mandis() {
        let advisor = MarketAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context(vec!["wheat"]);
        let out = advisor
            .process("what is the wheat price", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("Highest Price: ₹2,180/quintal"));
        assert!(out.contains("Lowest Price: ₹2,140/quintal"));
        assert!(out.contains("Best Mandi: ludhiana"));
    }

    #[tokio::test]
    async fn test_price_inquiry_without_crops() {
        let advisor = MarketAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context(vec![]);
        let out = advisor
            .process("aaj ka bhav", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("no current crops"));
    }

    #[tokio::test]
    async fn test_selling_strategy_names_best_mandi() {
        let advisor = MarketAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context(vec!["potato"]);
        let out = advisor
            .process("when should I sell", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("Ludhiana Grain Market"));
        assert!(out.contains("Sell immediately"));
    }

    #[test]
    fn test_market_insights_lookup() {
        let advisor = MarketAdvisor::new();
        let data = MarketAdvisor::load_tables();
        advisor.data.set(data).ok();

        let insights = advisor.market_insights("Rice", "Punjab").unwrap();
        assert_eq!(insights.crop, "rice");
        assert_eq!(insights.price_trend, "increasing");
        assert_eq!(insights.best_mandi, "ludhiana");
        assert_eq!(insights.current_price, 1850.0);
    }

    #[test]
    fn test_market_insights_unknown_crop_defaults() {
        let advisor = MarketAdvisor::new();
        advisor.data.set(MarketAdvisor::load_tables()).ok();

        let insights = advisor.market_insights("quinoa", "Punjab").unwrap();
        assert_eq!(insights.current_price, 0.0);
        assert_eq!(insights.price_trend, "stable");
        assert!(insights.best_mandi.is_empty());
    }
}
