//! Agronomy advisor: crop selection, soil health, and farming practices.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{current_season, Advisor};
use crate::error::AdvisorError;
use crate::models::{format_inr, AdvisorKind, Language, UserContext};
use crate::Result;

#[derive(Debug, Clone)]
pub struct CropProfile {
    pub name: &'static str,
    pub season: &'static str,
    pub duration_days: u32,
    pub water_requirement: &'static str,
    pub soil_type: &'static str,
    pub ph_range: (f64, f64),
    pub yield_per_acre: f64,
    pub market_price: f64,
    pub profit_margin: f64,
    pub sowing_time: &'static str,
    pub harvest_time: &'static str,
}

impl CropProfile {
    /// Expected profit per acre: yield x price x margin.
    pub fn profit_per_acre(&self) -> f64 {
        self.yield_per_acre * self.market_price * self.profit_margin
    }

    fn grows_in(&self, season: &str) -> bool {
        self.season == season || self.season == "year_round"
    }
}

/// One ranked crop suggestion, also served over
/// `POST /api/v1/chat/crop-recommendations/{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropRecommendation {
    pub crop: String,
    pub profit_per_acre: f64,
    pub duration_days: u32,
    pub water_requirement: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgronomyTopic {
    CropRecommendation,
    SoilHealth,
    FarmingPractices,
    PestManagement,
    General,
}

fn classify_topic(query: &str) -> AgronomyTopic {
    let q = query.to_lowercase();
    let matches = |words: &[&str]| words.iter().any(|w| q.contains(w));

    if matches(&["crop", "fasal", "beej", "plant", "grow"]) {
        AgronomyTopic::CropRecommendation
    } else if matches(&["soil", "mitti", "ph", "fertilizer", "khad"]) {
        AgronomyTopic::SoilHealth
    } else if matches(&["pest", "disease", "keet", "rogi"]) {
        AgronomyTopic::PestManagement
    } else if matches(&["practice", "technique", "method", "tarika"]) {
        AgronomyTopic::FarmingPractices
    } else {
        AgronomyTopic::General
    }
}

pub struct AgronomyAdvisor {
    crops: OnceLock<Vec<CropProfile>>,
}

impl AgronomyAdvisor {
    pub fn new() -> Self {
        Self {
            crops: OnceLock::new(),
        }
    }

    fn crops(&self) -> std::result::Result<&[CropProfile], AdvisorError> {
        self.crops
            .get()
            .map(|c| c.as_slice())
            .ok_or(AdvisorError::NotInitialized(AdvisorKind::Agronomy))
    }

    fn load_crops() -> Vec<CropProfile> {
        vec![
            CropProfile {
                name: "wheat",
                season: "rabi",
                duration_days: 120,
                water_requirement: "medium",
                soil_type: "loamy",
                ph_range: (6.0, 7.5),
                yield_per_acre: 20.0,
                market_price: 2100.0,
                profit_margin: 0.4,
                sowing_time: "November-December",
                harvest_time: "March-April",
            },
            CropProfile {
                name: "rice",
                season: "kharif",
                duration_days: 150,
                water_requirement: "high",
                soil_type: "clay",
                ph_range: (5.5, 6.5),
                yield_per_acre: 25.0,
                market_price: 1800.0,
                profit_margin: 0.35,
                sowing_time: "June-July",
                harvest_time: "October-November",
            },
            CropProfile {
                name: "maize",
                season: "kharif",
                duration_days: 100,
                water_requirement: "medium",
                soil_type: "loamy",
                ph_range: (6.0, 7.0),
                yield_per_acre: 30.0,
                market_price: 1600.0,
                profit_margin: 0.5,
                sowing_time: "June-July",
                harvest_time: "September-October",
            },
            CropProfile {
                name: "cotton",
                season: "kharif",
                duration_days: 180,
                water_requirement: "medium",
                soil_type: "sandy_loam",
                ph_range: (6.5, 8.0),
                yield_per_acre: 8.0,
                market_price: 6500.0,
                profit_margin: 0.45,
                sowing_time: "April-May",
                harvest_time: "October-December",
            },
            CropProfile {
                name: "sugarcane",
                season: "year_round",
                duration_days: 365,
                water_requirement: "high",
                soil_type: "clay_loam",
                ph_range: (6.0, 7.5),
                yield_per_acre: 350.0,
                market_price: 315.0,
                profit_margin: 0.3,
                sowing_time: "February-March",
                harvest_time: "November-March",
            },
            CropProfile {
                name: "potato",
                season: "rabi",
                duration_days: 90,
                water_requirement: "medium",
                soil_type: "sandy_loam",
                ph_range: (5.5, 6.5),
                yield_per_acre: 120.0,
                market_price: 800.0,
                profit_margin: 0.55,
                sowing_time: "October-November",
                harvest_time: "January-February",
            },
        ]
    }

    /// Season filter first, then soil match within the season. A season with
    /// no soil match falls back to the season-only list rather than nothing.
    fn suitable_crops<'a>(
        crops: &'a [CropProfile],
        soil_type: &str,
        season: &str,
    ) -> Vec<&'a CropProfile> {
        let season_crops: Vec<&CropProfile> =
            crops.iter().filter(|c| c.grows_in(season)).collect();

        let soil_matched: Vec<&CropProfile> = season_crops
            .iter()
            .copied()
            .filter(|c| c.soil_type == soil_type)
            .collect();

        if soil_matched.is_empty() {
            season_crops
        } else {
            soil_matched
        }
    }

    /// Ranked recommendations for the given season, best profit first.
    pub fn recommendations_for(
        &self,
        ctx: &UserContext,
        season: &str,
    ) -> std::result::Result<Vec<CropRecommendation>, AdvisorError> {
        let crops = self.crops()?;
        let mut candidates = Self::suitable_crops(crops, &ctx.soil_health.soil_type, season);
        candidates.sort_by(|a, b| b.profit_per_acre().total_cmp(&a.profit_per_acre()));

        Ok(candidates
            .into_iter()
            .take(3)
            .map(|c| CropRecommendation {
                crop: c.name.to_string(),
                profit_per_acre: c.profit_per_acre(),
                duration_days: c.duration_days,
                water_requirement: c.water_requirement.to_string(),
            })
            .collect())
    }

    fn render_crop_recommendation(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let season = current_season();
        let recommendations = self.recommendations_for(ctx, season)?;

        let mut response = match language {
            Language::Hindi => format!(
                "🌱 आपके लिए फसल सिफारिशें ({} मौसम):\n\n\
                 📊 मिट्टी: {}\n📏 जमीन: {} एकड़\n\n🏆 सर्वश्रेष्ठ फसलें:",
                season, ctx.soil_health.soil_type, ctx.land_area,
            ),
            Language::English => format!(
                "🌱 Crop Recommendations for You ({} season):\n\n\
                 📊 Soil: {}\n📏 Land: {} acres\n\n🏆 Best Crops:",
                season, ctx.soil_health.soil_type, ctx.land_area,
            ),
        };

        for (i, rec) in recommendations.iter().enumerate() {
            response.push_str(&match language {
                Language::Hindi => format!(
                    "\n{}. {}\n   💰 लाभ: ₹{}/एकड़\n   📅 अवधि: {} दिन\n   💧 पानी: {}",
                    i + 1,
                    rec.crop,
                    format_inr(rec.profit_per_acre),
                    rec.duration_days,
                    rec.water_requirement,
                ),
                Language::English => format!(
                    "\n{}. {}\n   💰 Profit: ₹{}/acre\n   📅 Duration: {} days\n   💧 Water: {}",
                    i + 1,
                    rec.crop,
                    format_inr(rec.profit_per_acre),
                    rec.duration_days,
                    rec.water_requirement,
                ),
            });
        }

        if let Some(best) = recommendations.first() {
            response.push_str(&match language {
                Language::Hindi => format!(
                    "\n\n💡 सुझाव:\n• {} सबसे लाभदायक है\n• बाजार के दामों पर नजर रखें\n• सरकारी सब्सिडी का लाभ उठाएं",
                    best.crop,
                ),
                Language::English => format!(
                    "\n\n💡 Tips:\n• {} is most profitable\n• Monitor market prices\n• Avail government subsidies",
                    best.crop,
                ),
            });
        }

        Ok(response)
    }

    fn render_soil_health(ctx: &UserContext, language: Language) -> String {
        let ph = ctx.soil_health.ph;
        let ph_ok = (6.0..=7.5).contains(&ph);
        let soil_type = &ctx.soil_health.soil_type;

        match language {
            Language::Hindi => {
                let status = if ph_ok { "अच्छा" } else { "सुधार की आवश्यकता" };
                format!(
                    "🌱 आपकी मिट्टी की जानकारी:\n\n\
                     📊 pH स्तर: {} ({})\n🏗️ मिट्टी का प्रकार: {}\n\n\
                     💡 सुधार के सुझाव:\n\
                     • जैविक खाद का प्रयोग करें\n\
                     • नियमित मिट्टी परीक्षण करें\n\
                     • फसल चक्र अपनाएं\n\
                     • हरी खाद का प्रयोग करें\n\n\
                     📞 मिट्टी परीक्षण के लिए कृषि विभाग से संपर्क करें।",
                    ph, status, soil_type,
                )
            }
            Language::English => {
                let status = if ph_ok { "Good" } else { "Needs improvement" };
                format!(
                    "🌱 Your Soil Information:\n\n\
                     📊 pH Level: {} ({})\n🏗️ Soil Type: {}\n\n\
                     💡 Improvement Suggestions:\n\
                     • Use organic fertilizers\n\
                     • Get regular soil testing\n\
                     • Follow crop rotation\n\
                     • Use green manure\n\n\
                     📞 Contact agriculture department for soil testing.",
                    ph, status, soil_type,
                )
            }
        }
    }

    fn render_farming_practices(language: Language) -> String {
        match language {
            Language::Hindi => "🌾 कृषि के सर्वोत्तम तरीके:\n\n\
                 📅 समय पर बुवाई करें\n💧 सिंचाई का ध्यान रखें\n\
                 🌱 उचित फसल चक्र अपनाएं\n🐛 कीट प्रबंधन करें\n🌿 खरपतवार नियंत्रण करें\n\n\
                 💡 आधुनिक तकनीकें:\n• ड्रिप सिंचाई\n• जैविक खेती\n• प्रेसिजन फार्मिंग\n• मल्चिंग\n\n\
                 📚 कृषि विभाग से प्रशिक्षण लें।"
                .to_string(),
            Language::English => "🌾 Best Farming Practices:\n\n\
                 📅 Sow at the right time\n💧 Manage irrigation properly\n\
                 🌱 Follow proper crop rotation\n🐛 Control pests\n🌿 Manage weeds\n\n\
                 💡 Modern Techniques:\n• Drip irrigation\n• Organic farming\n• Precision farming\n• Mulching\n\n\
                 📚 Get training from agriculture department."
                .to_string(),
        }
    }

    fn render_pest_management(language: Language) -> String {
        match language {
            Language::Hindi => "🐛 कीट प्रबंधन सलाह:\n\n\
                 🔍 नियमित निरीक्षण करें\n🌿 जैविक कीटनाशक प्रयोग करें\n\
                 🦅 प्राकृतिक शत्रुओं को बढ़ावा दें\n🌱 फसल चक्र अपनाएं\n\
                 🧪 रासायनिक कीटनाशक कम प्रयोग करें\n\n\
                 ⚠️ सावधानियां:\n\
                 • कीटनाशक का सही मात्रा में प्रयोग\n\
                 • सुरक्षा उपकरण पहनें\n\
                 • फसल कटाई से पहले अंतराल रखें\n\n\
                 📞 कीट समस्या के लिए कृषि विभाग से संपर्क करें।"
                .to_string(),
            Language::English => "🐛 Pest Management Advice:\n\n\
                 🔍 Regular monitoring\n🌿 Use organic pesticides\n\
                 🦅 Promote natural enemies\n🌱 Follow crop rotation\n\
                 🧪 Minimize chemical pesticides\n\n\
                 ⚠️ Precautions:\n\
                 • Use pesticides in correct quantity\n\
                 • Wear safety equipment\n\
                 • Maintain gap before harvest\n\n\
                 📞 Contact agriculture department for pest problems."
                .to_string(),
        }
    }

    fn render_general(language: Language) -> String {
        match language {
            Language::Hindi => "🌱 कृषि सलाह:\n\n\
                 • मिट्टी की जांच नियमित करें\n• उचित फसल चुनें\n• सिंचाई का ध्यान रखें\n\
                 • कीट प्रबंधन करें\n• बाजार के दामों पर नजर रखें\n\n\
                 क्या आप फसल, मिट्टी या कीट प्रबंधन के बारे में जानना चाहते हैं?"
                .to_string(),
            Language::English => "🌱 Agricultural Advice:\n\n\
                 • Get regular soil testing\n• Choose appropriate crops\n• Manage irrigation properly\n\
                 • Control pests\n• Monitor market prices\n\n\
                 Do you want to know about crops, soil, or pest management?"
                .to_string(),
        }
    }
}

impl Default for AgronomyAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Advisor for AgronomyAdvisor {
    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Agronomy
    }

    fn is_initialized(&self) -> bool {
        self.crops.get().is_some()
    }

    async fn initialize(&self) -> Result<()> {
        let _ = self.crops.set(Self::load_crops());
        info!("agronomy advisor initialized");
        Ok(())
    }

    async fn process(
        &self,
        query: &str,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        self.crops()?;

        Ok(match classify_topic(query) {
            AgronomyTopic::CropRecommendation => self.render_crop_recommendation(ctx, language)?,
            AgronomyTopic::SoilHealth => Self::render_soil_health(ctx, language),
            AgronomyTopic::FarmingPractices => Self::render_farming_practices(language),
            AgronomyTopic::PestManagement => Self::render_pest_management(language),
            AgronomyTopic::General => Self::render_general(language),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SoilHealth;

    fn test_context(soil_type: &str) -> UserContext {
        UserContext {
            user_id: "test-user".to_string(),
            location: "Punjab".to_string(),
            land_area: 5.0,
            current_loans: vec![],
            current_crops: vec![],
            soil_health: SoilHealth {
                ph: 7.2,
                soil_type: soil_type.to_string(),
                nitrogen: Some("medium".to_string()),
            },
            language: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rabi_loamy_ranks_wheat_over_sugarcane() {
        let advisor = AgronomyAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context("loamy");

        // loamy rabi: wheat only (potato is sandy_loam, sugarcane clay_loam)
        let recs = advisor.recommendations_for(&ctx, "rabi").unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].crop, "wheat");
        // 20 quintals * 2100 * 0.4
        assert_eq!(recs[0].profit_per_acre, 16_800.0);
    }

    #[tokio::test]
    async fn test_unknown_soil_falls_back_to_season_list() {
        let advisor = AgronomyAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context("black");

        // no soil match in rabi, so all rabi + year_round crops qualify,
        // ranked by profit per acre
        let recs = advisor.recommendations_for(&ctx, "rabi").unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].crop, "potato"); // 120 * 800 * 0.55 = 52,800
        assert_eq!(recs[1].crop, "sugarcane"); // 350 * 315 * 0.3 = 33,075
        assert_eq!(recs[2].crop, "wheat"); // 16,800
    }

    #[tokio::test]
    async fn test_zaid_season_only_year_round_crops() {
        let advisor = AgronomyAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context("loamy");

        let recs = advisor.recommendations_for(&ctx, "zaid").unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].crop, "sugarcane");
    }

    #[tokio::test]
    async fn test_soil_query_reports_ph_status() {
        let advisor = AgronomyAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context("loamy");
        let out = advisor
            .process("is my soil ok", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("pH Level: 7.2 (Good)"));
    }

    #[tokio::test]
    async fn test_uninitialized_advisor_errors() {
        let advisor = AgronomyAdvisor::new();
        let ctx = test_context("loamy");
        let err = advisor
            .process("which crop", &ctx, Language::Hindi)
            .await
            .unwrap_err();
        assert_eq!(err, AdvisorError::NotInitialized(AdvisorKind::Agronomy));
    }
}
