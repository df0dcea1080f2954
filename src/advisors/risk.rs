//! Risk advisor: weather hazards, pest outbreaks, and mitigation planning.

use std::sync::OnceLock;

use tracing::info;

use super::{current_season, Advisor};
use crate::error::AdvisorError;
use crate::models::{AdvisorKind, Language, UserContext};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    fn localized(&self, language: Language) -> &'static str {
        match (self, language) {
            (Severity::Low, Language::Hindi) => "कम",
            (Severity::Medium, Language::Hindi) => "मध्यम",
            (Severity::High, Language::Hindi) => "उच्च",
            (Severity::Low, Language::English) => "Low",
            (Severity::Medium, Language::English) => "Medium",
            (Severity::High, Language::English) => "High",
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            Severity::High => "🔴",
            _ => "🟡",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherHazard {
    pub name: &'static str,
    pub probability_pct: u8,
    pub affected_districts: &'static [&'static str],
    pub impact: &'static str,
    pub mitigation: &'static str,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct PestThreat {
    pub name: &'static str,
    pub crops_affected: &'static [&'static str],
    pub severity: Severity,
    pub affected_districts: &'static [&'static str],
    pub symptoms: &'static str,
    pub control: &'static str,
}

struct RiskData {
    weather_hazards: Vec<WeatherHazard>,
    pest_threats: Vec<PestThreat>,
}

/// A hazard applies to a location when the district list names it, names the
/// whole state, or is marked state-wide.
fn applies_to(districts: &[&str], location: &str) -> bool {
    districts
        .iter()
        .any(|d| *d == location || *d == "All districts")
        || location == "Punjab"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RiskTopic {
    WeatherAlert,
    PestAlert,
    RiskAssessment,
    MitigationStrategy,
    General,
}

fn classify_topic(query: &str) -> RiskTopic {
    let q = query.to_lowercase();
    let matches = |words: &[&str]| words.iter().any(|w| q.contains(w));

    if matches(&["weather", "rain", "drought", "flood", "mausam", "baarish"]) {
        RiskTopic::WeatherAlert
    } else if matches(&["pest", "disease", "keet", "rogi"]) {
        RiskTopic::PestAlert
    } else if matches(&["risk", "danger", "threat", "khatra"]) {
        RiskTopic::RiskAssessment
    } else if matches(&["prevent", "protect", "save", "bachao"]) {
        RiskTopic::MitigationStrategy
    } else {
        RiskTopic::General
    }
}

pub struct RiskAdvisor {
    data: OnceLock<RiskData>,
}

impl RiskAdvisor {
    pub fn new() -> Self {
        Self {
            data: OnceLock::new(),
        }
    }

    fn data(&self) -> std::result::Result<&RiskData, AdvisorError> {
        self.data
            .get()
            .ok_or(AdvisorError::NotInitialized(AdvisorKind::Risk))
    }

    fn load_tables() -> RiskData {
        let weather_hazards = vec![
            WeatherHazard {
                name: "Drought",
                probability_pct: 15,
                affected_districts: &["Bathinda", "Mansa", "Muktsar"],
                impact: "Crop failure, water scarcity",
                mitigation: "Drip irrigation, drought-resistant crops",
                severity: Severity::Medium,
            },
            WeatherHazard {
                name: "Flood",
                probability_pct: 10,
                affected_districts: &["Amritsar", "Gurdaspur", "Tarn Taran"],
                impact: "Crop damage, soil erosion",
                mitigation: "Drainage systems, elevated storage",
                severity: Severity::Medium,
            },
            WeatherHazard {
                name: "Heat Wave",
                probability_pct: 25,
                affected_districts: &["All districts"],
                impact: "Crop stress, reduced yield",
                mitigation: "Shade nets, frequent irrigation",
                severity: Severity::High,
            },
            WeatherHazard {
                name: "Frost",
                probability_pct: 20,
                affected_districts: &["Patiala", "Sangrur", "Ludhiana"],
                impact: "Winter crop damage",
                mitigation: "Frost protection, crop timing",
                severity: Severity::Medium,
            },
        ];

        let pest_threats = vec![
            PestThreat {
                name: "Fall Armyworm",
                crops_affected: &["maize", "sugarcane"],
                severity: Severity::High,
                affected_districts: &["Ludhiana", "Jalandhar", "Amritsar"],
                symptoms: "Ragged leaf feeding, larvae in whorls",
                control: "Biological control, targeted pesticides, crop rotation",
            },
            PestThreat {
                name: "Pink Bollworm",
                crops_affected: &["cotton"],
                severity: Severity::Medium,
                affected_districts: &["Bathinda", "Mansa", "Muktsar"],
                symptoms: "Rosetted flowers, damaged bolls",
                control: "Bt cotton, pheromone traps, early harvest",
            },
            PestThreat {
                name: "Brown Planthopper",
                crops_affected: &["rice"],
                severity: Severity::Low,
                affected_districts: &["Patiala", "Sangrur"],
                symptoms: "Hopper burn, yellowing patches",
                control: "Resistant varieties, biological control, water management",
            },
            PestThreat {
                name: "Yellow Rust",
                crops_affected: &["wheat"],
                severity: Severity::Medium,
                affected_districts: &["All districts"],
                symptoms: "Yellow powdery stripes on leaves",
                control: "Resistant varieties, fungicides, early sowing",
            },
        ];

        RiskData {
            weather_hazards,
            pest_threats,
        }
    }

    fn relevant_pests<'a>(data: &'a RiskData, ctx: &UserContext) -> Vec<&'a PestThreat> {
        let user_crops: Vec<String> = ctx
            .current_crops
            .iter()
            .map(|c| c.name.to_lowercase())
            .collect();

        data.pest_threats
            .iter()
            .filter(|p| applies_to(p.affected_districts, &ctx.location))
            .filter(|p| {
                p.crops_affected
                    .iter()
                    .any(|crop| user_crops.iter().any(|uc| uc == crop))
            })
            .collect()
    }

    fn render_weather_alert(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;
        let alerts: Vec<&WeatherHazard> = data
            .weather_hazards
            .iter()
            .filter(|h| applies_to(h.affected_districts, &ctx.location))
            .collect();

        if alerts.is_empty() {
            return Ok(match language {
                Language::Hindi => format!(
                    "✅ {} में कोई मौसम चेतावनी नहीं है।\n\n🌤️ वर्तमान मौसम स्थिति सामान्य है।",
                    ctx.location,
                ),
                Language::English => format!(
                    "✅ No weather alerts for {}.\n\n🌤️ Current weather conditions are normal.",
                    ctx.location,
                ),
            });
        }

        let mut response = match language {
            Language::Hindi => format!("⚠️ {} के लिए मौसम चेतावनी:\n\n", ctx.location),
            Language::English => format!("⚠️ Weather Alert for {}:\n\n", ctx.location),
        };

        for alert in alerts {
            response.push_str(&match language {
                Language::Hindi => format!(
                    "{} {}:\n📊 जोखिम स्तर: {} ({}%)\n💥 प्रभाव: {}\n🛡️ बचाव: {}\n\n",
                    alert.severity.emoji(),
                    alert.name,
                    alert.severity.localized(language),
                    alert.probability_pct,
                    alert.impact,
                    alert.mitigation,
                ),
                Language::English => format!(
                    "{} {}:\n📊 Risk Level: {} ({}%)\n💥 Impact: {}\n🛡️ Mitigation: {}\n\n",
                    alert.severity.emoji(),
                    alert.name,
                    alert.severity.localized(language),
                    alert.probability_pct,
                    alert.impact,
                    alert.mitigation,
                ),
            });
        }

        response.push_str(match language {
            Language::Hindi => {
                "📱 अलर्ट प्राप्त करने के लिए:\n• IMD वेबसाइट पर जाएं\n• मौसम ऐप डाउनलोड करें\n• कृषि विभाग से संपर्क करें"
            }
            Language::English => {
                "📱 To receive alerts:\n• Visit IMD website\n• Download weather app\n• Contact agriculture department"
            }
        });

        Ok(response)
    }

    fn render_pest_alert(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;
        let pests = Self::relevant_pests(data, ctx);

        if pests.is_empty() {
            return Ok(match language {
                Language::Hindi => format!(
                    "✅ {} में कोई कीट चेतावनी नहीं है।\n\n🌱 आपकी फसलें सुरक्षित हैं।",
                    ctx.location,
                ),
                Language::English => format!(
                    "✅ No pest alerts for {}.\n\n🌱 Your crops are safe.",
                    ctx.location,
                ),
            });
        }

        let mut response = match language {
            Language::Hindi => format!("🐛 {} में कीट चेतावनी:\n\n", ctx.location),
            Language::English => format!("🐛 Pest Alert for {}:\n\n", ctx.location),
        };

        for pest in pests {
            response.push_str(&match language {
                Language::Hindi => format!(
                    "{} {}:\n📊 जोखिम स्तर: {}\n🌾 प्रभावित फसलें: {}\n🔍 लक्षण: {}\n🛡️ नियंत्रण: {}\n\n",
                    pest.severity.emoji(),
                    pest.name,
                    pest.severity.localized(language),
                    pest.crops_affected.join(", "),
                    pest.symptoms,
                    pest.control,
                ),
                Language::English => format!(
                    "{} {}:\n📊 Risk Level: {}\n🌾 Affected Crops: {}\n🔍 Symptoms: {}\n🛡️ Control: {}\n\n",
                    pest.severity.emoji(),
                    pest.name,
                    pest.severity.localized(language),
                    pest.crops_affected.join(", "),
                    pest.symptoms,
                    pest.control,
                ),
            });
        }

        response.push_str(match language {
            Language::Hindi => {
                "💡 कीट प्रबंधन सुझाव:\n• नियमित निरीक्षण करें\n• जैविक कीटनाशक प्रयोग करें\n\
                 • फसल चक्र अपनाएं\n• कृषि विभाग से सलाह लें"
            }
            Language::English => {
                "💡 Pest Management Tips:\n• Regular monitoring\n• Use organic pesticides\n\
                 • Follow crop rotation\n• Consult agriculture department"
            }
        });

        Ok(response)
    }

    fn render_risk_assessment(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;
        let season = current_season();

        let mut risk_factors: Vec<String> = data
            .weather_hazards
            .iter()
            .filter(|h| applies_to(h.affected_districts, &ctx.location))
            .map(|h| format!("Weather: {}", h.name))
            .collect();
        risk_factors.extend(
            Self::relevant_pests(data, ctx)
                .iter()
                .map(|p| format!("Pest: {}", p.name)),
        );

        let level = match risk_factors.len() {
            0..=1 => Severity::Low,
            2..=3 => Severity::Medium,
            _ => Severity::High,
        };

        let mut response = match language {
            Language::Hindi => format!(
                "🔍 आपकी फसलों का जोखिम मूल्यांकन:\n\n📍 स्थान: {}\n🌾 फसलें: {}\n📅 मौसम: {}\n\n",
                ctx.location,
                ctx.current_crops.len(),
                season,
            ),
            Language::English => format!(
                "🔍 Risk Assessment for Your Crops:\n\n📍 Location: {}\n🌾 Crops: {}\n📅 Season: {}\n\n",
                ctx.location,
                ctx.current_crops.len(),
                season,
            ),
        };

        if risk_factors.is_empty() {
            response.push_str(match language {
                Language::Hindi => "✅ कोई जोखिम नहीं पहचाना गया।\n",
                Language::English => "✅ No risks identified.\n",
            });
        } else {
            response.push_str(match language {
                Language::Hindi => "⚠️ पहचाने गए जोखिम:\n",
                Language::English => "⚠️ Identified Risks:\n",
            });
            for (i, factor) in risk_factors.iter().enumerate() {
                response.push_str(&format!("{}. {}\n", i + 1, factor));
            }
            response.push_str(&match language {
                Language::Hindi => {
                    format!("\n📊 कुल जोखिम स्तर: {}\n", level.localized(language))
                }
                Language::English => {
                    format!("\n📊 Overall Risk Level: {}\n", level.localized(language))
                }
            });
        }

        response.push_str(match language {
            Language::Hindi => {
                "\n💡 सुझाव:\n• नियमित निगरानी करें\n• बीमा करवाएं\n• विविधीकरण करें\n• आपातकालीन योजना बनाएं"
            }
            Language::English => {
                "\n💡 Recommendations:\n• Regular monitoring\n• Get insurance\n• Diversify crops\n• Plan for emergencies"
            }
        });

        Ok(response)
    }

    fn render_mitigation_strategy(language: Language) -> String {
        match language {
            Language::Hindi => "🛡️ जोखिम कम करने की रणनीतियां:\n\n\
                 🌤️ मौसम जोखिम के लिए:\n\
                 • फसल बीमा करवाएं\n• सिंचाई व्यवस्था सुधारें\n\
                 • मौसम पूर्वानुमान जांचें\n• आपातकालीन योजना बनाएं\n\n\
                 🐛 कीट जोखिम के लिए:\n\
                 • नियमित निरीक्षण करें\n• जैविक कीटनाशक प्रयोग करें\n\
                 • फसल चक्र अपनाएं\n• प्रतिरोधी किस्में उगाएं\n\n\
                 💰 आर्थिक जोखिम के लिए:\n\
                 • फसल विविधीकरण करें\n• बाजार के दामों पर नजर रखें\n\
                 • सरकारी सब्सिडी का लाभ उठाएं\n• बचत और बीमा करें\n\n\
                 📞 आपातकालीन संपर्क:\n\
                 • कृषि विभाग: 1800-180-1551\n• मौसम विभाग: 1800-180-1717"
                .to_string(),
            Language::English => "🛡️ Risk Mitigation Strategies:\n\n\
                 🌤️ For Weather Risks:\n\
                 • Get crop insurance\n• Improve irrigation systems\n\
                 • Check weather forecasts\n• Plan for emergencies\n\n\
                 🐛 For Pest Risks:\n\
                 • Regular monitoring\n• Use organic pesticides\n\
                 • Follow crop rotation\n• Grow resistant varieties\n\n\
                 💰 For Financial Risks:\n\
                 • Diversify crops\n• Monitor market prices\n\
                 • Avail government subsidies\n• Save and insure\n\n\
                 📞 Emergency Contacts:\n\
                 • Agriculture Department: 1800-180-1551\n• Weather Department: 1800-180-1717"
                .to_string(),
        }
    }

    fn render_general(language: Language) -> String {
        match language {
            Language::Hindi => "⚠️ जोखिम प्रबंधन सलाह:\n\n\
                 • नियमित रूप से मौसम जांचें\n• फसलों का निरीक्षण करें\n• बीमा करवाएं\n\
                 • आपातकालीन योजना बनाएं\n• विविधीकरण करें\n\n\
                 क्या आप मौसम चेतावनी, कीट प्रबंधन या जोखिम कम करने के बारे में जानना चाहते हैं?"
                .to_string(),
            Language::English => "⚠️ Risk Management Advice:\n\n\
                 • Check weather regularly\n• Monitor crops\n• Get insurance\n\
                 • Plan for emergencies\n• Diversify\n\n\
                 Do you want to know about weather alerts, pest management, or risk reduction?"
                .to_string(),
        }
    }
}

impl Default for RiskAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Advisor for RiskAdvisor {
    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Risk
    }

    fn is_initialized(&self) -> bool {
        self.data.get().is_some()
    }

    async fn initialize(&self) -> Result<()> {
        let _ = self.data.set(Self::load_tables());
        info!("risk advisor initialized");
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
            RiskTopic::WeatherAlert => self.render_weather_alert(ctx, language)?,
            RiskTopic::PestAlert => self.render_pest_alert(ctx, language)?,
            RiskTopic::RiskAssessment => self.render_risk_assessment(ctx, language)?,
            RiskTopic::MitigationStrategy => Self::render_mitigation_strategy(language),
            RiskTopic::General => Self::render_general(language),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CropHolding, SoilHealth};

    fn test_context(location: &str, crops: Vec<&str>) -> UserContext {
        UserContext {
            user_id: "test-user".to_string(),
            location: location.to_string(),
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
                ph: 7.0,
                soil_type: "loamy".to_string(),
                nitrogen: None,
            },
            language: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_statewide_location_sees_all_weather_hazards() {
        let advisor = RiskAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context("Punjab", vec!["wheat"]);
        let out = advisor
            .process("weather alert", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("Heat Wave"));
        assert!(out.contains("Drought"));
    }

    #[tokio::test]
    async fn test_district_location_filters_hazards() {
        let advisor = RiskAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context("Bathinda", vec![]);
        let out = advisor
            .process("will it rain", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("Drought"));
        assert!(out.contains("Heat Wave")); // All districts
        assert!(!out.contains("Frost"));
    }

    #[tokio::test]
    async fn test_pest_alert_matches_user_crops_only() {
        let advisor = RiskAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context("Ludhiana", vec!["maize"]);
        let out = advisor
            .process("pest problem", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("Fall Armyworm"));
        assert!(!out.contains("Pink Bollworm"));
    }

    #[tokio::test]
    async fn test_pest_alert_safe_when_no_matching_crops() {
        let advisor = RiskAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context("Sangrur", vec!["potato"]);
        let out = advisor
            .process("keet lag gaya kya", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("Your crops are safe"));
    }

    #[tokio::test]
    async fn test_risk_assessment_reports_level() {
        let advisor = RiskAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context("Punjab", vec!["wheat", "maize"]);
        let out = advisor
            .process("kitna khatra hai", &ctx, Language::English)
            .await
            .unwrap();
        // 4 weather hazards + yellow rust + fall armyworm
        assert!(out.contains("Overall Risk Level: High"));
    }
}
