//! Policy advisor: government schemes, eligibility, and application guidance.

use std::sync::OnceLock;

use tracing::info;

use super::Advisor;
use crate::error::AdvisorError;
use crate::models::{AdvisorKind, Language, UserContext};
use crate::Result;

#[derive(Debug, Clone)]
pub struct GovernmentScheme {
    pub name: &'static str,
    pub benefit: &'static str,
    pub frequency: &'static str,
    pub eligibility: &'static str,
    /// None means no land-based limit.
    pub land_limit_acres: Option<f64>,
    pub application: &'static str,
    pub helpline: &'static str,
}

#[derive(Debug, Clone)]
pub struct StateSubsidy {
    pub name: &'static str,
    pub benefit: &'static str,
    pub frequency: &'static str,
    pub eligibility: &'static str,
}

#[derive(Debug, Clone)]
pub struct ApplicationCenter {
    pub name: &'static str,
    pub services: &'static str,
    pub contact: &'static str,
    pub working_hours: &'static str,
}

struct PolicyData {
    schemes: Vec<GovernmentScheme>,
    subsidies: Vec<StateSubsidy>,
    centers: Vec<ApplicationCenter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyTopic {
    SchemeInfo,
    EligibilityCheck,
    ApplicationHelp,
    SubsidyInfo,
    General,
}

fn classify_topic(query: &str) -> PolicyTopic {
    let q = query.to_lowercase();
    let matches = |words: &[&str]| words.iter().any(|w| q.contains(w));

    if matches(&["scheme", "yojana", "program"]) {
        PolicyTopic::SchemeInfo
    } else if matches(&["eligible", "qualify", "check"]) {
        PolicyTopic::EligibilityCheck
    } else if matches(&["apply", "application", "form"]) {
        PolicyTopic::ApplicationHelp
    } else if matches(&["subsidy", "help", "support"]) {
        PolicyTopic::SubsidyInfo
    } else {
        PolicyTopic::General
    }
}

pub struct PolicyAdvisor {
    data: OnceLock<PolicyData>,
}

impl PolicyAdvisor {
    pub fn new() -> Self {
        Self {
            data: OnceLock::new(),
        }
    }

    fn data(&self) -> std::result::Result<&PolicyData, AdvisorError> {
        self.data
            .get()
            .ok_or(AdvisorError::NotInitialized(AdvisorKind::Policy))
    }

    fn load_tables() -> PolicyData {
        let schemes = vec![
            GovernmentScheme {
                name: "PM-KISAN (Pradhan Mantri Kisan Samman Nidhi)",
                benefit: "₹6,000 per year in quarterly installments",
                frequency: "yearly",
                eligibility: "Small and marginal farmers (up to 2 hectares)",
                land_limit_acres: Some(5.0),
                application: "Online through PM-KISAN portal",
                helpline: "1800-180-1551",
            },
            GovernmentScheme {
                name: "PM Fasal Bima Yojana (Crop Insurance)",
                benefit: "Up to 100% of sum insured",
                frequency: "per_crop_season",
                eligibility: "All farmers growing notified crops",
                land_limit_acres: None,
                application: "Through banks or insurance companies",
                helpline: "1800-180-1551",
            },
            GovernmentScheme {
                name: "Kisan Credit Card (KCC)",
                benefit: "Credit up to ₹3 lakhs",
                frequency: "renewable",
                eligibility: "All farmers including tenant farmers",
                land_limit_acres: None,
                application: "Through banks",
                helpline: "Local bank branches",
            },
            GovernmentScheme {
                name: "PM Kisan Suryodaya Yojana (Solar Pumps)",
                benefit: "Up to ₹1.5 lakhs",
                frequency: "one_time",
                eligibility: "Farmers with 2+ acres",
                land_limit_acres: None,
                application: "Through agriculture department",
                helpline: "1800-180-1551",
            },
        ];

        let subsidies = vec![
            StateSubsidy {
                name: "Seed Subsidy Scheme",
                benefit: "₹500 per quintal",
                frequency: "per_quintal",
                eligibility: "Small and marginal farmers",
            },
            StateSubsidy {
                name: "Fertilizer Subsidy",
                benefit: "₹1,400 per bag",
                frequency: "per_bag",
                eligibility: "All farmers",
            },
            StateSubsidy {
                name: "Pesticide Subsidy",
                benefit: "₹300 per liter",
                frequency: "per_liter",
                eligibility: "All farmers",
            },
            StateSubsidy {
                name: "Drip Irrigation Subsidy",
                benefit: "₹50,000 one-time",
                frequency: "one_time",
                eligibility: "Farmers with 2+ acres",
            },
            StateSubsidy {
                name: "Farm Machinery Subsidy",
                benefit: "Up to 40% of cost",
                frequency: "one_time",
                eligibility: "Farmers with 5+ acres",
            },
        ];

        let centers = vec![
            ApplicationCenter {
                name: "Agriculture Department Office",
                services: "PM-KISAN, Seed subsidy, Crop insurance, Drip irrigation",
                contact: "0172-2700711",
                working_hours: "9:00 AM - 5:00 PM",
            },
            ApplicationCenter {
                name: "Bank Branch",
                services: "PM-KISAN, Crop loans, KCC, Insurance",
                contact: "Varies by bank",
                working_hours: "10:00 AM - 4:00 PM",
            },
            ApplicationCenter {
                name: "Common Service Center (CSC)",
                services: "All schemes, Online applications, Document verification",
                contact: "1800-3000-3468",
                working_hours: "8:00 AM - 8:00 PM",
            },
            ApplicationCenter {
                name: "Krishi Vigyan Kendra",
                services: "Technical guidance, Training programs, Scheme information",
                contact: "0172-2700711",
                working_hours: "9:00 AM - 6:00 PM",
            },
        ];

        PolicyData {
            schemes,
            subsidies,
            centers,
        }
    }

    /// Schemes the user's land holding qualifies for.
    fn eligible_schemes<'a>(data: &'a PolicyData, land_area: f64) -> Vec<&'a GovernmentScheme> {
        data.schemes
            .iter()
            .filter(|s| s.land_limit_acres.map_or(true, |limit| land_area <= limit))
            .collect()
    }

    fn render_scheme_info(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;
        let schemes = Self::eligible_schemes(data, ctx.land_area);

        let mut response = match language {
            Language::Hindi => "🏛️ आपके लिए उपलब्ध सरकारी योजनाएं:\n\n".to_string(),
            Language::English => "🏛️ Government Schemes Available for You:\n\n".to_string(),
        };

        for scheme in schemes.iter().take(5) {
            response.push_str(&match language {
                Language::Hindi => format!(
                    "📋 {}:\n💰 लाभ: {}\n✅ पात्रता: {}\n📝 आवेदन: {}\n\n",
                    scheme.name, scheme.benefit, scheme.eligibility, scheme.application,
                ),
                Language::English => format!(
                    "📋 {}:\n💰 Benefit: {}\n✅ Eligibility: {}\n📝 Application: {}\n\n",
                    scheme.name, scheme.benefit, scheme.eligibility, scheme.application,
                ),
            });
        }

        response.push_str(match language {
            Language::Hindi => {
                "📞 आवेदन के लिए संपर्क करें:\n• कृषि विभाग कार्यालय\n• बैंक शाखा\n\
                 • कॉमन सर्विस सेंटर (CSC)\n• ऑनलाइन पोर्टल"
            }
            Language::English => {
                "📞 To Apply Contact:\n• Agriculture Department Office\n• Bank Branch\n\
                 • Common Service Center (CSC)\n• Online Portal"
            }
        });

        Ok(response)
    }

    fn render_eligibility_check(
        &self,
        ctx: &UserContext,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;

        let mut response = match language {
            Language::Hindi => "✅ आपकी योजना पात्रता जांच:\n\n".to_string(),
            Language::English => "✅ Your Scheme Eligibility Check:\n\n".to_string(),
        };

        for scheme in &data.schemes {
            let eligible = scheme
                .land_limit_acres
                .map_or(true, |limit| ctx.land_area <= limit);
            response.push_str(&match (eligible, language) {
                (true, Language::Hindi) => format!(
                    "📋 {}:\n✅ पात्र\n📝 कारण: जमीन {} एकड़\n\n",
                    scheme.name, ctx.land_area,
                ),
                (false, Language::Hindi) => format!(
                    "📋 {}:\n❌ अपात्र\n📝 कारण: जमीन सीमा {} एकड़\n\n",
                    scheme.name,
                    scheme.land_limit_acres.unwrap_or_default(),
                ),
                (true, Language::English) => format!(
                    "📋 {}:\n✅ Eligible\n📝 Reason: Land area {} acres\n\n",
                    scheme.name, ctx.land_area,
                ),
                (false, Language::English) => format!(
                    "📋 {}:\n❌ Not Eligible\n📝 Reason: Land limit {} acres\n\n",
                    scheme.name,
                    scheme.land_limit_acres.unwrap_or_default(),
                ),
            });
        }

        response.push_str(match language {
            Language::Hindi => {
                "💡 सुझाव:\n• पात्र योजनाओं के लिए आवेदन करें\n• आवश्यक दस्तावेज तैयार रखें\n• नियमित अपडेट जांचें"
            }
            Language::English => {
                "💡 Tips:\n• Apply for eligible schemes\n• Keep required documents ready\n• Check for regular updates"
            }
        });

        Ok(response)
    }

    fn render_application_help(
        &self,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;
        let centers = data
            .centers
            .iter()
            .map(|c| format!("• {} ({})", c.name, c.working_hours))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(match language {
            Language::Hindi => format!(
                "📝 योजना आवेदन में सहायता:\n\n\
                 📋 आवश्यक दस्तावेज:\n\
                 • आधार कार्ड\n• भूमि के कागजात\n• बैंक खाता विवरण\n• फोटो\n\n\
                 📞 आवेदन केंद्र:\n{}\n\n\
                 ⏰ प्रक्रिया:\n\
                 1. दस्तावेज इकट्ठा करें\n\
                 2. निकटतम केंद्र पर जाएं\n\
                 3. फॉर्म भरें और जमा करें\n\
                 4. आवेदन संख्या नोट करें\n\
                 5. स्थिति जांचें\n\n\
                 📞 हेल्पलाइन: 1800-180-1551",
                centers,
            ),
            Language::English => format!(
                "📝 Scheme Application Help:\n\n\
                 📋 Required Documents:\n\
                 • Aadhaar Card\n• Land Records\n• Bank Account Details\n• Photos\n\n\
                 📞 Application Centers:\n{}\n\n\
                 ⏰ Process:\n\
                 1. Collect documents\n\
                 2. Visit nearest center\n\
                 3. Fill and submit form\n\
                 4. Note application number\n\
                 5. Check status\n\n\
                 📞 Helpline: 1800-180-1551",
                centers,
            ),
        })
    }

    fn render_subsidy_info(
        &self,
        language: Language,
    ) -> std::result::Result<String, AdvisorError> {
        let data = self.data()?;
        let bullets = data
            .subsidies
            .iter()
            .map(|s| match language {
                Language::Hindi => format!("💰 {}:\n💵 लाभ: {}\n✅ पात्रता: {}\n", s.name, s.benefit, s.eligibility),
                Language::English => format!(
                    "💰 {}:\n💵 Benefit: {}\n✅ Eligibility: {}\n",
                    s.name, s.benefit, s.eligibility
                ),
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(match language {
            Language::Hindi => format!(
                "💰 आपके लिए उपलब्ध सब्सिडी:\n\n{}\n\
                 💡 सब्सिडी के लाभ:\n\
                 • कृषि लागत कम होती है\n• लाभ बढ़ता है\n• जोखिम कम होता है\n\
                 • आधुनिक तकनीक अपनाने में मदद",
                bullets,
            ),
            Language::English => format!(
                "💰 Subsidies Available for You:\n\n{}\n\
                 💡 Benefits of Subsidies:\n\
                 • Reduces agricultural costs\n• Increases profits\n• Reduces risk\n\
                 • Helps adopt modern technology",
                bullets,
            ),
        })
    }

    fn render_general(language: Language) -> String {
        match language {
            Language::Hindi => "🏛️ सरकारी योजना सलाह:\n\n\
                 • नियमित रूप से नई योजनाएं जांचें\n• पात्रता मापदंड समझें\n\
                 • आवश्यक दस्तावेज तैयार रखें\n• समय पर आवेदन करें\n• आवेदन स्थिति जांचें\n\n\
                 क्या आप किसी विशेष योजना, सब्सिडी या आवेदन प्रक्रिया के बारे में जानना चाहते हैं?"
                .to_string(),
            Language::English => "🏛️ Government Scheme Advice:\n\n\
                 • Check for new schemes regularly\n• Understand eligibility criteria\n\
                 • Keep required documents ready\n• Apply on time\n• Check application status\n\n\
                 Do you want to know about specific schemes, subsidies, or application process?"
                .to_string(),
        }
    }
}

impl Default for PolicyAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Advisor for PolicyAdvisor {
    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Policy
    }

    fn is_initialized(&self) -> bool {
        self.data.get().is_some()
    }

    async fn initialize(&self) -> Result<()> {
        let _ = self.data.set(Self::load_tables());
        info!("policy advisor initialized");
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
            PolicyTopic::SchemeInfo => self.render_scheme_info(ctx, language)?,
            PolicyTopic::EligibilityCheck => self.render_eligibility_check(ctx, language)?,
            PolicyTopic::ApplicationHelp => self.render_application_help(language)?,
            PolicyTopic::SubsidyInfo => self.render_subsidy_info(language)?,
            PolicyTopic::General => Self::render_general(language),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SoilHealth;

    fn test_context(land_area: f64) -> UserContext {
        UserContext {
            user_id: "test-user".to_string(),
            location: "Punjab".to_string(),
            land_area,
            current_loans: vec![],
            current_crops: vec![],
            soil_health: SoilHealth {
                ph: 7.0,
                soil_type: "loamy".to_string(),
                nitrogen: None,
            },
            language: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_small_holding_gets_pm_kisan() {
        let advisor = PolicyAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context(4.0);
        let out = advisor
            .process("kaunsi yojana milegi", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("PM-KISAN"));
        assert!(out.contains("Crop Insurance"));
    }

    #[tokio::test]
    async fn test_large_holding_fails_pm_kisan_eligibility() {
        let advisor = PolicyAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context(10.0);
        let out = advisor
            .process("do I qualify", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("❌ Not Eligible"));
        // unlimited schemes still pass
        assert!(out.contains("✅ Eligible"));
    }

    #[tokio::test]
    async fn test_application_query_lists_centers() {
        let advisor = PolicyAdvisor::new();
        advisor.initialize().await.unwrap();
        let ctx = test_context(4.0);
        let out = advisor
            .process("how to apply for subsidy", &ctx, Language::English)
            .await
            .unwrap();
        assert!(out.contains("Common Service Center"));
        assert!(out.contains("1800-180-1551"));
    }

    #[tokio::test]
    async fn test_uninitialized_advisor_errors() {
        let advisor = PolicyAdvisor::new();
        let ctx = test_context(4.0);
        let err = advisor
            .process("yojana", &ctx, Language::Hindi)
            .await
            .unwrap_err();
        assert_eq!(err, AdvisorError::NotInitialized(AdvisorKind::Policy));
    }
}
