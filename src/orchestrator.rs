//! Composition root of a conversational turn
//!
//! Owns the five advisors, the LLM fallback, the context store, and the
//! conversation sink, and runs the turn pipeline:
//! context → classify → gate → { advisor fan-out + synthesis | fallback } →
//! log. The chat surface never sees a raw error: anything that escapes the
//! pipeline collapses into the fixed localized error payload.

use std::sync::Arc;

use tracing::{info, warn};

use crate::advisors::{
    Advisor, AgronomyAdvisor, FinanceAdvisor, MarketAdvisor, PolicyAdvisor, RiskAdvisor,
};
use crate::advisors::agronomy::CropRecommendation;
use crate::advisors::finance::DebtForecast;
use crate::advisors::market::MarketInsights;
use crate::context::ContextStore;
use crate::db::{ConversationSink, ConversationTurn};
use crate::fallback::LlmFallback;
use crate::intent::IntentClassifier;
use crate::models::{AdvisorKind, IntentAnalysis, Language, SynthesizedResponse, UserContext};
use crate::synthesis;
use crate::Result;

/// Per-advisor initialized flags for the status endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentStatus {
    pub finance: bool,
    pub agronomy: bool,
    pub market: bool,
    pub policy: bool,
    pub risk: bool,
}

impl AgentStatus {
    pub fn all_healthy(&self) -> bool {
        self.finance && self.agronomy && self.market && self.policy && self.risk
    }

    pub fn active_count(&self) -> usize {
        [self.finance, self.agronomy, self.market, self.policy, self.risk]
            .iter()
            .filter(|flag| **flag)
            .count()
    }
}

pub struct Orchestrator {
    finance: Arc<FinanceAdvisor>,
    agronomy: Arc<AgronomyAdvisor>,
    market: Arc<MarketAdvisor>,
    policy: Arc<PolicyAdvisor>,
    risk: Arc<RiskAdvisor>,
    fallback: LlmFallback,
    context_store: Arc<dyn ContextStore>,
    sink: Arc<dyn ConversationSink>,
    #[cfg(test)]
    overrides: std::collections::HashMap<AdvisorKind, Arc<dyn Advisor>>,
}

impl Orchestrator {
    pub fn new(
        fallback: LlmFallback,
        context_store: Arc<dyn ContextStore>,
        sink: Arc<dyn ConversationSink>,
    ) -> Self {
        Self {
            finance: Arc::new(FinanceAdvisor::new()),
            agronomy: Arc::new(AgronomyAdvisor::new()),
            market: Arc::new(MarketAdvisor::new()),
            policy: Arc::new(PolicyAdvisor::new()),
            risk: Arc::new(RiskAdvisor::new()),
            fallback,
            context_store,
            sink,
            #[cfg(test)]
            overrides: std::collections::HashMap::new(),
        }
    }

    /// Swap a single advisor out for a test double.
    #[cfg(test)]
    fn override_advisor(&mut self, kind: AdvisorKind, advisor: Arc<dyn Advisor>) {
        self.overrides.insert(kind, advisor);
    }

    fn advisor(&self, kind: AdvisorKind) -> Arc<dyn Advisor> {
        #[cfg(test)]
        if let Some(advisor) = self.overrides.get(&kind) {
            return advisor.clone();
        }

        match kind {
            AdvisorKind::Finance => self.finance.clone(),
            AdvisorKind::Agronomy => self.agronomy.clone(),
            AdvisorKind::Market => self.market.clone(),
            AdvisorKind::Policy => self.policy.clone(),
            AdvisorKind::Risk => self.risk.clone(),
        }
    }

    /// Load every advisor's reference table. The first failure aborts;
    /// serving queries with a partially-initialized roster is worse than
    /// not starting.
    pub async fn initialize(&self) -> Result<()> {
        info!("initializing advisors");

        tokio::try_join!(
            self.finance.initialize(),
            self.agronomy.initialize(),
            self.market.initialize(),
            self.policy.initialize(),
            self.risk.initialize(),
        )?;

        info!("all advisors initialized");
        Ok(())
    }

    pub fn agent_status(&self) -> AgentStatus {
        AgentStatus {
            finance: self.finance.is_initialized(),
            agronomy: self.agronomy.is_initialized(),
            market: self.market.is_initialized(),
            policy: self.policy.is_initialized(),
            risk: self.risk.is_initialized(),
        }
    }

    /// Process one conversational turn. Always produces a payload.
    pub async fn process_query(
        &self,
        query: &str,
        user_id: &str,
        language_code: &str,
    ) -> SynthesizedResponse {
        let language = Language::from_code(language_code);

        let response = if IntentClassifier::is_comprehensive(query) {
            let ctx = self.context_store.context_for(user_id).await;
            let intent = IntentClassifier::classify(query);
            info!(
                user_id,
                primary = %intent.primary,
                advisors = intent.involved.len(),
                "running advisor pipeline"
            );
            match self
                .run_advisors(query, &ctx, &intent, language, language_code)
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    // Last-resort catch: the chat surface never sees a raw
                    // error, it gets the fixed localized payload instead.
                    warn!(user_id, %error, "advisor pipeline failed, returning error payload");
                    SynthesizedResponse::error_payload(language, language_code)
                }
            }
        } else {
            info!(user_id, "routing to conversational fallback");
            self.fallback
                .respond(query, user_id, language, language_code)
                .await
        };

        let turn = ConversationTurn {
            user_id: user_id.to_string(),
            query: query.to_string(),
            response: response.text.clone(),
            language: language_code.to_string(),
            agents_used: response
                .agents_used
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
            confidence: response.confidence,
        };
        if let Err(error) = self.sink.record(turn).await {
            warn!(user_id, %error, "failed to record conversation turn");
        }

        response
    }

    /// Concurrent fan-out over the involved advisors. One advisor failing
    /// substitutes a localized apology for its section; the turn completes
    /// with the rest.
    async fn run_advisors(
        &self,
        query: &str,
        ctx: &UserContext,
        intent: &IntentAnalysis,
        language: Language,
        language_code: &str,
    ) -> Result<SynthesizedResponse> {
        if intent.involved.is_empty() {
            // The classifier guarantees a non-empty roster; an empty one
            // means the gate and the classifier disagree.
            return Err(crate::error::AdvisoryError::OrchestrationError(
                "no advisors selected for a comprehensive query".to_string(),
            ));
        }

        let mut handles = Vec::with_capacity(intent.involved.len());
        for kind in &intent.involved {
            let advisor = self.advisor(*kind);
            let query = query.to_string();
            let ctx = ctx.clone();
            let kind = *kind;
            // Advisors are in-memory table lookups, so no per-advisor
            // timeout is applied at this fan-out.
            handles.push((
                kind,
                tokio::spawn(async move { advisor.process(&query, &ctx, language).await }),
            ));
        }

        let mut sections = Vec::with_capacity(handles.len());
        for (kind, handle) in handles {
            let text = match handle.await {
                Ok(Ok(text)) => text,
                Ok(Err(error)) => {
                    warn!(advisor = %kind, %error, "advisor failed, substituting apology");
                    apology_for(kind, language)
                }
                Err(join_error) => {
                    warn!(advisor = %kind, %join_error, "advisor task panicked");
                    apology_for(kind, language)
                }
            };
            sections.push((kind, text));
        }

        let text = synthesis::synthesize(&sections, language);
        let agents_used: Vec<AdvisorKind> = sections.iter().map(|(kind, _)| *kind).collect();
        let suggestions = suggestions_for(&agents_used, language);

        Ok(SynthesizedResponse {
            // The advisor path speaks the merged text as a single chunk;
            // chunking is only applied to conversational fallback answers.
            voice_ready: vec![text.clone()],
            text,
            language: language_code.to_string(),
            intent: intent.primary.clone(),
            confidence: intent.confidence,
            agents_used,
            suggestions,
        })
    }

    //
    // ================= Direct Lookups =================
    //

    pub async fn debt_forecast(&self, user_id: &str) -> Result<DebtForecast> {
        let ctx = self.context_store.context_for(user_id).await;
        Ok(FinanceAdvisor::compute_debt_forecast(&ctx))
    }

    pub async fn crop_recommendations(
        &self,
        user_id: &str,
        season: &str,
    ) -> Result<Vec<CropRecommendation>> {
        let ctx = self.context_store.context_for(user_id).await;
        self.agronomy
            .recommendations_for(&ctx, season)
            .map_err(|e| crate::error::AdvisoryError::OrchestrationError(e.to_string()))
    }

    pub fn market_insights(&self, crop_name: &str, location: &str) -> Result<MarketInsights> {
        self.market
            .market_insights(crop_name, location)
            .map_err(|e| crate::error::AdvisoryError::OrchestrationError(e.to_string()))
    }
}

fn apology_for(kind: AdvisorKind, language: Language) -> String {
    match language {
        Language::Hindi => format!("माफ़ करें, {} सलाहकार अभी उपलब्ध नहीं है।", kind.as_str()),
        Language::English => {
            format!("Sorry, {} advisor is temporarily unavailable.", kind.as_str())
        }
    }
}

fn suggestions_for(agents_used: &[AdvisorKind], language: Language) -> Vec<String> {
    let hindi = language == Language::Hindi;
    let mut suggestions = Vec::new();

    for kind in agents_used {
        let suggestion = match kind {
            AdvisorKind::Finance => {
                if hindi {
                    "अपने कर्ज का विस्तृत विश्लेषण देखें"
                } else {
                    "View detailed loan analysis"
                }
            }
            AdvisorKind::Agronomy => {
                if hindi {
                    "फसल की देखभाल के टिप्स जानें"
                } else {
                    "Get crop care tips"
                }
            }
            AdvisorKind::Market => {
                if hindi {
                    "मंडी के भाव और बिक्री की सलाह लें"
                } else {
                    "Get market prices and selling advice"
                }
            }
            AdvisorKind::Policy => {
                if hindi {
                    "सरकारी योजनाओं की जानकारी लें"
                } else {
                    "Get government scheme information"
                }
            }
            AdvisorKind::Risk => {
                if hindi {
                    "जोखिम प्रबंधन की रणनीतियां जानें"
                } else {
                    "Learn risk management strategies"
                }
            }
        };
        suggestions.push(suggestion.to_string());
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::StaticContextStore;
    use crate::db::MemoryConversationSink;
    use crate::error::{AdvisorError, AdvisoryError};

    /// Always-failing advisor standing in for an unhealthy roster slot.
    struct FailingAdvisor {
        kind: AdvisorKind,
    }

    #[async_trait::async_trait]
    impl Advisor for FailingAdvisor {
        fn kind(&self) -> AdvisorKind {
            self.kind
        }

        fn is_initialized(&self) -> bool {
            true
        }

        async fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn process(
            &self,
            _query: &str,
            _ctx: &UserContext,
            _language: Language,
        ) -> std::result::Result<String, AdvisorError> {
            Err(AdvisorError::Internal {
                kind: self.kind,
                detail: "reference table unavailable".to_string(),
            })
        }
    }

    fn test_settings() -> Settings {
        Settings {
            // Empty key keeps the fallback deterministic: no network call,
            // fixed apology payload.
            openai_api_key: String::new(),
            openai_model: "gpt-4".to_string(),
            database_url: String::new(),
            port: 8000,
            default_language: "hi".to_string(),
        }
    }

    fn build_orchestrator() -> (Orchestrator, Arc<MemoryConversationSink>) {
        let sink = Arc::new(MemoryConversationSink::new());
        let orchestrator = Orchestrator::new(
            LlmFallback::new(&test_settings()),
            Arc::new(StaticContextStore::new()),
            sink.clone(),
        );
        (orchestrator, sink)
    }

    #[tokio::test]
    async fn test_initialize_marks_all_advisors_ready() {
        let (orchestrator, _) = build_orchestrator();
        assert!(!orchestrator.agent_status().all_healthy());

        orchestrator.initialize().await.unwrap();

        let status = orchestrator.agent_status();
        assert!(status.all_healthy());
        assert_eq!(status.active_count(), 5);
    }

    #[tokio::test]
    async fn test_comprehensive_query_runs_advisor_pipeline() {
        let (orchestrator, sink) = build_orchestrator();
        orchestrator.initialize().await.unwrap();

        let response = orchestrator
            .process_query("loan chahiye aur mandi bhav batao", "farmer-1", "en")
            .await;

        assert_eq!(
            response.agents_used,
            vec![AdvisorKind::Finance, AdvisorKind::Market]
        );
        assert_eq!(response.intent, "finance");
        assert_eq!(response.confidence, 0.8);
        assert_eq!(response.suggestions.len(), 2);
        // Multi-advisor turns speak the merged text as one chunk
        assert_eq!(response.voice_ready, vec![response.text.clone()]);
        assert_eq!(sink.len().await, 1);
    }

    #[tokio::test]
    async fn test_simple_query_routes_to_fallback() {
        let (orchestrator, sink) = build_orchestrator();
        orchestrator.initialize().await.unwrap();

        let response = orchestrator
            .process_query("hello, who are you?", "farmer-1", "en")
            .await;

        // No key configured: fallback apology with confidence 0.0
        assert!(response.agents_used.is_empty());
        assert_eq!(response.confidence, 0.0);
        assert_eq!(response.intent, "error");
        assert_eq!(sink.len().await, 1);
        let turn = sink.last().await.unwrap();
        assert!(turn.agents_used.is_empty());
    }

    #[tokio::test]
    async fn test_uninitialized_advisor_gets_apology_not_failure() {
        // Deliberately skip initialize(): every advisor errors, and every
        // section becomes an apology, but the turn still answers.
        let (orchestrator, _) = build_orchestrator();

        let response = orchestrator
            .process_query("loan aur fasal ki salah do", "farmer-1", "en")
            .await;

        assert_eq!(
            response.agents_used,
            vec![AdvisorKind::Finance, AdvisorKind::Agronomy]
        );
        assert!(response.text.contains("temporarily unavailable"));
        assert_eq!(response.confidence, 0.8);
    }

    #[tokio::test]
    async fn test_one_failed_advisor_keeps_other_sections() {
        let (mut orchestrator, _) = build_orchestrator();
        orchestrator.initialize().await.unwrap();
        orchestrator.override_advisor(
            AdvisorKind::Agronomy,
            Arc::new(FailingAdvisor {
                kind: AdvisorKind::Agronomy,
            }),
        );

        let response = orchestrator
            .process_query("loan, crop aur mandi price batao", "farmer-1", "en")
            .await;

        assert_eq!(
            response.agents_used,
            vec![AdvisorKind::Finance, AdvisorKind::Agronomy, AdvisorKind::Market]
        );
        // The failed advisor's slot carries the apology
        assert!(response
            .text
            .contains("Sorry, agronomy advisor is temporarily unavailable."));
        // while the healthy advisors still render real sections
        assert!(response.text.contains("💰"));
        assert!(response.text.contains("📊"));
        assert!(!response.text.contains("finance advisor is temporarily unavailable"));
        assert_eq!(response.suggestions.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_advisor_roster_is_an_error() {
        let (orchestrator, _) = build_orchestrator();
        orchestrator.initialize().await.unwrap();

        let intent = IntentAnalysis {
            involved: vec![],
            primary: "general".to_string(),
            confidence: 0.8,
        };
        let ctx = crate::context::default_context("farmer-1");
        let result = orchestrator
            .run_advisors("anything", &ctx, &intent, Language::English, "en")
            .await;

        assert!(matches!(result, Err(AdvisoryError::OrchestrationError(_))));
    }

    #[tokio::test]
    async fn test_hindi_apology_substitution() {
        let (orchestrator, _) = build_orchestrator();

        let response = orchestrator
            .process_query("karz ki jankari", "farmer-1", "hi")
            .await;

        assert!(response.text.contains("उपलब्ध नहीं"));
        assert_eq!(response.language, "hi");
    }

    #[tokio::test]
    async fn test_debt_forecast_uses_context() {
        let (orchestrator, _) = build_orchestrator();
        orchestrator.initialize().await.unwrap();

        let forecast = orchestrator.debt_forecast("farmer-1").await.unwrap();
        // Static context: 35,000 remaining at the 3,500/month floor
        assert_eq!(forecast.current_debt, 35_000.0);
        assert_eq!(forecast.monthly_payment, 3_500.0);
        assert_eq!(forecast.months_to_freedom, 10.0);
    }

    #[tokio::test]
    async fn test_crop_recommendations_direct_lookup() {
        let (orchestrator, _) = build_orchestrator();
        orchestrator.initialize().await.unwrap();

        let recommendations = orchestrator
            .crop_recommendations("farmer-1", "rabi")
            .await
            .unwrap();
        assert!(!recommendations.is_empty());
        assert!(recommendations.len() <= 3);
    }

    #[tokio::test]
    async fn test_market_insights_direct_lookup() {
        let (orchestrator, _) = build_orchestrator();
        orchestrator.initialize().await.unwrap();

        let insights = orchestrator.market_insights("wheat", "Punjab").unwrap();
        assert_eq!(insights.crop, "wheat");
        assert!(!insights.best_mandi.is_empty());
    }
}
