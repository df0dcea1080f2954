//! LLM fallback for non-comprehensive queries
//!
//! Queries that fail the comprehensive gate skip the advisor pipeline and go
//! straight to an OpenAI chat completion under the KrishiMitra persona. This
//! service never returns an error to the orchestrator: a missing key, network
//! failure, or malformed response all collapse into a fixed localized apology
//! payload with confidence 0.0.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Settings;
use crate::models::{Language, SynthesizedResponse};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Per-user history cap; only the trailing half is sent with each request.
const HISTORY_LIMIT: usize = 20;
const HISTORY_SENT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct LlmFallback {
    client: Client,
    api_key: String,
    model: String,
    histories: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl LlmFallback {
    pub fn new(settings: &Settings) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: settings.openai_api_key.clone(),
            model: settings.openai_model.clone(),
            histories: RwLock::new(HashMap::new()),
        }
    }

    fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty() && self.api_key != "your-actual-openai-api-key-here"
    }

    /// Answer a simple query conversationally. Always produces a payload.
    pub async fn respond(
        &self,
        query: &str,
        user_id: &str,
        language: Language,
        language_code: &str,
    ) -> SynthesizedResponse {
        if !self.has_api_key() {
            warn!("OpenAI API key not configured, returning fallback response");
            return Self::unavailable_response(language, language_code);
        }

        match self.complete(query, user_id, language).await {
            Ok(answer) => {
                self.record_turn(user_id, query, &answer).await;

                SynthesizedResponse {
                    voice_ready: chunk_for_voice(&answer),
                    text: answer,
                    language: language_code.to_string(),
                    intent: detect_intent(query).to_string(),
                    confidence: 0.95,
                    agents_used: vec![],
                    suggestions: suggestions_for(language),
                }
            }
            Err(error) => {
                warn!(%error, "OpenAI chat completion failed");
                Self::unavailable_response(language, language_code)
            }
        }
    }

    async fn complete(
        &self,
        query: &str,
        user_id: &str,
        language: Language,
    ) -> crate::Result<String> {
        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: system_prompt(language).to_string(),
        }];

        {
            let histories = self.histories.read().await;
            if let Some(history) = histories.get(user_id) {
                let start = history.len().saturating_sub(HISTORY_SENT);
                messages.extend(history[start..].iter().cloned());
            }
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: query.to_string(),
        });

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: 500,
            temperature: 0.7,
            presence_penalty: 0.1,
            frequency_penalty: 0.1,
        };

        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(crate::error::AdvisoryError::LlmError(format!(
                "OpenAI returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                crate::error::AdvisoryError::LlmError("OpenAI returned no choices".to_string())
            })?;

        info!(user_id, "conversational response from OpenAI");
        Ok(answer)
    }

    async fn record_turn(&self, user_id: &str, query: &str, answer: &str) {
        let mut histories = self.histories.write().await;
        let history = histories.entry(user_id.to_string()).or_default();
        history.push(ChatMessage {
            role: "user".to_string(),
            content: query.to_string(),
        });
        history.push(ChatMessage {
            role: "assistant".to_string(),
            content: answer.to_string(),
        });
        if history.len() > HISTORY_LIMIT {
            let excess = history.len() - HISTORY_LIMIT;
            history.drain(..excess);
        }
    }

    fn unavailable_response(language: Language, language_code: &str) -> SynthesizedResponse {
        let (text, voice_ready) = match language {
            Language::Hindi => (
                "माफ़ करें, अभी मैं आपकी मदद नहीं कर पा रहा हूं। कृपया कुछ देर बाद फिर से कोशिश करें।".to_string(),
                vec![
                    "माफ़ करें, अभी मैं आपकी मदद नहीं कर पा रहा हूं।".to_string(),
                    "कृपया कुछ देर बाद फिर से कोशिश करें।".to_string(),
                ],
            ),
            Language::English => (
                "Sorry, I'm unable to help you right now. Please try again later.".to_string(),
                vec![
                    "Sorry, I'm unable to help you right now.".to_string(),
                    "Please try again later.".to_string(),
                ],
            ),
        };

        SynthesizedResponse {
            text,
            language: language_code.to_string(),
            intent: "error".to_string(),
            confidence: 0.0,
            agents_used: vec![],
            voice_ready,
            suggestions: vec![],
        }
    }

    #[cfg(test)]
    async fn history_len(&self, user_id: &str) -> usize {
        self.histories
            .read()
            .await
            .get(user_id)
            .map(|h| h.len())
            .unwrap_or(0)
    }
}

fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::Hindi => {
            "आप KrishiMitra हैं - भारतीय किसानों के लिए एक AI सहायक। आपकी विशेषताएं:\n\n\
             1. **वॉइस-फर्स्ट**: आपका प्राथमिक लक्ष्य बोलकर जवाब देना है\n\
             2. **किसान-केंद्रित**: सरल, व्यावहारिक सलाह दें\n\
             3. **बहुभाषी**: हिंदी में प्राथमिक रूप से बात करें\n\
             4. **विशेषज्ञता**: फसल, ऋण, मंडी, मौसम, सरकारी योजनाएं\n\n\
             हमेशा वॉइस के लिए अनुकूलित जवाब दें - छोटे वाक्य, स्पष्ट उच्चारण, और बोलने में आसान।"
        }
        Language::English => {
            "You are KrishiMitra - an AI assistant for Indian farmers. Your characteristics:\n\n\
             1. **Voice-First**: Your primary goal is to respond by speaking\n\
             2. **Farmer-Centric**: Give simple, practical advice\n\
             3. **Multilingual**: Primarily speak in Hindi, but can use English when needed\n\
             4. **Expertise**: Crops, loans, markets, weather, government schemes\n\n\
             Always give voice-optimized responses - short sentences, clear pronunciation, and easy to speak."
        }
    }
}

/// Split a response into speakable chunks: sentence boundaries first, then
/// clause boundaries for anything longer than 100 characters.
pub fn chunk_for_voice(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    for sentence in text.split(". ") {
        if sentence.len() > 100 {
            chunks.extend(sentence.split(", ").map(|s| s.to_string()));
        } else {
            chunks.push(sentence.to_string());
        }
    }
    chunks
}

/// Lightweight intent label for the metadata field. Independent of the
/// advisor classifier; mixes Devanagari and transliterated keywords.
fn detect_intent(query: &str) -> &'static str {
    let q = query.to_lowercase();
    let matches = |words: &[&str]| words.iter().any(|w| q.contains(w));

    if matches(&["फसल", "बीज", "खाद", "कीट", "crop", "seed", "fertilizer"]) {
        "crop_advice"
    } else if matches(&["ऋण", "कर्ज", "पैसा", "loan", "money", "credit"]) {
        "loan_help"
    } else if matches(&["मंडी", "भाव", "बिक्री", "market", "price", "sell"]) {
        "market_info"
    } else if matches(&["मौसम", "बारिश", "weather", "rain"]) {
        "weather"
    } else if matches(&["सरकार", "योजना", "सब्सिडी", "government", "scheme"]) {
        "government"
    } else {
        "general_inquiry"
    }
}

fn suggestions_for(language: Language) -> Vec<String> {
    match language {
        Language::Hindi => vec![
            "अपनी फसल के बारे में और जानें".to_string(),
            "मंडी भाव की जानकारी लें".to_string(),
            "सरकारी योजनाओं के बारे में पूछें".to_string(),
            "मौसम की जानकारी लें".to_string(),
        ],
        Language::English => vec![
            "Learn more about your crops".to_string(),
            "Get market price information".to_string(),
            "Ask about government schemes".to_string(),
            "Get weather information".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings(api_key: &str) -> Settings {
        Settings {
            openai_api_key: api_key.to_string(),
            openai_model: "gpt-4".to_string(),
            database_url: String::new(),
            port: 8000,
            default_language: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_key_returns_apology_not_error() {
        let fallback = LlmFallback::new(&test_settings(""));
        let response = fallback
            .respond("hello there", "user-1", Language::English, "en")
            .await;
        assert_eq!(response.intent, "error");
        assert_eq!(response.confidence, 0.0);
        assert!(response.text.contains("unable to help"));
        assert!(response.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_key_treated_as_missing() {
        let fallback = LlmFallback::new(&test_settings("your-actual-openai-api-key-here"));
        let response = fallback
            .respond("namaste", "user-1", Language::Hindi, "hi")
            .await;
        assert_eq!(response.confidence, 0.0);
        assert!(response.text.contains("माफ़ करें"));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let fallback = LlmFallback::new(&test_settings("sk-test"));
        for i in 0..30 {
            fallback
                .record_turn("user-1", &format!("q{}", i), &format!("a{}", i))
                .await;
        }
        assert_eq!(fallback.history_len("user-1").await, HISTORY_LIMIT);
    }

    #[test]
    fn test_chunk_short_sentences_pass_through() {
        let chunks = chunk_for_voice("Sow wheat in November. Water it weekly.");
        assert_eq!(chunks, vec!["Sow wheat in November", "Water it weekly."]);
    }

    #[test]
    fn test_chunk_long_sentence_splits_on_clauses() {
        let long = format!(
            "{}, {}, {}",
            "a".repeat(50),
            "b".repeat(40),
            "c".repeat(30)
        );
        let chunks = chunk_for_voice(&long);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_detect_intent_devanagari_and_english() {
        assert_eq!(detect_intent("मेरी फसल खराब है"), "crop_advice");
        assert_eq!(detect_intent("need a loan"), "loan_help");
        assert_eq!(detect_intent("मौसम कैसा रहेगा"), "weather");
        assert_eq!(detect_intent("tell me a story"), "general_inquiry");
    }
}
