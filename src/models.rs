//! Core data models for the advisory pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Language =================
//

/// Response language. The service renders Hindi and English; any other
/// requested code is echoed back verbatim in the payload but rendered in
/// English.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Hindi,
    English,
}

impl Language {
    pub fn from_code(code: &str) -> Self {
        match code.to_lowercase().as_str() {
            "hi" => Language::Hindi,
            _ => Language::English,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Hindi => "hi",
            Language::English => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

//
// ================= Advisors =================
//

/// The closed set of domain advisors. Dispatch over this enum replaces the
/// stringly-typed registry lookup: the classifier can only ever name one of
/// these five, and a `match` over them is exhaustively checked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AdvisorKind {
    Finance,
    Agronomy,
    Market,
    Policy,
    Risk,
}

impl AdvisorKind {
    /// Declaration order. Classifier output and synthesis headings both
    /// follow this order.
    pub const ALL: [AdvisorKind; 5] = [
        AdvisorKind::Finance,
        AdvisorKind::Agronomy,
        AdvisorKind::Market,
        AdvisorKind::Policy,
        AdvisorKind::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisorKind::Finance => "finance",
            AdvisorKind::Agronomy => "agronomy",
            AdvisorKind::Market => "market",
            AdvisorKind::Policy => "policy",
            AdvisorKind::Risk => "risk",
        }
    }
}

impl fmt::Display for AdvisorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ================= User Context =================
//

/// A single outstanding loan as seen by the advisors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanAccount {
    pub amount: f64,
    pub interest_rate: f64,
    pub remaining: f64,
    #[serde(default)]
    pub loan_type: Option<String>,
}

/// A crop the farmer currently has in the ground.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropHolding {
    pub name: String,
    pub area: f64,
    pub stage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilHealth {
    pub ph: f64,
    #[serde(default = "default_soil_type")]
    pub soil_type: String,
    #[serde(default)]
    pub nitrogen: Option<String>,
}

fn default_soil_type() -> String {
    "loamy".to_string()
}

/// Read-only snapshot of a farmer's profile consumed by advisors.
/// Fetched per request from a [`crate::context::ContextStore`]; never
/// mutated inside the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub location: String,
    pub land_area: f64,
    pub current_loans: Vec<LoanAccount>,
    pub current_crops: Vec<CropHolding>,
    pub soil_health: SoilHealth,
    pub language: String,
}

//
// ================= Intent =================
//

/// Output of the intent classifier. `involved` preserves advisor declaration
/// order and is never empty (falls back to finance+agronomy+market).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub involved: Vec<AdvisorKind>,
    pub confidence: f32,
    pub primary: String,
}

//
// ================= Response =================
//

/// Terminal output of one conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedResponse {
    pub text: String,
    pub language: String,
    pub intent: String,
    pub confidence: f32,
    pub agents_used: Vec<AdvisorKind>,
    pub voice_ready: Vec<String>,
    pub suggestions: Vec<String>,
}

impl SynthesizedResponse {
    /// Fixed localized error payload. The chat surface always answers;
    /// internal failures become this instead of a 5xx.
    pub fn error_payload(language: Language, language_code: &str) -> Self {
        let (text, voice_ready) = match language {
            Language::Hindi => (
                "माफ़ करें, अभी कुछ तकनीकी समस्या है। कृपया कुछ देर बाद फिर से कोशिश करें।".to_string(),
                vec![
                    "माफ़ करें, अभी कुछ तकनीकी समस्या है।".to_string(),
                    "कृपया कुछ देर बाद फिर से कोशिश करें।".to_string(),
                ],
            ),
            Language::English => (
                "Sorry, there's a technical issue right now. Please try again later.".to_string(),
                vec![
                    "Sorry, there's a technical issue right now.".to_string(),
                    "Please try again later.".to_string(),
                ],
            ),
        };

        Self {
            text,
            language: language_code.to_string(),
            intent: "error".to_string(),
            confidence: 0.0,
            agents_used: vec![],
            voice_ready,
            suggestions: vec![],
        }
    }
}

/// Format a rupee amount with thousands separators. Western 3-digit grouping,
/// not the Indian lakh/crore grouping.
pub fn format_inr(amount: f64) -> String {
    let whole = amount.round() as i64;
    let negative = whole < 0;
    let digits = whole.abs().to_string();

    let mut grouped = String::new();
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let body: String = grouped.chars().rev().collect();

    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!(Language::from_code("hi"), Language::Hindi);
        assert_eq!(Language::from_code("HI"), Language::Hindi);
        assert_eq!(Language::from_code("en"), Language::English);
        // Unknown codes render in English
        assert_eq!(Language::from_code("bn"), Language::English);
    }

    #[test]
    fn test_format_inr() {
        assert_eq!(format_inr(0.0), "0");
        assert_eq!(format_inr(500.0), "500");
        assert_eq!(format_inr(35000.0), "35,000");
        assert_eq!(format_inr(300000.0), "300,000");
        assert_eq!(format_inr(1400000.0), "1,400,000");
    }

    #[test]
    fn test_error_payload_shape() {
        let payload = SynthesizedResponse::error_payload(Language::Hindi, "hi");
        assert_eq!(payload.intent, "error");
        assert_eq!(payload.confidence, 0.0);
        assert!(payload.suggestions.is_empty());
        assert_eq!(payload.voice_ready.len(), 2);
    }
}
