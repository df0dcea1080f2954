//! Deterministic merge of advisor outputs into one message.
//!
//! No LLM involvement: a single advisor answer passes through verbatim,
//! multiple answers get a localized preamble and fixed emoji headings in
//! advisor order. Same inputs, same output.

use crate::models::{AdvisorKind, Language};

/// Greeting used when a turn produced no advisor text at all.
pub fn default_response(language: Language) -> &'static str {
    match language {
        Language::Hindi => {
            "नमस्कार! मैं आपकी कृषि और वित्तीय सलाह के लिए यहाँ हूँ। कृपया अपना सवाल पूछें।"
        }
        Language::English => {
            "Hello! I'm here to help with your agriculture and financial advice. Please ask your question."
        }
    }
}

fn heading(kind: AdvisorKind, language: Language) -> &'static str {
    match (kind, language) {
        (AdvisorKind::Finance, Language::Hindi) => "💰 वित्तीय सलाह",
        (AdvisorKind::Agronomy, Language::Hindi) => "🌱 कृषि सलाह",
        (AdvisorKind::Market, Language::Hindi) => "📊 बाजार की जानकारी",
        (AdvisorKind::Policy, Language::Hindi) => "🏛️ सरकारी योजनाएं",
        (AdvisorKind::Risk, Language::Hindi) => "⚠️ जोखिम चेतावनी",
        (AdvisorKind::Finance, Language::English) => "💰 Financial Advice",
        (AdvisorKind::Agronomy, Language::English) => "🌱 Crop Advice",
        (AdvisorKind::Market, Language::English) => "📊 Market Information",
        (AdvisorKind::Policy, Language::English) => "🏛️ Government Schemes",
        (AdvisorKind::Risk, Language::English) => "⚠️ Risk Alerts",
    }
}

fn preamble(language: Language) -> &'static str {
    match language {
        Language::Hindi => "🌾 आपके सवाल के लिए मेरी सलाह:",
        Language::English => "🌾 My advice for your question:",
    }
}

/// Merge ordered `(advisor, text)` pairs into the final response text.
///
/// Caller supplies the pairs already in advisor declaration order; this
/// function never reorders them.
pub fn synthesize(responses: &[(AdvisorKind, String)], language: Language) -> String {
    match responses {
        [] => default_response(language).to_string(),
        [(_, only)] => only.clone(),
        many => {
            let mut combined = format!("{}\n\n", preamble(language));
            for (kind, text) in many {
                combined.push_str(heading(*kind, language));
                combined.push_str(":\n");
                combined.push_str(text);
                combined.push_str("\n\n");
            }
            combined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_gives_default_greeting() {
        let out = synthesize(&[], Language::English);
        assert!(out.starts_with("Hello!"));
    }

    #[test]
    fn test_single_response_is_verbatim() {
        let input = vec![(AdvisorKind::Finance, "pay off the 12% loan first".to_string())];
        assert_eq!(synthesize(&input, Language::Hindi), "pay off the 12% loan first");
    }

    #[test]
    fn test_multi_response_order_and_headings() {
        let input = vec![
            (AdvisorKind::Finance, "loan advice".to_string()),
            (AdvisorKind::Market, "price advice".to_string()),
        ];
        let out = synthesize(&input, Language::English);
        assert!(out.starts_with("🌾 My advice for your question:"));
        let finance_pos = out.find("💰 Financial Advice:\nloan advice");
        let market_pos = out.find("📊 Market Information:\nprice advice");
        assert!(finance_pos.is_some());
        assert!(market_pos.is_some());
        assert!(finance_pos < market_pos);
    }

    #[test]
    fn test_multi_response_is_deterministic() {
        let input = vec![
            (AdvisorKind::Agronomy, "sow wheat".to_string()),
            (AdvisorKind::Risk, "rain expected".to_string()),
        ];
        let a = synthesize(&input, Language::Hindi);
        let b = synthesize(&input, Language::Hindi);
        assert_eq!(a, b);
        assert!(a.starts_with("🌾 आपके सवाल के लिए मेरी सलाह:"));
    }
}
