//! Intent classification
//!
//! Two independent keyword gates drive a turn:
//! - `classify` picks WHICH advisors participate (per-advisor keyword lists,
//!   all matches kept in declaration order)
//! - `is_comprehensive` decides WHETHER the advisor pipeline runs at all;
//!   a query that fails this gate goes straight to the LLM fallback even if
//!   it matched advisor keywords.

use crate::models::{AdvisorKind, IntentAnalysis};

/// Static keyword lists, zero allocation
const FINANCE_KEYWORDS: &[&str] = &[
    "loan", "debt", "payment", "money", "credit", "karz", "udhar", "qarz",
];

const AGRONOMY_KEYWORDS: &[&str] = &[
    "crop", "seed", "fertilizer", "pest", "soil", "fasal", "beej", "khad",
];

const MARKET_KEYWORDS: &[&str] = &[
    "price", "mandi", "sell", "buy", "rate", "bhav", "bikri",
];

const POLICY_KEYWORDS: &[&str] = &[
    "subsidy", "scheme", "government", "yojana", "sarkar",
];

const RISK_KEYWORDS: &[&str] = &[
    "weather", "rain", "drought", "flood", "mausam", "baarish",
];

/// Comprehensive-query gate list. Independent of the per-advisor lists above:
/// English + transliterated Hindi terms spanning all five domains.
const COMPREHENSIVE_KEYWORDS: &[&str] = &[
    "loan", "crop", "revenue", "repay", "agronomy", "market", "policy", "risk",
    "karz", "fasal", "kamai", "kisht", "kheti", "mandi", "yojana", "khatra",
];

/// Confidence is a policy constant, not a score: keyword matching gives no
/// graded signal.
const INTENT_CONFIDENCE: f32 = 0.8;

fn keywords_for(kind: AdvisorKind) -> &'static [&'static str] {
    match kind {
        AdvisorKind::Finance => FINANCE_KEYWORDS,
        AdvisorKind::Agronomy => AGRONOMY_KEYWORDS,
        AdvisorKind::Market => MARKET_KEYWORDS,
        AdvisorKind::Policy => POLICY_KEYWORDS,
        AdvisorKind::Risk => RISK_KEYWORDS,
    }
}

pub struct IntentClassifier;

impl IntentClassifier {
    /// Map a raw query to the set of involved advisors.
    ///
    /// Multiple advisors can match simultaneously; declaration order is
    /// preserved. Zero matches fall back to the breadth-over-precision trio
    /// finance+agronomy+market.
    pub fn classify(query: &str) -> IntentAnalysis {
        let query_lower = query.to_lowercase();

        let mut involved: Vec<AdvisorKind> = AdvisorKind::ALL
            .iter()
            .copied()
            .filter(|kind| {
                keywords_for(*kind)
                    .iter()
                    .any(|kw| query_lower.contains(kw))
            })
            .collect();

        if involved.is_empty() {
            involved = vec![
                AdvisorKind::Finance,
                AdvisorKind::Agronomy,
                AdvisorKind::Market,
            ];
        }

        let primary = involved
            .first()
            .map(|kind| kind.as_str().to_string())
            .unwrap_or_else(|| "general".to_string());

        IntentAnalysis {
            involved,
            confidence: INTENT_CONFIDENCE,
            primary,
        }
    }

    /// Whether the query warrants the multi-advisor pipeline at all.
    pub fn is_comprehensive(query: &str) -> bool {
        let query_lower = query.to_lowercase();
        COMPREHENSIVE_KEYWORDS
            .iter()
            .any(|kw| query_lower.contains(kw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_domain_query() {
        let analysis = IntentClassifier::classify("I need a loan for my tractor");
        assert_eq!(analysis.involved, vec![AdvisorKind::Finance]);
        assert_eq!(analysis.primary, "finance");
        assert_eq!(analysis.confidence, 0.8);
    }

    #[test]
    fn test_multi_domain_query_preserves_declaration_order() {
        // mandi (market) appears before karz (finance) in the text, but
        // declaration order wins
        let analysis = IntentClassifier::classify("mandi bhav aur karz ki jankari");
        assert_eq!(
            analysis.involved,
            vec![AdvisorKind::Finance, AdvisorKind::Market]
        );
        assert_eq!(analysis.primary, "finance");
    }

    #[test]
    fn test_hindi_transliterated_keywords() {
        let analysis = IntentClassifier::classify("meri fasal ke liye khad chahiye");
        assert_eq!(analysis.involved, vec![AdvisorKind::Agronomy]);
    }

    #[test]
    fn test_no_keyword_fallback_trio() {
        let analysis = IntentClassifier::classify("namaste, aap kaise ho");
        assert_eq!(
            analysis.involved,
            vec![
                AdvisorKind::Finance,
                AdvisorKind::Agronomy,
                AdvisorKind::Market
            ]
        );
        assert_eq!(analysis.primary, "finance");
    }

    #[test]
    fn test_all_five_advisors_can_fire_together() {
        let analysis = IntentClassifier::classify(
            "loan, crop, mandi price, sarkari yojana aur weather sab batao",
        );
        assert_eq!(analysis.involved, AdvisorKind::ALL.to_vec());
    }

    #[test]
    fn test_comprehensive_gate_positive() {
        assert!(IntentClassifier::is_comprehensive("kheti me kamai kaise badhe"));
        assert!(IntentClassifier::is_comprehensive("how do I repay my loan"));
    }

    #[test]
    fn test_gate_independent_of_classifier() {
        // "udhar" and "payment" are finance classifier keywords but not in
        // the comprehensive list: the classifier fires, the gate does not.
        let query = "udhar ka payment";
        assert_eq!(
            IntentClassifier::classify(query).involved,
            vec![AdvisorKind::Finance]
        );
        assert!(!IntentClassifier::is_comprehensive(query));
    }

    #[test]
    fn test_gate_negative_for_smalltalk() {
        assert!(!IntentClassifier::is_comprehensive("hello, who are you?"));
    }
}
