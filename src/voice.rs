//! Voice bridge
//!
//! Thin wrapper over the OpenAI realtime-session and TTS endpoints. Unlike
//! the chat fallback this service fails closed: without a configured key the
//! voice endpoints return an error instead of a degraded payload, because
//! there is no meaningful audio to substitute.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Settings;
use crate::error::AdvisoryError;
use crate::Result;

const REALTIME_SESSIONS_URL: &str = "https://api.openai.com/v1/realtime/sessions";
const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

const REALTIME_MODEL: &str = "gpt-4o-realtime";
const TTS_MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";

/// Rough mp3 bytes-per-second figure used to estimate playback length.
const BYTES_PER_SECOND: f64 = 16_000.0;

pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("hi", "Hindi"),
    ("bn", "Bengali"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("mr", "Marathi"),
    ("gu", "Gujarati"),
    ("pa", "Punjabi"),
    ("or", "Odia"),
    ("ml", "Malayalam"),
    ("kn", "Kannada"),
];

#[derive(Debug, Clone, Serialize)]
pub struct VoiceProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const AVAILABLE_VOICES: &[VoiceProfile] = &[
    VoiceProfile { id: "alloy", name: "Alloy", description: "Neutral, balanced voice" },
    VoiceProfile { id: "echo", name: "Echo", description: "Warm, friendly voice" },
    VoiceProfile { id: "fable", name: "Fable", description: "Narrative, storytelling voice" },
    VoiceProfile { id: "onyx", name: "Onyx", description: "Deep, authoritative voice" },
    VoiceProfile { id: "nova", name: "Nova", description: "Bright, energetic voice" },
    VoiceProfile { id: "shimmer", name: "Shimmer", description: "Soft, gentle voice" },
];

pub fn is_language_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(c, _)| *c == code)
}

pub fn language_name(code: &str) -> &'static str {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or("Hindi")
}

fn default_farmer_context() -> serde_json::Value {
    serde_json::json!({
        "location": "Punjab, India",
        "crops": ["wheat", "rice", "cotton"],
        "experience": "15 years",
        "land_size": "10 acres",
        "current_concerns": ["loan repayment", "crop selection", "market prices"],
    })
}

/// Build the KrishiMitra persona instructions for a realtime session from
/// the caller's farmer context (or a representative default profile).
pub fn krishi_mitra_instructions(
    language_code: &str,
    farmer_context: Option<&serde_json::Value>,
) -> String {
    let language = language_name(language_code);
    let context = farmer_context
        .cloned()
        .unwrap_or_else(default_farmer_context);

    format!(
        "You are KrishiMitra, an AI farming assistant for Indian farmers. You have \
comprehensive knowledge about farming in Punjab, India.

FARMER CONTEXT: {context}

CONVERSATION FLOW:
1. Start with a warm greeting in {language}
2. Ask basic questions first to understand the farmer's situation: land size, \
current crops, years of experience, existing loans, irrigation, and district
3. Then provide personalized recommendations based on their answers

LOAN INFORMATION FOR PUNJAB FARMERS:
- Crop Loan: Up to ₹3,00,000, 7% interest rate, 12 months tenure
- Equipment Loan: Up to ₹5,00,000, 8.5% interest rate, 36 months tenure
- Irrigation Loan: Up to ₹2,00,000, 7.5% interest rate, 24 months tenure
- Dairy Loan: Up to ₹10,00,000, 6.5% interest rate, 60 months tenure
- Best Bank: Punjab National Bank (6.8% crop loan rate)

GOVERNMENT SCHEMES:
- PM-KISAN: ₹6,000/year (small and marginal farmers)
- Seed Subsidy: ₹500/quintal, Fertilizer Subsidy: ₹1,400/bag
- Drip Irrigation Subsidy: ₹50,000 (farmers with 2+ acres)

RISK ASSESSMENT FOR PUNJAB:
- Weather: 15% drought probability, 10% flood probability, 25% heat wave probability
- Pests: Fall armyworm (maize), Pink bollworm (cotton), Brown planthopper (rice)

CONTACT INFORMATION:
- Agriculture Department: 0172-2700711
- PM-KISAN Helpline: 1800-180-1551

RESPONSE GUIDELINES:
- Use {language} primarily, mixing English terms when needed
- Give specific, actionable advice with current prices and relevant schemes
- Be encouraging and supportive; prefer short, speakable sentences
- Never give generic advice without understanding their situation first"
    )
}

/// An established realtime voice session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSession {
    pub session_id: String,
    pub model: String,
    pub voice: String,
    pub language: String,
    pub status: String,
}

/// Synthesized speech plus an estimated playback duration.
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub audio: Vec<u8>,
    pub duration_seconds: f64,
}

#[derive(Serialize)]
struct RealtimeSessionBody<'a> {
    model: &'a str,
    voice: &'a str,
    instructions: &'a str,
}

#[derive(Deserialize)]
struct RealtimeSessionReply {
    id: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

pub struct VoiceService {
    client: Client,
    api_key: String,
    key_configured: bool,
}

impl VoiceService {
    pub fn new(settings: &Settings) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: settings.openai_api_key.clone(),
            key_configured: settings.has_openai_key(),
        }
    }

    fn require_key(&self) -> Result<()> {
        if self.key_configured {
            Ok(())
        } else {
            Err(AdvisoryError::MissingApiKey(
                "OpenAI API key is required for voice features".to_string(),
            ))
        }
    }

    /// Open a realtime voice session for the given voice/language pair.
    pub async fn create_realtime_session(
        &self,
        voice: &str,
        language: &str,
        instructions: &str,
    ) -> Result<RealtimeSession> {
        self.require_key()?;

        let voice = if voice.is_empty() { DEFAULT_VOICE } else { voice };
        let language = if language.is_empty() { "hi" } else { language };
        let instructions = if instructions.is_empty() {
            "You are KrishiMitra, an AI farming assistant for Indian farmers."
        } else {
            instructions
        };

        let body = RealtimeSessionBody {
            model: REALTIME_MODEL,
            voice,
            instructions,
        };

        let response = self
            .client
            .post(REALTIME_SESSIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdvisoryError::VoiceError(format!(
                "Realtime session creation failed ({}): {}",
                status, detail
            )));
        }

        let reply: RealtimeSessionReply = response.json().await?;
        info!(session_id = %reply.id, voice, language, "realtime session created");

        Ok(RealtimeSession {
            session_id: reply.id,
            model: reply.model.unwrap_or_else(|| REALTIME_MODEL.to_string()),
            voice: voice.to_string(),
            language: language_name(language).to_string(),
            status: "active".to_string(),
        })
    }

    /// Synthesize speech for a non-realtime response. Unsupported language
    /// codes degrade to Hindi rather than failing.
    pub async fn text_to_speech(&self, text: &str, language: &str) -> Result<SpeechAudio> {
        self.require_key()?;

        if text.is_empty() {
            return Err(AdvisoryError::ValidationError(
                "Text is required for TTS conversion".to_string(),
            ));
        }

        let language = if is_language_supported(language) {
            language
        } else {
            "hi"
        };

        let body = SpeechBody {
            model: TTS_MODEL,
            voice: DEFAULT_VOICE,
            input: text,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdvisoryError::VoiceError(format!(
                "TTS conversion failed ({}): {}",
                status, detail
            )));
        }

        let audio = response.bytes().await?.to_vec();
        let duration_seconds = estimate_duration(audio.len());
        info!(
            audio_size = audio.len(),
            duration_seconds, language, "speech synthesized"
        );

        Ok(SpeechAudio {
            audio,
            duration_seconds,
        })
    }
}

pub fn estimate_duration(audio_size: usize) -> f64 {
    audio_size as f64 / BYTES_PER_SECOND
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyless_settings() -> Settings {
        Settings {
            openai_api_key: String::new(),
            openai_model: "gpt-4".to_string(),
            database_url: String::new(),
            port: 8000,
            default_language: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_realtime_session_fails_closed_without_key() {
        let service = VoiceService::new(&keyless_settings());
        let result = service.create_realtime_session("alloy", "hi", "").await;
        assert!(matches!(result, Err(AdvisoryError::MissingApiKey(_))));
    }

    #[tokio::test]
    async fn test_tts_fails_closed_without_key() {
        let service = VoiceService::new(&keyless_settings());
        let result = service.text_to_speech("namaste", "hi").await;
        assert!(matches!(result, Err(AdvisoryError::MissingApiKey(_))));
    }

    #[test]
    fn test_language_catalog() {
        assert!(is_language_supported("hi"));
        assert!(is_language_supported("pa"));
        assert!(!is_language_supported("en"));
        assert_eq!(language_name("ta"), "Tamil");
        assert_eq!(language_name("xx"), "Hindi");
    }

    #[test]
    fn test_voice_catalog_has_six_voices() {
        assert_eq!(AVAILABLE_VOICES.len(), 6);
        assert_eq!(AVAILABLE_VOICES[0].id, "alloy");
    }

    #[test]
    fn test_instructions_carry_language_and_context() {
        let context = serde_json::json!({
            "location": "Bathinda, Punjab",
            "land_size": "3 acres",
        });
        let instructions = krishi_mitra_instructions("pa", Some(&context));
        assert!(instructions.contains("Punjabi"));
        assert!(instructions.contains("Bathinda, Punjab"));
        assert!(instructions.contains("PM-KISAN"));
    }

    #[test]
    fn test_instructions_default_profile_without_context() {
        let instructions = krishi_mitra_instructions("hi", None);
        assert!(instructions.contains("Hindi"));
        assert!(instructions.contains("Punjab, India"));
        assert!(instructions.contains("loan repayment"));
    }

    #[test]
    fn test_duration_estimate() {
        assert_eq!(estimate_duration(32_000), 2.0);
        assert_eq!(estimate_duration(0), 0.0);
    }
}
