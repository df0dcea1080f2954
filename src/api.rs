//! REST API server
//!
//! Exposes the orchestrator, the voice bridge, and the entity store over
//! HTTP. The chat surface follows an always-answer contract: once a message
//! passes validation, internal failures are converted into the localized
//! fallback payload and returned with a 200.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::{
    Database, NewCrop, NewLoan, NewMarketPrice, NewSubsidy, NewUser, NewWeatherRecord, Page,
    PriceFilter, UserUpdate,
};
use crate::error::AdvisoryError;
use crate::orchestrator::Orchestrator;
use crate::voice::{VoiceService, AVAILABLE_VOICES, SUPPORTED_LANGUAGES};
use crate::ws::{ws_router, WsState};

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub voice: Arc<VoiceService>,
    /// Absent when the service runs without Postgres; entity endpoints then
    /// answer 503 while the chat path keeps working.
    pub db: Option<Arc<Database>>,
}

impl ApiState {
    fn database(&self) -> Result<&Arc<Database>, Response> {
        self.db.as_ref().ok_or_else(|| {
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Database is not configured",
            )
        })
    }
}

fn error_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(serde_json::json!({ "detail": detail }))).into_response()
}

fn map_error(error: AdvisoryError) -> Response {
    let status = match &error {
        AdvisoryError::ValidationError(_) => StatusCode::BAD_REQUEST,
        AdvisoryError::NotFound(_) => StatusCode::NOT_FOUND,
        AdvisoryError::MissingApiKey(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &error.to_string())
}

/// =============================
/// Chat Endpoints
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatSendRequest {
    pub message: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_language() -> String {
    "hi".to_string()
}

async fn chat_send(
    State(state): State<ApiState>,
    Json(req): Json<ChatSendRequest>,
) -> Response {
    if req.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message cannot be empty");
    }

    let user_id = req.user_id.as_deref().unwrap_or("anonymous");
    info!(user_id, language = %req.language, "chat message received");

    let response = state
        .orchestrator
        .process_query(&req.message, user_id, &req.language)
        .await;

    Json(response).into_response()
}

async fn agents_status(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let status = state.orchestrator.agent_status();

    Json(serde_json::json!({
        "status": if status.all_healthy() { "healthy" } else { "degraded" },
        "agents": status,
        "total_agents": 5,
        "active_agents": status.active_count(),
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    limit: i64,
}

fn default_history_limit() -> i64 {
    10
}

async fn chat_history(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.conversations_for_user(&user_id, query.limit).await {
        Ok(history) => Json(serde_json::json!({
            "user_id": user_id,
            "total_count": history.len(),
            "history": history,
        }))
        .into_response(),
        Err(error) => map_error(error),
    }
}

async fn debt_forecast(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.orchestrator.debt_forecast(&user_id).await {
        Ok(forecast) => Json(forecast).into_response(),
        Err(error) => map_error(error),
    }
}

#[derive(Debug, Deserialize)]
struct SeasonQuery {
    #[serde(default = "default_season")]
    season: String,
}

fn default_season() -> String {
    "rabi".to_string()
}

async fn crop_recommendations(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<SeasonQuery>,
) -> Response {
    match state
        .orchestrator
        .crop_recommendations(&user_id, &query.season)
        .await
    {
        Ok(recommendations) => Json(recommendations).into_response(),
        Err(error) => map_error(error),
    }
}

#[derive(Debug, Deserialize)]
struct MarketInsightsQuery {
    crop_name: String,
    location: String,
}

async fn market_insights(
    State(state): State<ApiState>,
    Query(query): Query<MarketInsightsQuery>,
) -> Response {
    match state
        .orchestrator
        .market_insights(&query.crop_name, &query.location)
    {
        Ok(insights) => Json(insights).into_response(),
        Err(error) => map_error(error),
    }
}

/// =============================
/// Voice Endpoints
/// =============================

#[derive(Debug, Deserialize)]
pub struct RealtimeSessionRequest {
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub farmer_context: Option<serde_json::Value>,
}

fn default_voice() -> String {
    "alloy".to_string()
}

async fn voice_realtime_session(
    State(state): State<ApiState>,
    Json(req): Json<RealtimeSessionRequest>,
) -> Response {
    info!(
        voice = %req.voice,
        language = %req.language,
        user_id = ?req.user_id,
        "realtime session requested"
    );

    let instructions =
        crate::voice::krishi_mitra_instructions(&req.language, req.farmer_context.as_ref());
    match state
        .voice
        .create_realtime_session(&req.voice, &req.language, &instructions)
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(error) => map_error(error),
    }
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Accepted for wire compatibility; synthesis currently always uses the
    /// default voice.
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

async fn voice_tts(State(state): State<ApiState>, Json(req): Json<TtsRequest>) -> Response {
    match state.voice.text_to_speech(&req.text, &req.language).await {
        Ok(speech) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE.as_str(), "audio/mpeg".to_string()),
                ("x-audio-duration", format!("{:.2}", speech.duration_seconds)),
            ],
            speech.audio,
        )
            .into_response(),
        Err(error) => map_error(error),
    }
}

async fn voice_languages() -> Json<serde_json::Value> {
    let languages: Vec<serde_json::Value> = SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, name)| serde_json::json!({ "code": code, "name": name }))
        .collect();

    Json(serde_json::json!({ "languages": languages, "default_language": "hi" }))
}

async fn voice_voices() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "voices": AVAILABLE_VOICES,
        "default_voice": "alloy",
        "api_provider": "OpenAI",
    }))
}

/// =============================
/// Entity Endpoints
/// =============================

async fn register_user(State(state): State<ApiState>, Json(user): Json<NewUser>) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.register_user(user).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(error) => map_error(error),
    }
}

async fn get_user(State(state): State<ApiState>, Path(user_id): Path<String>) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.get_user(&user_id).await {
        Ok(user) => Json(user).into_response(),
        Err(error) => map_error(error),
    }
}

async fn get_user_by_phone(
    State(state): State<ApiState>,
    Path(phone_number): Path<String>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.get_user_by_phone(&phone_number).await {
        Ok(user) => Json(user).into_response(),
        Err(error) => map_error(error),
    }
}

async fn list_users(State(state): State<ApiState>, Query(page): Query<Page>) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.list_users(page).await {
        Ok(users) => Json(users).into_response(),
        Err(error) => map_error(error),
    }
}

async fn update_user(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.update_user(&user_id, update).await {
        Ok(user) => Json(user).into_response(),
        Err(error) => map_error(error),
    }
}

async fn delete_user(State(state): State<ApiState>, Path(user_id): Path<String>) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.delete_user(&user_id).await {
        Ok(()) => Json(serde_json::json!({ "message": "User deleted successfully" })).into_response(),
        Err(error) => map_error(error),
    }
}

async fn create_loan(State(state): State<ApiState>, Json(loan): Json<NewLoan>) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.create_loan(loan).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(error) => map_error(error),
    }
}

async fn loans_for_user(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(page): Query<Page>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.loans_for_user(&user_id, page).await {
        Ok(loans) => Json(loans).into_response(),
        Err(error) => map_error(error),
    }
}

async fn create_crop(State(state): State<ApiState>, Json(crop): Json<NewCrop>) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.create_crop(crop).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(error) => map_error(error),
    }
}

async fn crops_for_user(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(page): Query<Page>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.crops_for_user(&user_id, page).await {
        Ok(crops) => Json(crops).into_response(),
        Err(error) => map_error(error),
    }
}

async fn create_price(
    State(state): State<ApiState>,
    Json(price): Json<NewMarketPrice>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.record_price(price).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(error) => map_error(error),
    }
}

async fn list_prices(
    State(state): State<ApiState>,
    Query(filter): Query<PriceFilter>,
    Query(page): Query<Page>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.list_prices(filter, page).await {
        Ok(prices) => Json(prices).into_response(),
        Err(error) => map_error(error),
    }
}

async fn create_weather(
    State(state): State<ApiState>,
    Json(record): Json<NewWeatherRecord>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.record_weather(record).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(error) => map_error(error),
    }
}

async fn weather_for_location(
    State(state): State<ApiState>,
    Path(location): Path<String>,
    Query(page): Query<Page>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.weather_for_location(&location, page).await {
        Ok(records) => Json(records).into_response(),
        Err(error) => map_error(error),
    }
}

async fn create_subsidy(
    State(state): State<ApiState>,
    Json(subsidy): Json<NewSubsidy>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.create_subsidy(subsidy).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(error) => map_error(error),
    }
}

#[derive(Debug, Default, Deserialize)]
struct SubsidyFilter {
    state: Option<String>,
}

async fn list_subsidies(
    State(state): State<ApiState>,
    Query(filter): Query<SubsidyFilter>,
    Query(page): Query<Page>,
) -> Response {
    let db = match state.database() {
        Ok(db) => db,
        Err(response) => return response,
    };

    match db.active_subsidies(filter.state.as_deref(), page).await {
        Ok(subsidies) => Json(subsidies).into_response(),
        Err(error) => map_error(error),
    }
}

/// =============================
/// Health + Root
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "farm-advisory-orchestrator",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Farm Advisory Orchestrator",
        "status": "running",
    }))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    let chat = Router::new()
        .route("/send", post(chat_send))
        .route("/history/:user_id", get(chat_history))
        .route("/agents/status", get(agents_status))
        .route("/debt-forecast/:user_id", post(debt_forecast))
        .route("/crop-recommendations/:user_id", post(crop_recommendations))
        .route("/market-insights", post(market_insights));

    let voice = Router::new()
        .route("/realtime-session", post(voice_realtime_session))
        .route("/tts", post(voice_tts))
        .route("/languages", get(voice_languages))
        .route("/voices", get(voice_voices));

    let users = Router::new()
        .route("/register", post(register_user))
        .route("/", get(list_users))
        .route("/phone/:phone_number", get(get_user_by_phone))
        .route("/:user_id", get(get_user).put(update_user).delete(delete_user));

    let loans = Router::new()
        .route("/", post(create_loan))
        .route("/user/:user_id", get(loans_for_user));

    let crops = Router::new()
        .route("/", post(create_crop))
        .route("/user/:user_id", get(crops_for_user));

    let market = Router::new()
        .route("/prices", post(create_price).get(list_prices));

    let weather = Router::new()
        .route("/", post(create_weather))
        .route("/:location", get(weather_for_location));

    let subsidies = Router::new()
        .route("/", post(create_subsidy).get(list_subsidies));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1/chat", chat)
        .nest("/api/v1/voice", voice)
        .nest("/api/v1/users", users)
        .nest("/api/v1/loans", loans)
        .nest("/api/v1/crops", crops)
        .nest("/api/v1/market", market)
        .nest("/api/v1/weather", weather)
        .nest("/api/v1/subsidies", subsidies)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(state: ApiState, ws_state: WsState, port: u16) -> crate::Result<()> {
    let router = create_router(state).merge(ws_router(ws_state));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::StaticContextStore;
    use crate::db::MemoryConversationSink;
    use crate::fallback::LlmFallback;

    fn test_settings() -> Settings {
        Settings {
            openai_api_key: String::new(),
            openai_model: "gpt-4".to_string(),
            database_url: String::new(),
            port: 8000,
            default_language: "hi".to_string(),
        }
    }

    async fn test_state() -> ApiState {
        let settings = test_settings();
        let orchestrator = Orchestrator::new(
            LlmFallback::new(&settings),
            Arc::new(StaticContextStore::new()),
            Arc::new(MemoryConversationSink::new()),
        );
        orchestrator.initialize().await.unwrap();

        ApiState {
            orchestrator: Arc::new(orchestrator),
            voice: Arc::new(VoiceService::new(&settings)),
            db: None,
        }
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let state = test_state().await;
        let response = chat_send(
            State(state),
            Json(ChatSendRequest {
                message: "   ".to_string(),
                language: "hi".to_string(),
                user_id: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_send_always_answers_200() {
        let state = test_state().await;
        // Non-comprehensive query with no API key: internally degraded,
        // but still a 200 payload
        let response = chat_send(
            State(state),
            Json(ChatSendRequest {
                message: "hello".to_string(),
                language: "en".to_string(),
                user_id: Some("farmer-1".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_agents_status_healthy_after_init() {
        let state = test_state().await;
        let Json(body) = agents_status(State(state)).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["active_agents"], 5);
    }

    #[tokio::test]
    async fn test_market_insights_endpoint() {
        let state = test_state().await;
        let response = market_insights(
            State(state),
            Query(MarketInsightsQuery {
                crop_name: "wheat".to_string(),
                location: "Punjab".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_entity_routes_answer_503_without_database() {
        let state = test_state().await;
        let response = list_users(State(state), Query(Page::default())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_tts_unavailable_without_key() {
        let state = test_state().await;
        let response = voice_tts(
            State(state),
            Json(TtsRequest {
                text: "namaste".to_string(),
                language: "hi".to_string(),
                voice: "alloy".to_string(),
                user_id: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_tts_request_accepts_full_client_payload() {
        // Clients send voice and user_id alongside text/language; both must
        // deserialize even though synthesis ignores the voice for now.
        let req: TtsRequest = serde_json::from_str(
            r#"{"text": "namaste", "language": "hi", "voice": "nova", "user_id": "farmer-1"}"#,
        )
        .unwrap();
        assert_eq!(req.voice, "nova");
        assert_eq!(req.user_id.as_deref(), Some("farmer-1"));

        let minimal: TtsRequest = serde_json::from_str(r#"{"text": "namaste"}"#).unwrap();
        assert_eq!(minimal.language, "hi");
        assert_eq!(minimal.voice, "alloy");
        assert!(minimal.user_id.is_none());
    }

    #[test]
    fn test_realtime_session_request_carries_farmer_context() {
        let req: RealtimeSessionRequest = serde_json::from_str(
            r#"{"voice": "echo", "language": "pa", "user_id": "farmer-1",
                "farmer_context": {"location": "Bathinda, Punjab"}}"#,
        )
        .unwrap();
        assert_eq!(req.voice, "echo");
        assert_eq!(req.user_id.as_deref(), Some("farmer-1"));
        let instructions =
            crate::voice::krishi_mitra_instructions(&req.language, req.farmer_context.as_ref());
        assert!(instructions.contains("Punjabi"));
        assert!(instructions.contains("Bathinda, Punjab"));
    }

    #[tokio::test]
    async fn test_chat_history_answers_503_without_database() {
        let state = test_state().await;
        let response = chat_history(
            State(state),
            Path("farmer-1".to_string()),
            Query(HistoryQuery { limit: 10 }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_voice_catalogs() {
        let Json(languages) = voice_languages().await;
        assert_eq!(languages["languages"].as_array().unwrap().len(), 10);

        let Json(voices) = voice_voices().await;
        assert_eq!(voices["voices"].as_array().unwrap().len(), 6);
        assert_eq!(voices["default_voice"], "alloy");
    }
}
