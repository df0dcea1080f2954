//! Persistence layer
//!
//! Lazy Postgres pool with runtime schema bootstrap. The service stays usable
//! without a reachable database: the pool is created lazily, the schema is
//! ensured on first use, and callers that can tolerate a missing database
//! (context assembly, turn logging) degrade instead of failing the request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::error::AdvisoryError;
use crate::Result;

const MAX_PAGE_SIZE: i64 = 500;

/// Offset/limit pagination for the list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl Page {
    fn clamped(self) -> (i64, i64) {
        (self.skip.max(0), self.limit.clamp(1, MAX_PAGE_SIZE))
    }
}

//
// ================= Entities =================
//

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FarmUser {
    pub id: String,
    pub phone_number: String,
    pub name: String,
    pub language: String,
    pub state: String,
    pub district: String,
    pub village: String,
    pub land_area: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub phone_number: String,
    pub name: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub state: String,
    pub district: String,
    pub village: String,
    pub land_area: f64,
}

fn default_language() -> String {
    "hi".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub language: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub village: Option<String>,
    pub land_area: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoanRecord {
    pub id: String,
    pub user_id: String,
    pub loan_type: String,
    pub amount: f64,
    pub interest_rate: f64,
    pub remaining_amount: f64,
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLoan {
    pub user_id: String,
    pub loan_type: String,
    pub amount: f64,
    pub interest_rate: f64,
    pub remaining_amount: f64,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CropRecord {
    pub id: String,
    pub user_id: String,
    pub crop_name: String,
    pub variety: Option<String>,
    pub area: f64,
    pub current_stage: String,
    pub sowing_date: Option<DateTime<Utc>>,
    pub expected_harvest_date: Option<DateTime<Utc>>,
    pub expected_yield: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCrop {
    pub user_id: String,
    pub crop_name: String,
    #[serde(default)]
    pub variety: Option<String>,
    pub area: f64,
    #[serde(default = "default_stage")]
    pub current_stage: String,
    #[serde(default)]
    pub sowing_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expected_harvest_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expected_yield: Option<f64>,
}

fn default_stage() -> String {
    "growing".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MarketPriceRecord {
    pub id: String,
    pub crop_name: String,
    pub mandi_name: String,
    pub state: String,
    pub min_price: f64,
    pub max_price: f64,
    pub modal_price: f64,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMarketPrice {
    pub crop_name: String,
    pub mandi_name: String,
    pub state: String,
    pub min_price: f64,
    pub max_price: f64,
    pub modal_price: f64,
    pub date: DateTime<Utc>,
}

/// Optional filters for the price listing; all are substring matches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceFilter {
    pub crop_name: Option<String>,
    pub mandi_name: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeatherRecord {
    pub id: String,
    pub location: String,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub wind_speed: f64,
    pub forecast_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWeatherRecord {
    pub location: String,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub wind_speed: f64,
    pub forecast_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubsidyRecord {
    pub id: String,
    pub scheme_name: String,
    pub description: String,
    pub eligibility_criteria: String,
    pub subsidy_amount: f64,
    pub state: String,
    pub category: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubsidy {
    pub scheme_name: String,
    pub description: String,
    pub eligibility_criteria: String,
    pub subsidy_amount: f64,
    pub state: String,
    pub category: String,
}

//
// ================= Conversation Sink =================
//

/// One completed conversational turn, as recorded for later analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_id: String,
    pub query: String,
    pub response: String,
    pub language: String,
    pub agents_used: Vec<String>,
    pub confidence: f32,
}

/// Destination for turn logging. The orchestrator treats sink failures as
/// non-fatal: a turn that cannot be recorded is still answered.
#[async_trait::async_trait]
pub trait ConversationSink: Send + Sync {
    async fn record(&self, turn: ConversationTurn) -> Result<()>;
}

/// In-memory sink for tests and database-less deployments.
#[derive(Default)]
pub struct MemoryConversationSink {
    turns: RwLock<Vec<ConversationTurn>>,
}

impl MemoryConversationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.turns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.read().await.is_empty()
    }

    pub async fn last(&self) -> Option<ConversationTurn> {
        self.turns.read().await.last().cloned()
    }
}

#[async_trait::async_trait]
impl ConversationSink for MemoryConversationSink {
    async fn record(&self, turn: ConversationTurn) -> Result<()> {
        self.turns.write().await.push(turn);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConversationSink for Database {
    async fn record(&self, turn: ConversationTurn) -> Result<()> {
        self.record_conversation(turn).await
    }
}

//
// ================= Database =================
//

/// Postgres-backed store for farm entities and conversation logs.
pub struct Database {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl Database {
    /// Create a lazily-connecting pool. No IO happens here; the first query
    /// establishes the connection.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    /// Create all tables if they do not exist. Idempotent; runs once per
    /// process and is re-attempted on later calls only if the first failed.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                for statement in SCHEMA_STATEMENTS {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                info!("database schema ready");
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AdvisoryError::DatabaseError(format!("Failed to initialize schema: {}", e))
            })?;

        Ok(())
    }

    // ----- users -----

    pub async fn register_user(&self, user: NewUser) -> Result<FarmUser> {
        self.ensure_schema().await?;

        let existing = sqlx::query_scalar::<_, String>(
            "SELECT id FROM users WHERE phone_number = $1",
        )
        .bind(&user.phone_number)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Err(AdvisoryError::ValidationError(
                "User with this phone number already exists".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let created = sqlx::query_as::<_, FarmUser>(
            r#"
            INSERT INTO users (id, phone_number, name, language, state, district, village, land_area)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, phone_number, name, language, state, district, village, land_area, created_at
            "#,
        )
        .bind(&id)
        .bind(&user.phone_number)
        .bind(&user.name)
        .bind(&user.language)
        .bind(&user.state)
        .bind(&user.district)
        .bind(&user.village)
        .bind(user.land_area)
        .fetch_one(&self.pool)
        .await?;

        info!(user_id = %created.id, "new user registered");
        Ok(created)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<FarmUser> {
        self.ensure_schema().await?;

        sqlx::query_as::<_, FarmUser>(
            "SELECT id, phone_number, name, language, state, district, village, land_area, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AdvisoryError::NotFound(format!("User {} not found", user_id)))
    }

    pub async fn get_user_by_phone(&self, phone_number: &str) -> Result<FarmUser> {
        self.ensure_schema().await?;

        sqlx::query_as::<_, FarmUser>(
            "SELECT id, phone_number, name, language, state, district, village, land_area, created_at FROM users WHERE phone_number = $1",
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AdvisoryError::NotFound(format!("User with phone {} not found", phone_number)))
    }

    pub async fn list_users(&self, page: Page) -> Result<Vec<FarmUser>> {
        self.ensure_schema().await?;
        let (skip, limit) = page.clamped();

        let users = sqlx::query_as::<_, FarmUser>(
            "SELECT id, phone_number, name, language, state, district, village, land_area, created_at FROM users ORDER BY created_at OFFSET $1 LIMIT $2",
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Partial update; only provided fields change.
    pub async fn update_user(&self, user_id: &str, update: UserUpdate) -> Result<FarmUser> {
        self.ensure_schema().await?;

        let updated = sqlx::query_as::<_, FarmUser>(
            r#"
            UPDATE users SET
              name = COALESCE($2, name),
              language = COALESCE($3, language),
              state = COALESCE($4, state),
              district = COALESCE($5, district),
              village = COALESCE($6, village),
              land_area = COALESCE($7, land_area)
            WHERE id = $1
            RETURNING id, phone_number, name, language, state, district, village, land_area, created_at
            "#,
        )
        .bind(user_id)
        .bind(&update.name)
        .bind(&update.language)
        .bind(&update.state)
        .bind(&update.district)
        .bind(&update.village)
        .bind(update.land_area)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AdvisoryError::NotFound(format!("User {} not found", user_id)))?;

        info!(user_id, "user updated");
        Ok(updated)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AdvisoryError::NotFound(format!(
                "User {} not found",
                user_id
            )));
        }

        info!(user_id, "user deleted");
        Ok(())
    }

    // ----- loans -----

    pub async fn create_loan(&self, loan: NewLoan) -> Result<LoanRecord> {
        self.ensure_schema().await?;

        let id = Uuid::new_v4().to_string();
        let created = sqlx::query_as::<_, LoanRecord>(
            r#"
            INSERT INTO loans (id, user_id, loan_type, amount, interest_rate, remaining_amount, status, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $8)
            RETURNING id, user_id, loan_type, amount, interest_rate, remaining_amount, status, start_date, end_date
            "#,
        )
        .bind(&id)
        .bind(&loan.user_id)
        .bind(&loan.loan_type)
        .bind(loan.amount)
        .bind(loan.interest_rate)
        .bind(loan.remaining_amount)
        .bind(loan.start_date)
        .bind(loan.end_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn loans_for_user(&self, user_id: &str, page: Page) -> Result<Vec<LoanRecord>> {
        self.ensure_schema().await?;
        let (skip, limit) = page.clamped();

        let loans = sqlx::query_as::<_, LoanRecord>(
            "SELECT id, user_id, loan_type, amount, interest_rate, remaining_amount, status, start_date, end_date FROM loans WHERE user_id = $1 ORDER BY id OFFSET $2 LIMIT $3",
        )
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    // ----- crops -----

    pub async fn create_crop(&self, crop: NewCrop) -> Result<CropRecord> {
        self.ensure_schema().await?;

        let id = Uuid::new_v4().to_string();
        let created = sqlx::query_as::<_, CropRecord>(
            r#"
            INSERT INTO crops (id, user_id, crop_name, variety, area, current_stage, sowing_date, expected_harvest_date, expected_yield)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, user_id, crop_name, variety, area, current_stage, sowing_date, expected_harvest_date, expected_yield
            "#,
        )
        .bind(&id)
        .bind(&crop.user_id)
        .bind(&crop.crop_name)
        .bind(&crop.variety)
        .bind(crop.area)
        .bind(&crop.current_stage)
        .bind(crop.sowing_date)
        .bind(crop.expected_harvest_date)
        .bind(crop.expected_yield)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn crops_for_user(&self, user_id: &str, page: Page) -> Result<Vec<CropRecord>> {
        self.ensure_schema().await?;
        let (skip, limit) = page.clamped();

        let crops = sqlx::query_as::<_, CropRecord>(
            "SELECT id, user_id, crop_name, variety, area, current_stage, sowing_date, expected_harvest_date, expected_yield FROM crops WHERE user_id = $1 ORDER BY id OFFSET $2 LIMIT $3",
        )
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(crops)
    }

    // ----- market prices -----

    pub async fn record_price(&self, price: NewMarketPrice) -> Result<MarketPriceRecord> {
        self.ensure_schema().await?;

        let id = Uuid::new_v4().to_string();
        let created = sqlx::query_as::<_, MarketPriceRecord>(
            r#"
            INSERT INTO market_prices (id, crop_name, mandi_name, state, min_price, max_price, modal_price, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, crop_name, mandi_name, state, min_price, max_price, modal_price, date, created_at
            "#,
        )
        .bind(&id)
        .bind(&price.crop_name)
        .bind(&price.mandi_name)
        .bind(&price.state)
        .bind(price.min_price)
        .bind(price.max_price)
        .bind(price.modal_price)
        .bind(price.date)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn list_prices(
        &self,
        filter: PriceFilter,
        page: Page,
    ) -> Result<Vec<MarketPriceRecord>> {
        self.ensure_schema().await?;
        let (skip, limit) = page.clamped();

        let prices = sqlx::query_as::<_, MarketPriceRecord>(
            r#"
            SELECT id, crop_name, mandi_name, state, min_price, max_price, modal_price, date, created_at
            FROM market_prices
            WHERE ($1::TEXT IS NULL OR crop_name ILIKE '%' || $1 || '%')
              AND ($2::TEXT IS NULL OR mandi_name ILIKE '%' || $2 || '%')
              AND ($3::TEXT IS NULL OR state ILIKE '%' || $3 || '%')
            ORDER BY date DESC
            OFFSET $4 LIMIT $5
            "#,
        )
        .bind(&filter.crop_name)
        .bind(&filter.mandi_name)
        .bind(&filter.state)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(prices)
    }

    // ----- weather -----

    pub async fn record_weather(&self, record: NewWeatherRecord) -> Result<WeatherRecord> {
        self.ensure_schema().await?;

        let id = Uuid::new_v4().to_string();
        let created = sqlx::query_as::<_, WeatherRecord>(
            r#"
            INSERT INTO weather_data (id, location, temperature, humidity, rainfall, wind_speed, forecast_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, location, temperature, humidity, rainfall, wind_speed, forecast_date
            "#,
        )
        .bind(&id)
        .bind(&record.location)
        .bind(record.temperature)
        .bind(record.humidity)
        .bind(record.rainfall)
        .bind(record.wind_speed)
        .bind(record.forecast_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn weather_for_location(
        &self,
        location: &str,
        page: Page,
    ) -> Result<Vec<WeatherRecord>> {
        self.ensure_schema().await?;
        let (skip, limit) = page.clamped();

        let records = sqlx::query_as::<_, WeatherRecord>(
            "SELECT id, location, temperature, humidity, rainfall, wind_speed, forecast_date FROM weather_data WHERE location ILIKE '%' || $1 || '%' ORDER BY forecast_date DESC OFFSET $2 LIMIT $3",
        )
        .bind(location)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    // ----- subsidies -----

    pub async fn create_subsidy(&self, subsidy: NewSubsidy) -> Result<SubsidyRecord> {
        self.ensure_schema().await?;

        let id = Uuid::new_v4().to_string();
        let created = sqlx::query_as::<_, SubsidyRecord>(
            r#"
            INSERT INTO subsidies (id, scheme_name, description, eligibility_criteria, subsidy_amount, state, category, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            RETURNING id, scheme_name, description, eligibility_criteria, subsidy_amount, state, category, is_active
            "#,
        )
        .bind(&id)
        .bind(&subsidy.scheme_name)
        .bind(&subsidy.description)
        .bind(&subsidy.eligibility_criteria)
        .bind(subsidy.subsidy_amount)
        .bind(&subsidy.state)
        .bind(&subsidy.category)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn active_subsidies(
        &self,
        state: Option<&str>,
        page: Page,
    ) -> Result<Vec<SubsidyRecord>> {
        self.ensure_schema().await?;
        let (skip, limit) = page.clamped();

        let subsidies = sqlx::query_as::<_, SubsidyRecord>(
            r#"
            SELECT id, scheme_name, description, eligibility_criteria, subsidy_amount, state, category, is_active
            FROM subsidies
            WHERE is_active AND ($1::TEXT IS NULL OR state ILIKE '%' || $1 || '%')
            ORDER BY scheme_name
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(state)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(subsidies)
    }

    // ----- conversations -----

    pub async fn record_conversation(&self, turn: ConversationTurn) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, query, response, language, agent_used, confidence_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&turn.user_id)
        .bind(&turn.query)
        .bind(&turn.response)
        .bind(&turn.language)
        .bind(turn.agents_used.join(","))
        .bind(turn.confidence as f64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn conversations_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ConversationTurn>> {
        self.ensure_schema().await?;

        let rows = sqlx::query_as::<_, ConversationRow>(
            "SELECT user_id, query, response, language, agent_used, confidence_score FROM conversations WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit.clamp(1, MAX_PAGE_SIZE))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ConversationRow::into_turn).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    user_id: String,
    query: String,
    response: String,
    language: String,
    agent_used: String,
    confidence_score: f64,
}

impl ConversationRow {
    fn into_turn(self) -> ConversationTurn {
        let agents_used = if self.agent_used.is_empty() {
            vec![]
        } else {
            self.agent_used.split(',').map(str::to_string).collect()
        };

        ConversationTurn {
            user_id: self.user_id,
            query: self.query,
            response: self.response,
            language: self.language,
            agents_used,
            confidence: self.confidence_score as f32,
        }
    }
}

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
      id TEXT PRIMARY KEY,
      phone_number TEXT NOT NULL UNIQUE,
      name TEXT NOT NULL,
      language TEXT NOT NULL DEFAULT 'hi',
      state TEXT NOT NULL,
      district TEXT NOT NULL,
      village TEXT NOT NULL,
      land_area DOUBLE PRECISION NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS loans (
      id TEXT PRIMARY KEY,
      user_id TEXT NOT NULL,
      loan_type TEXT NOT NULL,
      amount DOUBLE PRECISION NOT NULL,
      interest_rate DOUBLE PRECISION NOT NULL,
      remaining_amount DOUBLE PRECISION NOT NULL,
      status TEXT NOT NULL DEFAULT 'active',
      start_date TIMESTAMPTZ,
      end_date TIMESTAMPTZ
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_loans_user ON loans (user_id);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS crops (
      id TEXT PRIMARY KEY,
      user_id TEXT NOT NULL,
      crop_name TEXT NOT NULL,
      variety TEXT,
      area DOUBLE PRECISION NOT NULL,
      current_stage TEXT NOT NULL DEFAULT 'growing',
      sowing_date TIMESTAMPTZ,
      expected_harvest_date TIMESTAMPTZ,
      expected_yield DOUBLE PRECISION
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_crops_user ON crops (user_id);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS market_prices (
      id TEXT PRIMARY KEY,
      crop_name TEXT NOT NULL,
      mandi_name TEXT NOT NULL,
      state TEXT NOT NULL,
      min_price DOUBLE PRECISION NOT NULL,
      max_price DOUBLE PRECISION NOT NULL,
      modal_price DOUBLE PRECISION NOT NULL,
      date TIMESTAMPTZ NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weather_data (
      id TEXT PRIMARY KEY,
      location TEXT NOT NULL,
      temperature DOUBLE PRECISION NOT NULL,
      humidity DOUBLE PRECISION NOT NULL,
      rainfall DOUBLE PRECISION NOT NULL,
      wind_speed DOUBLE PRECISION NOT NULL,
      forecast_date TIMESTAMPTZ NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS subsidies (
      id TEXT PRIMARY KEY,
      scheme_name TEXT NOT NULL,
      description TEXT NOT NULL,
      eligibility_criteria TEXT NOT NULL,
      subsidy_amount DOUBLE PRECISION NOT NULL,
      state TEXT NOT NULL,
      category TEXT NOT NULL,
      is_active BOOLEAN NOT NULL DEFAULT TRUE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
      id TEXT PRIMARY KEY,
      user_id TEXT NOT NULL,
      query TEXT NOT NULL,
      response TEXT NOT NULL,
      language TEXT NOT NULL,
      agent_used TEXT NOT NULL,
      confidence_score DOUBLE PRECISION NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_conversations_user_time
    ON conversations (user_id, created_at);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamping() {
        let (skip, limit) = Page { skip: -5, limit: 0 }.clamped();
        assert_eq!(skip, 0);
        assert_eq!(limit, 1);

        let (_, limit) = Page {
            skip: 10,
            limit: 10_000,
        }
        .clamped();
        assert_eq!(limit, MAX_PAGE_SIZE);

        let (skip, limit) = Page::default().clamped();
        assert_eq!((skip, limit), (0, 100));
    }

    #[tokio::test]
    async fn test_memory_sink_records_turns() {
        let sink = MemoryConversationSink::new();
        assert!(sink.is_empty().await);

        sink.record(ConversationTurn {
            user_id: "u1".to_string(),
            query: "karz kab khatam hoga".to_string(),
            response: "2 saal me".to_string(),
            language: "hi".to_string(),
            agents_used: vec!["finance".to_string()],
            confidence: 0.95,
        })
        .await
        .unwrap();

        assert_eq!(sink.len().await, 1);
        let last = sink.last().await.unwrap();
        assert_eq!(last.agents_used, vec!["finance"]);
    }

    #[test]
    fn test_conversation_row_agent_split() {
        let row = ConversationRow {
            user_id: "u1".to_string(),
            query: "q".to_string(),
            response: "r".to_string(),
            language: "hi".to_string(),
            agent_used: "finance,market".to_string(),
            confidence_score: 0.8,
        };
        let turn = row.into_turn();
        assert_eq!(turn.agents_used, vec!["finance", "market"]);

        let empty = ConversationRow {
            user_id: "u1".to_string(),
            query: "q".to_string(),
            response: "r".to_string(),
            language: "hi".to_string(),
            agent_used: String::new(),
            confidence_score: 0.0,
        };
        assert!(empty.into_turn().agents_used.is_empty());
    }
}
