//! Farm Advisory Orchestrator
//!
//! A conversational advisory backend for Indian farmers that:
//! - Routes each query to one or more domain advisors (finance, agronomy,
//!   market, policy, risk) via keyword intent classification
//! - Merges multi-advisor answers into one localized response
//! - Falls back to an OpenAI chat completion for simple queries
//! - Persists farm entities (users, loans, crops, prices, weather, subsidies)
//! - Serves the same query path over REST and WebSocket, with a voice bridge
//!
//! TURN PIPELINE:
//! TRANSPORT → CONTEXT → CLASSIFY → GATE → { ADVISORS ∥ → SYNTHESIZE | LLM } → LOG

pub mod advisors;
pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod fallback;
pub mod intent;
pub mod models;
pub mod orchestrator;
pub mod synthesis;
pub mod voice;
pub mod ws;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use intent::IntentClassifier;
pub use orchestrator::Orchestrator;
