pub mod access;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod kafka;
pub mod lifecycle;
pub mod logger;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod schema;
pub mod services;

// Re-export common types
pub use crate::access::{Requester, Scope};
pub use crate::config::ApiError;
pub use crate::config::AppConfig;
pub use crate::config::DbPool;
pub use crate::kafka::KafkaProducer;
pub use crate::notifications::Notifier;
