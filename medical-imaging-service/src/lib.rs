pub mod config;
pub mod fallback;
pub mod inference;
pub mod mailer;
pub mod models;
pub mod report;
pub mod service;
pub mod store;
pub mod store_postgres;
pub mod tasks;
pub mod validation;
pub mod workflow;

pub use config::ServiceConfig;
pub use service::{AppState, build_router, create_app};
