pub mod analytics;
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod services;
pub mod store;
pub mod tenant;

pub use config::Config;
pub use error::{AppError, AppResult, OpStatus};
