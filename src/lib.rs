pub mod api;
pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod forms;
pub mod insights;
pub mod modal;
pub mod models;
pub mod portal;
pub mod report;
pub mod resource;
pub mod session;

pub use api::ApiClient;
pub use config::Config;
pub use error::{ApiError, Result};
pub use session::{Session, SessionStore};
