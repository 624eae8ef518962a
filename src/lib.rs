pub mod cli;
pub mod config;
pub mod error;
pub mod forms;
pub mod logging;
pub mod security;
pub mod server;
pub mod shared;
pub mod tickets;
pub mod users;
pub mod web;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use shared::state::AppState;
pub use web::create_router;
