pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod models;
pub mod services;
pub mod store;
pub mod tasks;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
