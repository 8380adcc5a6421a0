pub mod auth;
pub mod client_key;
pub mod config;
pub mod error;
pub mod key;
pub mod log;
pub mod models;
pub mod proxy_pool;
pub mod user;

pub use config::{ConfigKey, ConfigSnapshot};
pub use error::CoreError;
pub use log::{LogEntry, LogFilter, LogPager, LogTab};
pub use user::{CurrentUser, Role};
