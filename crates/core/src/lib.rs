pub mod config;
pub mod error;

pub use config::{load_dotenv, ContextSettings, DelegateSettings, ServerSettings, Settings};
pub use error::ConfigError;
