//! DocQA core library.
//!
//! Foundational pieces shared by every DocQA crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging bootstrap
//! - Application configuration (defaults, YAML, environment, CLI flags)

pub mod config;
pub mod error;
pub mod logging;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
