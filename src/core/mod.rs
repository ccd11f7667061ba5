pub mod config;
pub mod errors;
pub mod logging;

pub use config::ProviderConfig;
pub use errors::{ErrorKind, ProviderError, Result};
