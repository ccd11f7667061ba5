//! 日志初始化

use crate::core::errors::{ProviderError, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// 默认日志过滤
pub const DEFAULT_DIRECTIVE: &str = "info,trezor_provider=debug";

/// 安装全局 tracing subscriber；`RUST_LOG` 优先于 `default_directive`
pub fn init_logging(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ProviderError::Config(format!("logging already initialized: {}", e)))
}
