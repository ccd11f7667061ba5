//! Provider 层：地址缓存、facade 与回调风格的 hooks

pub mod cache;
pub mod facade;
pub mod hooks;

pub use cache::AccountCache;
pub use facade::{ProviderState, SigningProvider};
pub use hooks::{parse_tx_params, spawn_get_accounts, spawn_sign_transaction, WalletHooks};
