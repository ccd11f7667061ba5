#![allow(clippy::doc_lazy_continuation)]
#![allow(clippy::len_zero)]
// src/lib.rs

//! Trezor signing provider
//!
//! 为以太坊wallet的 provider pipeline 提供 `get_accounts` / `sign_transaction`，
//! 所有签名都在硬件设备上完成。同一时间只有一个设备会话，请求严格按到达顺序执行。

pub mod challenge;
pub mod codec;
pub mod core;
pub mod hardware;
pub mod provider;
pub mod session;

pub use crate::core::errors::{ErrorKind, ProviderError, Result};
pub use crate::provider::{ProviderState, SigningProvider, WalletHooks};
pub use crate::session::{DeviceRegistry, SessionManager, SessionPolicy};
