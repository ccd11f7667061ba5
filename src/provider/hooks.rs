//! Wallet hooks
//!
//! 上游 pipeline 以回调风格调用 provider：`getAccounts(cb)` 与 `signTransaction(txParams, cb)`。
//! 每个回调恰好调用一次，成功或failed二选一。

use super::facade::SigningProvider;
use crate::codec::TransactionRequest;
use crate::core::errors::{ProviderError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

#[async_trait]
pub trait WalletHooks: Send + Sync {
    async fn get_accounts(&self) -> Result<Vec<String>>;

    async fn sign_transaction(&self, request: TransactionRequest) -> Result<String>;
}

#[async_trait]
impl WalletHooks for SigningProvider {
    async fn get_accounts(&self) -> Result<Vec<String>> {
        SigningProvider::get_accounts(self).await
    }

    async fn sign_transaction(&self, request: TransactionRequest) -> Result<String> {
        SigningProvider::sign_transaction(self, &request).await
    }
}

/// 后台执行 `get_accounts` 并以结果调用 `callback`
pub fn spawn_get_accounts<H, C>(hooks: Arc<H>, callback: C) -> JoinHandle<()>
where
    H: WalletHooks + ?Sized + 'static,
    C: FnOnce(Result<Vec<String>>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = hooks.get_accounts().await;
        debug!("getAccounts finished, ok={}", result.is_ok());
        callback(result);
    })
}

/// 后台执行 `sign_transaction` 并以结果调用 `callback`
pub fn spawn_sign_transaction<H, C>(hooks: Arc<H>, request: TransactionRequest, callback: C) -> JoinHandle<()>
where
    H: WalletHooks + ?Sized + 'static,
    C: FnOnce(Result<String>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = hooks.sign_transaction(request).await;
        debug!("signTransaction finished, ok={}", result.is_ok());
        callback(result);
    })
}

/// 从 JSON `txParams` 解析交易请求；只接受对象，不接受按位置排列的数组
pub fn parse_tx_params(params: serde_json::Value) -> Result<TransactionRequest> {
    if !params.is_object() {
        return Err(ProviderError::encoding("txParams", "expected a JSON object"));
    }
    serde_json::from_value(params).map_err(|e| ProviderError::encoding("txParams", e.to_string()))
}
