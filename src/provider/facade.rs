//! Signing provider
//!
//! 上游 provider pipeline 调用的入口：`get_accounts` 与 `sign_transaction`。
//! 组合设备注册表、会话管理器、挑战中介、地址缓存与编解码。
//!
//! 状态：`NoDevice -> DeviceReady -> SigningInProgress -> DeviceReady`，
//! 任意状态下设备断开都回到 `NoDevice`；单个请求的failed不影响 provider 本身。

use super::cache::AccountCache;
use crate::challenge::ChallengeMediator;
use crate::codec::{assemble_legacy_signed_transaction, check_encodable, TransactionRequest};
use crate::core::config::ProviderConfig;
use crate::core::errors::{ProviderError, Result};
use crate::hardware::path::DerivationPath;
use crate::session::manager::SessionManager;
use crate::session::registry::DeviceRegistry;
use std::sync::Arc;
use tracing::{debug, info};

/// 以太坊address十六进制长度
const ADDRESS_HEX_LEN: usize = 40;

/// Provider 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    NoDevice,
    DeviceReady,
    SigningInProgress,
}

/// Signing provider facade
pub struct SigningProvider {
    sessions: Arc<SessionManager>,
    cache: Arc<AccountCache>,
    path: DerivationPath,
}

impl SigningProvider {
    /// 创建 provider，并在设备断开时清除该设备的地址缓存
    pub fn new(sessions: Arc<SessionManager>, cache: Arc<AccountCache>, path: DerivationPath) -> Self {
        {
            let cache = Arc::clone(&cache);
            sessions.registry().on_disconnect(move |device_id| {
                cache.invalidate(device_id);
            });
        }
        Self { sessions, cache, path }
    }

    /// 按配置构建完整的 provider
    pub fn from_config(config: &ProviderConfig, registry: Arc<DeviceRegistry>) -> Result<Self> {
        let path = config.derivation_path()?;
        let mediator = ChallengeMediator::from_config(&config.passphrase)?;
        let sessions = SessionManager::new(registry, Arc::new(mediator), config.session_policy());
        info!("signing provider ready, path {}", path);
        Ok(Self::new(Arc::new(sessions), Arc::new(AccountCache::new()), path))
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    pub fn cache(&self) -> &Arc<AccountCache> {
        &self.cache
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn state(&self) -> ProviderState {
        if self.sessions.active_sessions() > 0 {
            ProviderState::SigningInProgress
        } else if self.sessions.registry().current_device().is_ok() {
            ProviderState::DeviceReady
        } else {
            ProviderState::NoDevice
        }
    }

    /// 默认路径上的账户
    pub async fn get_accounts(&self) -> Result<Vec<String>> {
        self.get_accounts_at(&self.path).await
    }

    /// 指定路径上的账户；命中缓存时不访问设备
    pub async fn get_accounts_at(&self, path: &DerivationPath) -> Result<Vec<String>> {
        let path = path.clone();
        let cache = Arc::clone(&self.cache);

        let address = self
            .sessions
            .run_exclusive(|session| async move {
                if let Some(address) = cache.get(session.device_id(), &path) {
                    debug!("account cache hit for {} on {}", path, session.device_id());
                    return Ok(address);
                }
                let raw = session.ethereum_get_address(&path, false).await?;
                let address = format_address(&raw)?;
                cache.put(session.device_id(), &path, address.clone());
                Ok(address)
            })
            .await?;

        info!("address: {}", address);
        Ok(vec![address])
    }

    /// 由设备签名并返回 `0x` 前缀的已签名交易
    pub async fn sign_transaction(&self, request: &TransactionRequest) -> Result<String> {
        let normalized = request.normalized()?;
        check_encodable(request)?;

        let path = self.path.clone();
        let request = request.clone();
        self.sessions
            .run_exclusive(|session| async move {
                debug!("{:?} -> {:?}", ProviderState::DeviceReady, ProviderState::SigningInProgress);
                let signature = session.ethereum_sign_tx(&path, &normalized).await?;
                assemble_legacy_signed_transaction(&request, &signature)
            })
            .await
    }
}

/// 统一为 `0x` + 小写十六进制
fn format_address(raw: &str) -> Result<String> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if digits.len() != ADDRESS_HEX_LEN || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProviderError::DeviceFailure(format!("malformed address from device: {:?}", raw)));
    }
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("9858EfFD232B4033E47d90003D41EC34EcaEda94" ; "bare checksummed")]
    #[test_case("0x9858effd232b4033e47d90003d41ec34ecaeda94" ; "prefixed")]
    fn test_format_address(raw: &str) {
        assert_eq!(format_address(raw).unwrap(), "0x9858effd232b4033e47d90003d41ec34ecaeda94");
    }

    #[test]
    fn test_malformed_address_rejected() {
        assert!(format_address("0x1234").is_err());
        assert!(format_address(&"zz".repeat(20)).is_err());
    }
}
