//! 可编程的模拟设备
//!
//! 用于测试与 demo：记录调用次数和 I/O 顺序，可注入延迟、挂起、failed以及 PIN/passphrase 挑战。

use super::device::DeviceTransport;
use super::path::DerivationPath;
use crate::challenge::{ChallengeHandler, ChallengeRequest};
use crate::codec::{NormalizedTransaction, SignatureResult};
use crate::core::errors::{ProviderError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// BIP39 "abandon ... about" 在 m/44'/60'/0'/0/0 的address
pub const DEFAULT_ADDRESS: &str = "9858effd232b4033e47d90003d41ec34ecaeda94";

/// 挑战注入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockChallenge {
    Pin,
    Passphrase,
}

/// 模拟设备
#[derive(Clone)]
pub struct MockDevice {
    inner: Arc<MockInner>,
}

struct MockInner {
    default_address: String,
    addresses: Mutex<HashMap<DerivationPath, String>>,
    signature: Mutex<SignatureResult>,
    latency: Mutex<Option<Duration>>,
    challenge: Mutex<Option<MockChallenge>>,
    fail_next: Mutex<Option<ProviderError>>,
    hold: Mutex<bool>,
    entered: Notify,
    released: Notify,
    address_calls: AtomicUsize,
    sign_calls: AtomicUsize,
    log: Mutex<Vec<String>>,
    signed: Mutex<Vec<NormalizedTransaction>>,
    passphrases: Mutex<Vec<String>>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_address(DEFAULT_ADDRESS)
    }

    /// 所有路径默认返回 `address`
    pub fn with_address(address: &str) -> Self {
        Self {
            inner: Arc::new(MockInner {
                default_address: address.to_string(),
                addresses: Mutex::new(HashMap::new()),
                signature: Mutex::new(SignatureResult {
                    v: 37,
                    r: "0xbf102036c4c1d09b980801dd71748a55c56b9df26e9c0d4c95cdf3e33a27147f".to_string(),
                    s: "0x75907e1ef77b1e1bfb8b708b671729fb41c5b4031ef1baca3a9ff70931d2880c".to_string(),
                }),
                latency: Mutex::new(None),
                challenge: Mutex::new(None),
                fail_next: Mutex::new(None),
                hold: Mutex::new(false),
                entered: Notify::new(),
                released: Notify::new(),
                address_calls: AtomicUsize::new(0),
                sign_calls: AtomicUsize::new(0),
                log: Mutex::new(Vec::new()),
                signed: Mutex::new(Vec::new()),
                passphrases: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn set_address(&self, path: DerivationPath, address: &str) {
        self.inner.addresses.lock().insert(path, address.to_string());
    }

    pub fn set_signature(&self, signature: SignatureResult) {
        *self.inner.signature.lock() = signature;
    }

    /// 每次调用的设备耗时
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = Some(latency);
    }

    /// 每次调用前先发起挑战
    pub fn set_challenge(&self, challenge: Option<MockChallenge>) {
        *self.inner.challenge.lock() = challenge;
    }

    /// 下一次调用返回 `error`
    pub fn fail_next(&self, error: ProviderError) {
        *self.inner.fail_next.lock() = Some(error);
    }

    /// 挂起后续调用，直到 [`MockDevice::release`]
    pub fn hold(&self) {
        *self.inner.hold.lock() = true;
    }

    pub fn release(&self) {
        *self.inner.hold.lock() = false;
        self.inner.released.notify_waiters();
    }

    /// 等待某个调用进入设备
    pub async fn entered(&self) {
        self.inner.entered.notified().await
    }

    pub fn address_calls(&self) -> usize {
        self.inner.address_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.inner.sign_calls.load(Ordering::SeqCst)
    }

    /// 设备 I/O 日志（`begin:<tag>` / `end:<tag>`）
    pub fn io_log(&self) -> Vec<String> {
        self.inner.log.lock().clone()
    }

    pub fn signed(&self) -> Vec<NormalizedTransaction> {
        self.inner.signed.lock().clone()
    }

    /// 设备收到的 passphrase（仅测试观察用）
    pub fn received_passphrases(&self) -> Vec<String> {
        self.inner.passphrases.lock().clone()
    }

    async fn interact(&self, tag: &str, challenges: &dyn ChallengeHandler) -> Result<()> {
        self.inner.log.lock().push(format!("begin:{}", tag));
        self.inner.entered.notify_one();

        let result = self.device_side(challenges).await;

        self.inner.log.lock().push(format!("end:{}", tag));
        result
    }

    async fn device_side(&self, challenges: &dyn ChallengeHandler) -> Result<()> {
        let challenge = *self.inner.challenge.lock();
        match challenge {
            Some(MockChallenge::Pin) => {
                let (request, pending) = ChallengeRequest::pin();
                challenges.handle(request).await;
                pending.answer().await?;
            }
            Some(MockChallenge::Passphrase) => {
                let (request, pending) = ChallengeRequest::passphrase();
                challenges.handle(request).await;
                let secret = pending.answer().await?;
                self.inner.passphrases.lock().push(secret.expose_secret().clone());
            }
            None => {}
        }

        loop {
            let released = self.inner.released.notified();
            if !*self.inner.hold.lock() {
                break;
            }
            released.await;
        }

        let latency = *self.inner.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match self.inner.fail_next.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeviceTransport for MockDevice {
    async fn ethereum_get_address(
        &self,
        path: &DerivationPath,
        _show_display: bool,
        challenges: &dyn ChallengeHandler,
    ) -> Result<String> {
        self.inner.address_calls.fetch_add(1, Ordering::SeqCst);
        self.interact(&format!("address:{}", path), challenges).await?;
        let address = self.inner.addresses.lock().get(path).cloned();
        Ok(address.unwrap_or_else(|| self.inner.default_address.clone()))
    }

    async fn ethereum_sign_tx(
        &self,
        _path: &DerivationPath,
        tx: &NormalizedTransaction,
        challenges: &dyn ChallengeHandler,
    ) -> Result<SignatureResult> {
        self.inner.sign_calls.fetch_add(1, Ordering::SeqCst);
        let tag = format!("sign:{}", tx.nonce.as_deref().unwrap_or("-"));
        self.interact(&tag, challenges).await?;
        self.inner.signed.lock().push(tx.clone());
        let signature = self.inner.signature.lock().clone();
        Ok(signature)
    }
}
