//! 设备发起的交互挑战（PIN / passphrase）
//!
//! 设备端通过 [`ChallengeRequest`] 发起挑战并等待 [`PendingChallenge`]；
//! [`ChallengeMediator`] 负责应答。每个挑战的 responder 只能被调用一次：
//! 第二次调用返回 [`ProviderError::ChallengeAlreadyResolved`]，
//! 未调用就被丢弃时设备端收到 [`ProviderError::ChallengeAbandoned`]。

pub mod mediator;
pub mod passphrase;

pub use mediator::{ChallengeHandler, ChallengeMediator};
pub use passphrase::{FilePassphrase, PassphraseResolver, PromptPassphrase};

use crate::core::errors::{ProviderError, Result};
use secrecy::SecretString;
use tokio::sync::oneshot;
use tracing::warn;

/// 挑战类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Pin,
    Passphrase,
}

type Answer = Result<SecretString>;

/// 一次性应答回调
#[derive(Debug)]
pub struct ChallengeResponder {
    kind: ChallengeKind,
    tx: Option<oneshot::Sender<Answer>>,
}

impl ChallengeResponder {
    pub fn kind(&self) -> ChallengeKind {
        self.kind
    }

    /// 应答挑战；同一 responder 第二次调用会failed
    pub fn resolve(&mut self, answer: Answer) -> Result<()> {
        let tx = self.tx.take().ok_or(ProviderError::ChallengeAlreadyResolved)?;
        // 设备端已放弃等待时忽略
        let _ = tx.send(answer);
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.is_none()
    }
}

impl Drop for ChallengeResponder {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            warn!("⚠️ {:?} challenge dropped without a response", self.kind);
            let _ = tx.send(Err(ProviderError::ChallengeAbandoned));
        }
    }
}

/// 设备发起的挑战
#[derive(Debug)]
pub enum ChallengeRequest {
    Pin(ChallengeResponder),
    Passphrase(ChallengeResponder),
}

impl ChallengeRequest {
    /// 创建 PIN 挑战
    pub fn pin() -> (Self, PendingChallenge) {
        let (responder, pending) = channel(ChallengeKind::Pin);
        (Self::Pin(responder), pending)
    }

    /// 创建 passphrase 挑战
    pub fn passphrase() -> (Self, PendingChallenge) {
        let (responder, pending) = channel(ChallengeKind::Passphrase);
        (Self::Passphrase(responder), pending)
    }

    pub fn kind(&self) -> ChallengeKind {
        match self {
            Self::Pin(_) => ChallengeKind::Pin,
            Self::Passphrase(_) => ChallengeKind::Passphrase,
        }
    }
}

/// 设备端等待的应答
#[derive(Debug)]
pub struct PendingChallenge {
    rx: oneshot::Receiver<Answer>,
}

impl PendingChallenge {
    pub async fn answer(self) -> Answer {
        self.rx.await.unwrap_or(Err(ProviderError::ChallengeAbandoned))
    }
}

fn channel(kind: ChallengeKind) -> (ChallengeResponder, PendingChallenge) {
    let (tx, rx) = oneshot::channel();
    (ChallengeResponder { kind, tx: Some(tx) }, PendingChallenge { rx })
}
