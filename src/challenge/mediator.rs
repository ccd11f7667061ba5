//! 挑战应答
//!
//! PIN 一律拒绝：PIN 必须在设备自身的可信屏幕/按键上输入，不经过主机。
//! Passphrase 交给配置的 resolver；未配置时返回 [`ProviderError::NoPassphraseResolver`]。

use super::passphrase::{FilePassphrase, PassphraseResolver, PromptPassphrase};
use super::{ChallengeRequest, ChallengeResponder};
use crate::core::config::{PassphraseConfig, PassphraseSource};
use crate::core::errors::{ProviderError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// 设备 I/O 遇到挑战时调用的处理器
#[async_trait]
pub trait ChallengeHandler: Send + Sync {
    async fn handle(&self, request: ChallengeRequest);
}

/// 挑战中介
#[derive(Clone, Default)]
pub struct ChallengeMediator {
    passphrase: Option<Arc<dyn PassphraseResolver>>,
}

impl ChallengeMediator {
    pub fn new(passphrase: Option<Arc<dyn PassphraseResolver>>) -> Self {
        Self { passphrase }
    }

    /// 不配置 passphrase resolver
    pub fn without_passphrase() -> Self {
        Self::default()
    }

    pub fn with_passphrase(resolver: Arc<dyn PassphraseResolver>) -> Self {
        Self::new(Some(resolver))
    }

    /// 按配置构建 resolver
    pub fn from_config(config: &PassphraseConfig) -> Result<Self> {
        let resolver: Option<Arc<dyn PassphraseResolver>> = match config.source {
            PassphraseSource::None => None,
            PassphraseSource::Prompt => Some(Arc::new(PromptPassphrase::stdin())),
            PassphraseSource::File => {
                let path = match &config.file {
                    Some(path) => path.clone(),
                    None => FilePassphrase::default_location().ok_or_else(|| {
                        ProviderError::Config("no platform config directory for passphrase file".to_string())
                    })?,
                };
                Some(Arc::new(FilePassphrase::new(path)))
            }
        };
        Ok(Self::new(resolver))
    }

    pub fn has_passphrase_resolver(&self) -> bool {
        self.passphrase.is_some()
    }

    async fn answer_passphrase(&self, responder: &mut ChallengeResponder) -> Result<()> {
        let answer = match &self.passphrase {
            Some(resolver) => {
                debug!("passphrase challenge -> {} resolver", resolver.name());
                resolver.resolve().await
            }
            None => {
                warn!("⚠️ passphrase requested but no resolver configured");
                Err(ProviderError::NoPassphraseResolver)
            }
        };
        responder.resolve(answer)
    }
}

#[async_trait]
impl ChallengeHandler for ChallengeMediator {
    async fn handle(&self, request: ChallengeRequest) {
        let outcome = match request {
            ChallengeRequest::Pin(mut responder) => {
                warn!("⚠️ 不支持通过主机输入 PIN，请在设备上解锁");
                responder.resolve(Err(ProviderError::PinEntryUnsupported))
            }
            ChallengeRequest::Passphrase(mut responder) => self.answer_passphrase(&mut responder).await,
        };
        if let Err(e) = outcome {
            error!("challenge responder misuse: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::{ExposeSecret, SecretString};
    use std::io::Cursor;

    struct Fixed(&'static str);

    #[async_trait]
    impl PassphraseResolver for Fixed {
        async fn resolve(&self) -> Result<SecretString> {
            Ok(SecretString::new(self.0.to_string()))
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_pin_always_refused() {
        let mediator = ChallengeMediator::with_passphrase(Arc::new(Fixed("1234")));
        let (request, pending) = ChallengeRequest::pin();
        mediator.handle(request).await;
        assert_eq!(pending.answer().await.unwrap_err(), ProviderError::PinEntryUnsupported);
    }

    #[tokio::test]
    async fn test_passphrase_without_resolver_fails() {
        let mediator = ChallengeMediator::without_passphrase();
        let (request, pending) = ChallengeRequest::passphrase();
        mediator.handle(request).await;
        assert_eq!(pending.answer().await.unwrap_err(), ProviderError::NoPassphraseResolver);
    }

    #[tokio::test]
    async fn test_passphrase_from_prompt() {
        let prompt = PromptPassphrase::from_reader(Cursor::new("secret words\n"));
        let mediator = ChallengeMediator::with_passphrase(Arc::new(prompt));
        let (request, pending) = ChallengeRequest::passphrase();
        mediator.handle(request).await;
        assert_eq!(pending.answer().await.unwrap().expose_secret(), "secret words");
    }

    #[test]
    fn test_from_config_none() {
        let mediator = ChallengeMediator::from_config(&PassphraseConfig::default()).unwrap();
        assert!(!mediator.has_passphrase_resolver());
    }

    #[test]
    fn test_from_config_file() {
        let config = PassphraseConfig {
            source: PassphraseSource::File,
            file: Some("/tmp/does-not-need-to-exist".into()),
        };
        let mediator = ChallengeMediator::from_config(&config).unwrap();
        assert!(mediator.has_passphrase_resolver());
    }
}
