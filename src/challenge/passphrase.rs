//! Passphrase 来源
//!
//! 交互式输入（从可信输入流读取一行）或本地文件。文件在第一次挑战时才读取，只读。

use crate::core::errors::{ProviderError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// 默认 passphrase 文件位置（相对于平台配置目录）
pub const PASSPHRASE_DIR: &str = "trezor-provider";
pub const PASSPHRASE_FILE: &str = "passphrase";

/// Passphrase resolver
#[async_trait]
pub trait PassphraseResolver: Send + Sync {
    async fn resolve(&self) -> Result<SecretString>;

    /// 日志中使用的名称
    fn name(&self) -> &'static str;
}

/// 交互式 passphrase：每次挑战读取一行
///
/// 读取在阻塞线程池上进行，无法中途取消。挑战被放弃（如设备断开）时，
/// 未完成的读取会保留下来，其结果交给下一次挑战，输入的行不会被丢弃。
pub struct PromptPassphrase {
    reader: Arc<Mutex<Box<dyn BufRead + Send>>>,
    inflight: AsyncMutex<Option<JoinHandle<Result<SecretString>>>>,
}

impl PromptPassphrase {
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Arc::new(Mutex::new(Box::new(reader))),
            inflight: AsyncMutex::new(None),
        }
    }

    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(std::io::stdin()))
    }

    fn spawn_read(&self) -> JoinHandle<Result<SecretString>> {
        let reader = Arc::clone(&self.reader);
        tokio::task::spawn_blocking(move || {
            let mut reader = reader.lock();
            let mut line = Zeroizing::new(String::new());
            let read = reader
                .read_line(&mut line)
                .map_err(|e| ProviderError::PassphraseUnavailable(e.to_string()))?;
            if read == 0 {
                return Err(ProviderError::PassphraseUnavailable("input stream closed".to_string()));
            }
            Ok(SecretString::new(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
        })
    }
}

#[async_trait]
impl PassphraseResolver for PromptPassphrase {
    async fn resolve(&self) -> Result<SecretString> {
        let mut inflight = self.inflight.lock().await;
        if inflight.is_some() {
            debug!("reusing passphrase read left over from an abandoned challenge");
        } else {
            info!("🔐 等待输入 passphrase...");
        }
        let read = inflight.get_or_insert_with(|| self.spawn_read());
        // 在此处被取消时句柄留在 inflight 中
        let result = read.await;
        *inflight = None;
        result.map_err(|e| ProviderError::PassphraseUnavailable(e.to_string()))?
    }

    fn name(&self) -> &'static str {
        "prompt"
    }
}

/// 文件 passphrase：首次挑战时懒加载，之后复用
pub struct FilePassphrase {
    path: PathBuf,
    cached: OnceCell<SecretString>,
}

impl FilePassphrase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cached: OnceCell::new() }
    }

    /// `<config dir>/trezor-provider/passphrase`
    pub fn default_location() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(PASSPHRASE_DIR).join(PASSPHRASE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SecretString> {
        let path = self.path.clone();
        debug!("读取 passphrase 文件: {}", path.display());
        tokio::task::spawn_blocking(move || {
            let contents = Zeroizing::new(std::fs::read_to_string(&path).map_err(|e| {
                ProviderError::PassphraseUnavailable(format!("{}: {}", path.display(), e))
            })?);
            // 只去掉结尾换行，保留 passphrase 中的空格
            Ok(SecretString::new(contents.trim_end_matches(&['\r', '\n'][..]).to_string()))
        })
        .await
        .map_err(|e| ProviderError::PassphraseUnavailable(e.to_string()))?
    }
}

#[async_trait]
impl PassphraseResolver for FilePassphrase {
    async fn resolve(&self) -> Result<SecretString> {
        let secret = self.cached.get_or_try_init(|| self.load()).await?;
        Ok(SecretString::new(secret.expose_secret().clone()))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::time::Duration;

    #[tokio::test]
    async fn test_prompt_reads_one_line_per_challenge() {
        let prompt = PromptPassphrase::from_reader(Cursor::new("first\r\nsecond\n"));
        assert_eq!(prompt.resolve().await.unwrap().expose_secret(), "first");
        assert_eq!(prompt.resolve().await.unwrap().expose_secret(), "second");
        let err = prompt.resolve().await.unwrap_err();
        assert!(matches!(err, ProviderError::PassphraseUnavailable(_)));
    }

    /// 按行投递输入的阻塞 reader
    struct LineFeed {
        lines: std::sync::mpsc::Receiver<Vec<u8>>,
        buffered: Vec<u8>,
    }

    impl std::io::Read for LineFeed {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.buffered.is_empty() {
                match self.lines.recv() {
                    Ok(line) => self.buffered = line,
                    Err(_) => return Ok(0),
                }
            }
            let n = buf.len().min(self.buffered.len());
            buf[..n].copy_from_slice(&self.buffered[..n]);
            self.buffered.drain(..n);
            Ok(n)
        }
    }

    #[tokio::test]
    async fn test_abandoned_prompt_hands_line_to_next_challenge() {
        let (feed, lines) = std::sync::mpsc::channel();
        let prompt = PromptPassphrase::from_reader(BufReader::new(LineFeed { lines, buffered: Vec::new() }));

        // 挑战被放弃，读取仍在阻塞线程上等待输入
        let abandoned = tokio::time::timeout(Duration::from_millis(50), prompt.resolve()).await;
        assert!(abandoned.is_err());

        feed.send(b"typed late\n".to_vec()).unwrap();
        assert_eq!(prompt.resolve().await.unwrap().expose_secret(), "typed late");

        feed.send(b"next\n".to_vec()).unwrap();
        assert_eq!(prompt.resolve().await.unwrap().expose_secret(), "next");
    }

    #[tokio::test]
    async fn test_file_is_loaded_lazily_and_cached() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "correct horse ").unwrap();
        let source = FilePassphrase::new(file.path());

        assert_eq!(source.resolve().await.unwrap().expose_secret(), "correct horse ");

        // 已缓存：文件删除后仍可用
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
        assert_eq!(source.resolve().await.unwrap().expose_secret(), "correct horse ");
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = FilePassphrase::new(dir.path().join("absent"));
        let err = source.resolve().await.unwrap_err();
        assert!(matches!(err, ProviderError::PassphraseUnavailable(_)));
    }

    #[test]
    fn test_default_location_shape() {
        if let Some(path) = FilePassphrase::default_location() {
            assert!(path.ends_with("trezor-provider/passphrase"));
        }
    }
}
