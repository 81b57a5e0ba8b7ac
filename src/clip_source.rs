use crate::error::MergeError;
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// クリップ取得元の共通トレイト
///
/// URLやパスで指定されたクリップの生バイト列を返す。
#[async_trait]
pub trait ClipSource: Send + Sync {
    /// クリップを取得
    ///
    /// 取得できない場合（HTTPエラー、ファイルなし）は `MergeError::Fetch`
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, MergeError>;
}

/// HTTP(S) 経由でクリップを取得
pub struct HttpClipSource {
    client: reqwest::Client,
}

impl HttpClipSource {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("クリップ取得用HTTPクライアント作成失敗")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ClipSource for HttpClipSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, MergeError> {
        let fetch_error = |reason: String| MergeError::Fetch {
            location: location.to_string(),
            reason,
        };

        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(format!("レスポンス読み込み失敗: {}", e)))?;

        log::debug!("HTTP取得完了: {} ({} バイト)", location, bytes.len());
        Ok(bytes.to_vec())
    }
}

/// ローカルディレクトリからクリップを取得
///
/// Web層が返す `/audio/<name>` 形式のパスも `<root>/<name>` として解決する。
pub struct FileClipSource {
    root: PathBuf,
}

impl FileClipSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// 取得元パスを解決
    ///
    /// 絶対パスで実在するファイルはそのまま使う。それ以外は
    /// ファイル名部分を `root` 配下として扱う。
    pub fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() && path.exists() {
            return path.to_path_buf();
        }
        if path.is_relative() && !path.components().any(|c| c == Component::ParentDir) {
            let joined = self.root.join(path);
            if joined.exists() {
                return joined;
            }
        }
        match path.file_name() {
            Some(name) => self.root.join(name),
            None => self.root.join(location),
        }
    }
}

#[async_trait]
impl ClipSource for FileClipSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, MergeError> {
        let path = self.resolve(location);
        let bytes = tokio::fs::read(&path).await.map_err(|e| MergeError::Fetch {
            location: location.to_string(),
            reason: format!("{:?}: {}", path, e),
        })?;
        log::debug!("ファイル取得完了: {:?} ({} バイト)", path, bytes.len());
        Ok(bytes)
    }
}

/// `http://` / `https://` はHTTP、それ以外はローカルファイルとして取得
pub struct AnyClipSource {
    http: HttpClipSource,
    file: FileClipSource,
}

impl AnyClipSource {
    pub fn new<P: AsRef<Path>>(root: P, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpClipSource::new(timeout)?,
            file: FileClipSource::new(root),
        })
    }
}

fn is_http(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[async_trait]
impl ClipSource for AnyClipSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, MergeError> {
        if is_http(location) {
            self.http.fetch(location).await
        } else {
            self.file.fetch(location).await
        }
    }
}

/// メモリ上のクリップ（テスト・組み込み用）
#[derive(Default)]
pub struct MemoryClipSource {
    clips: HashMap<String, Vec<u8>>,
}

impl MemoryClipSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: impl Into<String>, bytes: Vec<u8>) {
        self.clips.insert(location.into(), bytes);
    }
}

#[async_trait]
impl ClipSource for MemoryClipSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, MergeError> {
        self.clips
            .get(location)
            .cloned()
            .ok_or_else(|| MergeError::Fetch {
                location: location.to_string(),
                reason: "クリップが登録されていません".to_string(),
            })
    }
}
