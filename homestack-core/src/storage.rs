//! WebDAV 远端归档存储。
//!
//! 上传和下载都是流式的：上传通过 `ReaderStream` 把本地文件逐块
//! 推给传输层，下载逐块落盘，两个方向都不会把整个归档读进内存。
//! 不内置重试，网络失败以类型化错误传播，由调用方决定是否重试。

use crate::config::WebdavCredentials;
use crate::error::{Result, StackError};
use futures_util::StreamExt;
use reqwest::{Body, Client, StatusCode};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use url::Url;

/// 下载进度日志间隔（每 50MB 记录一次）
const PROGRESS_BYTES_INTERVAL: u64 = 50 * 1024 * 1024;

/// 远端归档存储（WebDAV, HTTP Basic Auth）
pub struct RemoteArchiveStore {
    base: Url,
    username: String,
    password: String,
    client: Client,
}

impl RemoteArchiveStore {
    pub fn new(credentials: WebdavCredentials) -> Result<Self> {
        let base = Url::parse(&credentials.host)?;
        let client = Client::builder()
            // 大归档传输依赖调用方的取消信号，这里只设置连接超时
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base,
            username: credentials.username,
            password: credentials.password,
            client,
        })
    }

    /// 远端资源地址: <host>/<basename>
    fn remote_url(&self, name: &str) -> Result<Url> {
        let joined = format!("{}/{}", self.base.as_str().trim_end_matches('/'), name);
        Ok(Url::parse(&joined)?)
    }

    /// 归一化远端路径并提取本地文件名。
    /// 归一化结果为 `.`、`..`、`/` 时拒绝执行。
    pub fn local_name_for(remote_path: &str) -> Result<String> {
        let trimmed = remote_path.trim();
        let name = Path::new(trimmed)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| n != "." && n != ".." && !n.is_empty());

        name.ok_or_else(|| StackError::backup(format!("非法的远端路径: {remote_path:?}")))
    }

    /// 以创建或覆盖语义上传归档（PUT /<basename>），文件内容流式传输
    pub async fn upload(&self, cancel: &CancellationToken, file: &Path) -> Result<()> {
        let name = Self::local_name_for(&file.to_string_lossy())?;
        let url = self.remote_url(&name)?;
        let size = tokio::fs::metadata(file).await?.len();

        tracing::info!("开始上传归档: {} ({} 字节)", name, size);

        let reader = tokio::fs::File::open(file).await?;
        let body = Body::wrap_stream(ReaderStream::new(reader));

        let request = self
            .client
            .put(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(body)
            .send();

        let response = tokio::select! {
            result = request => result.map_err(|e| StackError::network(format!("上传失败: {e}")))?,
            _ = cancel.cancelled() => return Err(StackError::Cancelled),
        };

        Self::check_response_status(&name, response.status())?;
        tracing::info!("归档上传完成: {}", name);
        Ok(())
    }

    /// 下载远端归档到目标目录，逐块流式落盘。
    /// 拒绝覆盖同名的已有本地文件。
    pub async fn download(
        &self,
        cancel: &CancellationToken,
        remote_path: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let name = Self::local_name_for(remote_path)?;
        let local_path = dest_dir.join(&name);

        if local_path.exists() {
            return Err(StackError::backup(format!(
                "本地文件已存在，拒绝覆盖: {}",
                local_path.display()
            )));
        }

        let url = self.remote_url(&name)?;
        tracing::info!("开始下载归档: {}", name);

        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| StackError::network(format!("下载请求失败: {e}")))?;

        Self::check_response_status(&name, response.status())?;

        let total = response.content_length().unwrap_or(0);
        let mut file = tokio::fs::File::create(&local_path).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let mut last_logged = 0u64;

        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = cancel.cancelled() => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&local_path).await;
                    return Err(StackError::Cancelled);
                }
            };

            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| StackError::network(format!("下载中断: {e}")))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if downloaded - last_logged >= PROGRESS_BYTES_INTERVAL {
                last_logged = downloaded;
                if total > 0 {
                    tracing::info!(
                        "下载进度: {:.1}% ({}/{} 字节)",
                        downloaded as f64 * 100.0 / total as f64,
                        downloaded,
                        total
                    );
                } else {
                    tracing::info!("下载进度: {} 字节", downloaded);
                }
            }
        }

        file.flush().await?;
        tracing::info!("归档下载完成: {} ({} 字节)", local_path.display(), downloaded);
        Ok(local_path)
    }

    /// 把 HTTP 状态码映射为类型化错误
    fn check_response_status(name: &str, status: StatusCode) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StackError::Unauthorized(
                format!("WebDAV 拒绝访问 {name}: HTTP {status}"),
            )),
            StatusCode::NOT_FOUND => Err(StackError::RemoteNotFound(name.to_string())),
            _ => Err(StackError::network(format!(
                "WebDAV 响应异常 {name}: HTTP {status}"
            ))),
        }
    }
}

/// 计算文件的 SHA-256 摘要（十六进制），用于成功上报事件
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name_normalization() {
        assert_eq!(
            RemoteArchiveStore::local_name_for("global_backup_x.tar.gz.gpg").unwrap(),
            "global_backup_x.tar.gz.gpg"
        );
        assert_eq!(
            RemoteArchiveStore::local_name_for("backups/2026/global_backup_x.tar.gz.gpg").unwrap(),
            "global_backup_x.tar.gz.gpg"
        );
        assert_eq!(
            RemoteArchiveStore::local_name_for("  name.gpg  ").unwrap(),
            "name.gpg"
        );
    }

    #[test]
    fn test_local_name_refusals() {
        for bad in [".", "..", "/", "", "   ", "a/.."] {
            assert!(
                RemoteArchiveStore::local_name_for(bad).is_err(),
                "应当拒绝: {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_download_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("exists.gpg"), b"old").unwrap();

        let store = RemoteArchiveStore::new(WebdavCredentials {
            host: "https://dav.example.com/homestack".to_string(),
            username: "alice".to_string(),
            password: "secret".to_string(),
        })
        .unwrap();

        let err = store
            .download(&CancellationToken::new(), "exists.gpg", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::Backup(_)));
        // 原文件内容未被触碰
        assert_eq!(std::fs::read(dir.path().join("exists.gpg")).unwrap(), b"old");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            RemoteArchiveStore::check_response_status("a", StatusCode::UNAUTHORIZED),
            Err(StackError::Unauthorized(_))
        ));
        assert!(matches!(
            RemoteArchiveStore::check_response_status("a", StatusCode::NOT_FOUND),
            Err(StackError::RemoteNotFound(_))
        ));
        assert!(matches!(
            RemoteArchiveStore::check_response_status("a", StatusCode::BAD_GATEWAY),
            Err(StackError::Network(_))
        ));
        assert!(RemoteArchiveStore::check_response_status("a", StatusCode::CREATED).is_ok());
    }

    #[tokio::test]
    async fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"homestack").unwrap();

        let digest = sha256_file(&path).await.unwrap();
        assert_eq!(digest.len(), 64);
        // 同一内容摘要稳定
        assert_eq!(digest, sha256_file(&path).await.unwrap());
    }
}
