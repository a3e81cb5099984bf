use crate::constants::{backup as backup_consts, tools};
use crate::error::Result;
use crate::process;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// 归档构建器
///
/// 负责按运行时间戳创建暂存目录、把当前可执行文件和生效的配置
/// 文件打包进去，并调用外部 tar 生成压缩归档。压缩由 tar 自身
/// 流式完成，本进程不缓冲归档内容。
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    work_dir: PathBuf,
}

impl ArchiveBuilder {
    pub fn new(work_dir: PathBuf) -> Self {
        Self { work_dir }
    }

    /// 创建全新的暂存目录（残留的同名目录先清空）
    pub async fn prepare_staging(&self, timestamp: &str) -> Result<PathBuf> {
        let staging = self
            .work_dir
            .join(backup_consts::staging_dir_name(timestamp));

        if staging.exists() {
            tracing::warn!("清理上次运行残留的暂存目录: {}", staging.display());
            tokio::fs::remove_dir_all(&staging).await?;
        }
        tokio::fs::create_dir_all(&staging).await?;

        Ok(staging)
    }

    /// 把当前可执行文件（先解析符号链接）和生效配置文件复制进暂存目录。
    /// 任一文件定位或复制失败只告警，备份流程继续。
    pub fn bundle_runtime_files(&self, staging: &Path, config_path: Option<&Path>) {
        match process::resolve_current_exe() {
            Ok(exe) => {
                if let Err(e) = copy_into(&exe, staging) {
                    tracing::warn!("复制可执行文件失败，归档中将不包含它: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("无法定位当前可执行文件，归档中将不包含它: {}", e);
            }
        }

        match config_path {
            Some(config) => {
                if let Err(e) = copy_into(config, staging) {
                    tracing::warn!("复制配置文件失败，归档中将不包含它: {}", e);
                }
            }
            None => {
                tracing::warn!("未找到生效的配置文件，归档中将不包含它");
            }
        }
    }

    /// 调用外部 tar 把暂存目录压缩成归档文件；此步失败是致命错误
    pub async fn compress(&self, cancel: &CancellationToken, staging: &Path) -> Result<PathBuf> {
        process::ensure_tool(tools::TAR_BIN)?;

        let dir_name = staging
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let archive_path = staging.with_extension("tar.gz");

        tracing::info!(
            "开始压缩归档: {} ({} 字节待压缩)",
            archive_path.display(),
            staging_size(staging)
        );

        let mut child = Command::new(tools::TAR_BIN)
            .arg("-czf")
            .arg(&archive_path)
            .arg("-C")
            .arg(&self.work_dir)
            .arg(&dir_name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // stderr 并发排空，避免 tar 写满管道缓冲区
        let mut stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(stderr) = stderr.as_mut() {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = process::wait_with_cancel(&mut child, tools::TAR_BIN, cancel).await?;
        let stderr_buf = stderr_task.await.unwrap_or_default();
        process::check_status_with_stderr(tools::TAR_BIN, status, &stderr_buf)?;

        tracing::info!("压缩归档完成: {}", archive_path.display());
        Ok(archive_path)
    }

    /// 暂存目录中归档条目的名称列表（用于成功上报事件）
    pub fn list_included_items(staging: &Path) -> Vec<String> {
        let mut items: Vec<String> = std::fs::read_dir(staging)
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        items.sort();
        items
    }
}

/// 复制单个文件到目录下，保留权限位（std::fs::copy 语义）
fn copy_into(source: &Path, dest_dir: &Path) -> std::io::Result<u64> {
    let file_name = source.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "源路径没有文件名")
    })?;
    std::fs::copy(source, dest_dir.join(file_name))
}

/// 估算暂存目录总字节数（仅用于日志）
fn staging_size(staging: &Path) -> u64 {
    WalkDir::new(staging)
        .into_iter()
        .flatten()
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
