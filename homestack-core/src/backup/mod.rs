//! 完整备份流水线：收集 -> 归档 -> 加密 -> 上传 -> 清理 -> 上报。

pub mod archive;
pub mod collector;

pub use archive::ArchiveBuilder;
pub use collector::{BackupOutcome, CollectionOutcome, WorkloadBackupCollector, WorkloadBackupResult};

use crate::config::AppConfig;
use crate::constants::backup as backup_consts;
use crate::crypto::SymmetricEncryptor;
use crate::error::{Result, StackError};
use crate::report::{BackupSummary, Reporter};
use crate::storage::{self, RemoteArchiveStore};
use crate::workload::WorkloadRegistry;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 一次备份运行，以启动时间戳为标识
///
/// 工件生命周期不变量：暂存目录和明文归档在加密归档生成之前
/// 一直保留；加密归档只有在远端上传确认之后才删除。
#[derive(Debug)]
pub struct BackupJob {
    pub timestamp: String,
    pub staging_dir: Option<PathBuf>,
    pub workload_names: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub plaintext_archive: Option<PathBuf>,
    pub encrypted_archive: Option<PathBuf>,
}

impl BackupJob {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now().format(backup_consts::TIMESTAMP_FORMAT).to_string(),
            staging_dir: None,
            workload_names: Vec::new(),
            succeeded: 0,
            failed: 0,
            plaintext_archive: None,
            encrypted_archive: None,
        }
    }
}

impl Default for BackupJob {
    fn default() -> Self {
        Self::new()
    }
}

/// 备份流水线
pub struct BackupPipeline {
    registry: WorkloadRegistry,
    builder: ArchiveBuilder,
    encryptor: SymmetricEncryptor,
    store: RemoteArchiveStore,
    reporter: Arc<dyn Reporter>,
    /// 生效的配置文件路径，打包进归档
    config_path: Option<PathBuf>,
}

impl std::fmt::Debug for BackupPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupPipeline")
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}

impl BackupPipeline {
    /// 从配置构建流水线；口令和 WebDAV 凭据缺失在任何阶段执行
    /// 之前就作为配置错误返回。
    pub fn from_config(
        config: &AppConfig,
        config_path: Option<PathBuf>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        let registry = WorkloadRegistry::from_config(&config.workloads);
        let builder = ArchiveBuilder::new(config.ensure_work_dir()?);
        let encryptor = SymmetricEncryptor::new(config.passphrase()?)?;
        let store = RemoteArchiveStore::new(config.webdav_credentials()?)?;

        Ok(Self {
            registry,
            builder,
            encryptor,
            store,
            reporter,
            config_path,
        })
    }

    /// 执行完整备份
    pub async fn run(&self, cancel: &CancellationToken) -> Result<BackupSummary> {
        let mut job = BackupJob::new();
        job.workload_names = self.registry.iter().map(|w| w.name().to_string()).collect();
        if self.registry.is_empty() {
            tracing::warn!("配置中没有任何工作负载，本次运行不会有成功的备份");
        }
        tracing::info!(
            "开始备份运行 {} ({} 个工作负载)",
            job.timestamp,
            self.registry.len()
        );

        // 阶段一：收集各工作负载的数据导出
        let staging = match self.builder.prepare_staging(&job.timestamp).await {
            Ok(staging) => staging,
            Err(e) => return Err(self.stage_failed("准备暂存目录", e).await),
        };
        job.staging_dir = Some(staging.clone());

        let collector = WorkloadBackupCollector::new(&self.registry);
        let outcome = match collector.collect(cancel, &staging).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.stage_failed("备份收集", e).await),
        };
        job.succeeded = outcome.succeeded();
        job.failed = outcome.failed();

        // 每个失败的工作负载单独上报一个事件
        for result in &outcome.results {
            if result.outcome == BackupOutcome::Failed {
                let detail = result.detail.as_deref().unwrap_or("未知错误");
                self.reporter.workload_failed(&result.name, detail).await;
            }
        }

        if let Err(e) = outcome.ensure_any_success() {
            return Err(self.stage_failed("备份收集", e).await);
        }

        // 阶段二：打包运行环境并压缩归档
        self.builder
            .bundle_runtime_files(&staging, self.config_path.as_deref());
        let included_items = ArchiveBuilder::list_included_items(&staging);

        let plaintext = match self.builder.compress(cancel, &staging).await {
            Ok(path) => path,
            Err(e) => return Err(self.stage_failed("压缩归档", e).await),
        };
        job.plaintext_archive = Some(plaintext.clone());

        // 阶段三：加密；成功后明文归档和暂存目录才会被销毁
        let encrypted = match self.encryptor.encrypt_file(cancel, &plaintext).await {
            Ok(path) => path,
            Err(e) => return Err(self.stage_failed("加密归档", e).await),
        };
        job.plaintext_archive = None;
        job.encrypted_archive = Some(encrypted.clone());

        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            tracing::warn!("清理暂存目录失败: {}", e);
        } else {
            job.staging_dir = None;
        }

        let size_bytes = tokio::fs::metadata(&encrypted).await?.len();
        let sha256 = storage::sha256_file(&encrypted).await?;
        tracing::info!(
            "加密归档就绪: {} ({} 字节, sha256={})",
            encrypted.display(),
            size_bytes,
            sha256
        );

        // 阶段四：上传；确认成功后才能删除本地加密归档
        if let Err(e) = self.store.upload(cancel, &encrypted).await {
            return Err(self.stage_failed("上传归档", e).await);
        }

        if let Err(e) = tokio::fs::remove_file(&encrypted).await {
            tracing::warn!("清理加密归档失败: {}", e);
        } else {
            job.encrypted_archive = None;
        }

        let summary = BackupSummary {
            archive_name: encrypted
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            included_items,
            size_bytes,
            sha256,
            succeeded: job.succeeded,
            failed: job.failed,
            skipped: outcome.skipped(),
            timestamp: job.timestamp.clone(),
        };

        self.reporter.pipeline_succeeded(&summary).await;
        tracing::info!(
            "备份运行 {} 完成: {} 成功, {} 失败",
            summary.timestamp,
            summary.succeeded,
            summary.failed
        );
        Ok(summary)
    }

    /// 致命阶段错误：上报事件并附加阶段上下文
    async fn stage_failed(&self, stage: &str, error: StackError) -> StackError {
        if matches!(error, StackError::Cancelled) {
            return error;
        }
        self.reporter.pipeline_failed(stage, &error.to_string()).await;
        match error {
            // 整体失败保留类型，调用方据此决定退出码语义
            StackError::TotalFailure => StackError::TotalFailure,
            other => StackError::backup(format!("{stage}阶段失败: {other}")),
        }
    }
}
