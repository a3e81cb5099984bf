//! 可选的故障/成功事件上报。
//!
//! 上报器以可空依赖的方式注入流水线：未配置时使用 [`NoopReporter`]，
//! 而不是在流程里散落 `if configured` 判断。上报自身的任何失败都
//! 只告警，绝不升级为进程失败。

use crate::config::ReporterConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// 上报请求的超时时间，同时充当进程退出前的有界冲刷窗口
const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// 一次成功备份的摘要（随成功事件上报，也用于 CLI 输出）
#[derive(Debug, Clone, Serialize)]
pub struct BackupSummary {
    pub archive_name: String,
    pub included_items: Vec<String>,
    pub size_bytes: u64,
    pub sha256: String,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timestamp: String,
}

/// 遥测事件接收方
#[async_trait]
pub trait Reporter: Send + Sync {
    /// 单个工作负载备份失败
    async fn workload_failed(&self, workload: &str, detail: &str);

    /// 流水线某阶段的致命失败（含整体失败）
    async fn pipeline_failed(&self, stage: &str, detail: &str);

    /// 流水线完整成功
    async fn pipeline_succeeded(&self, summary: &BackupSummary);
}

/// 未配置上报时的空实现
pub struct NoopReporter;

#[async_trait]
impl Reporter for NoopReporter {
    async fn workload_failed(&self, _workload: &str, _detail: &str) {}
    async fn pipeline_failed(&self, _stage: &str, _detail: &str) {}
    async fn pipeline_succeeded(&self, _summary: &BackupSummary) {}
}

/// 把事件以 JSON POST 到 Webhook 的上报器
pub struct WebhookReporter {
    client: reqwest::Client,
    url: String,
}

impl WebhookReporter {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REPORT_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn deliver(&self, payload: serde_json::Value) {
        let result = self.client.post(&self.url).json(&payload).send().await;
        match result {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!("事件上报被拒绝: HTTP {}", response.status());
            }
            Err(e) => {
                tracing::warn!("事件上报失败: {}", e);
            }
            Ok(_) => {}
        }
    }
}

#[async_trait]
impl Reporter for WebhookReporter {
    async fn workload_failed(&self, workload: &str, detail: &str) {
        self.deliver(serde_json::json!({
            "event": "workload_backup_failed",
            "workload": workload,
            "detail": detail,
        }))
        .await;
    }

    async fn pipeline_failed(&self, stage: &str, detail: &str) {
        self.deliver(serde_json::json!({
            "event": "backup_pipeline_failed",
            "stage": stage,
            "detail": detail,
        }))
        .await;
    }

    async fn pipeline_succeeded(&self, summary: &BackupSummary) {
        let payload = match serde_json::to_value(summary) {
            Ok(mut value) => {
                value["event"] = "backup_pipeline_succeeded".into();
                value
            }
            Err(e) => {
                tracing::warn!("成功事件序列化失败: {}", e);
                return;
            }
        };
        self.deliver(payload).await;
    }
}

/// 根据配置构建上报器；初始化失败只告警并退化为空实现
pub fn build_reporter(config: Option<&ReporterConfig>) -> Arc<dyn Reporter> {
    match config {
        Some(reporter) => match WebhookReporter::new(&reporter.webhook_url) {
            Ok(webhook) => Arc::new(webhook),
            Err(e) => {
                tracing::warn!("上报器初始化失败，事件上报被禁用: {}", e);
                Arc::new(NoopReporter)
            }
        },
        None => Arc::new(NoopReporter),
    }
}
