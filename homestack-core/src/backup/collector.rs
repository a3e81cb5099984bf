use crate::error::{Result, StackError};
use crate::workload::WorkloadRegistry;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// 单个工作负载的备份结果
#[derive(Debug, Clone)]
pub struct WorkloadBackupResult {
    pub name: String,
    pub outcome: BackupOutcome,
    /// 失败时的错误详情
    pub detail: Option<String>,
}

/// 备份结果类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    Succeeded,
    Failed,
    /// 模块未实现备份能力，跳过
    Skipped,
}

/// 一轮收集的聚合结果
#[derive(Debug, Clone, Default)]
pub struct CollectionOutcome {
    pub results: Vec<WorkloadBackupResult>,
}

impl CollectionOutcome {
    pub fn succeeded(&self) -> usize {
        self.count(BackupOutcome::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(BackupOutcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(BackupOutcome::Skipped)
    }

    fn count(&self, outcome: BackupOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// 成功的工作负载名称（写入成功上报事件）
    pub fn succeeded_names(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.outcome == BackupOutcome::Succeeded)
            .map(|r| r.name.clone())
            .collect()
    }

    /// 零成功即为致命的整体失败
    pub fn ensure_any_success(&self) -> Result<()> {
        if self.succeeded() == 0 {
            return Err(StackError::TotalFailure);
        }
        Ok(())
    }
}

/// 工作负载备份收集器
///
/// 依次调用注册表中每个具备备份能力的模块，把数据导出到暂存目录
/// 下的独立子目录。单个模块的失败只做局部恢复（记日志、计数、
/// 继续循环），从不中断整体流程。
pub struct WorkloadBackupCollector<'a> {
    registry: &'a WorkloadRegistry,
}

impl<'a> WorkloadBackupCollector<'a> {
    pub fn new(registry: &'a WorkloadRegistry) -> Self {
        Self { registry }
    }

    pub async fn collect(
        &self,
        cancel: &CancellationToken,
        staging_dir: &Path,
    ) -> Result<CollectionOutcome> {
        let mut outcome = CollectionOutcome::default();

        for workload in self.registry.iter() {
            let name = workload.name().to_string();

            let Some(capability) = workload.backup() else {
                tracing::info!("工作负载 {} 未实现备份能力，跳过", name);
                outcome.results.push(WorkloadBackupResult {
                    name,
                    outcome: BackupOutcome::Skipped,
                    detail: None,
                });
                continue;
            };

            // 每个工作负载只写入自己的子目录
            let dest_dir = staging_dir.join(&name);

            let result = async {
                tokio::fs::create_dir_all(&dest_dir).await?;
                capability.backup(cancel, &dest_dir).await
            }
            .await;

            match result {
                Ok(()) => {
                    tracing::info!("工作负载 {} 备份成功", name);
                    outcome.results.push(WorkloadBackupResult {
                        name,
                        outcome: BackupOutcome::Succeeded,
                        detail: None,
                    });
                }
                // 取消不是工作负载故障，直接终止整轮收集
                Err(StackError::Cancelled) => return Err(StackError::Cancelled),
                Err(e) => {
                    tracing::error!("工作负载 {} 备份失败: {}", name, e);
                    outcome.results.push(WorkloadBackupResult {
                        name,
                        outcome: BackupOutcome::Failed,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }

        tracing::info!(
            "备份收集完成: {} 成功, {} 失败, {} 跳过",
            outcome.succeeded(),
            outcome.failed(),
            outcome.skipped()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{BackupCapability, Workload};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// 测试用工作负载：写一个固定文件或返回失败
    struct FakeWorkload {
        name: String,
        mode: FakeMode,
    }

    enum FakeMode {
        Succeed,
        Fail,
        NoCapability,
    }

    impl FakeWorkload {
        fn new(name: &str, mode: FakeMode) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                mode,
            })
        }
    }

    impl Workload for FakeWorkload {
        fn name(&self) -> &str {
            &self.name
        }

        fn backup(&self) -> Option<&dyn BackupCapability> {
            match self.mode {
                FakeMode::NoCapability => None,
                _ => Some(self),
            }
        }
    }

    #[async_trait]
    impl BackupCapability for FakeWorkload {
        async fn backup(&self, _cancel: &CancellationToken, dest_dir: &Path) -> Result<()> {
            match self.mode {
                FakeMode::Succeed => {
                    tokio::fs::write(dest_dir.join("data.dump"), b"dump").await?;
                    Ok(())
                }
                FakeMode::Fail => Err(StackError::backup("导出命令退出状态异常")),
                FakeMode::NoCapability => unreachable!(),
            }
        }
    }

    fn registry_of(workloads: Vec<Arc<FakeWorkload>>) -> WorkloadRegistry {
        let mut registry = WorkloadRegistry::new();
        for w in workloads {
            registry.register(w);
        }
        registry
    }

    #[tokio::test]
    async fn test_partial_failure_is_recovered_locally() {
        let staging = tempfile::tempdir().unwrap();
        let registry = registry_of(vec![
            FakeWorkload::new("postgres", FakeMode::Succeed),
            FakeWorkload::new("gitea", FakeMode::Fail),
            FakeWorkload::new("redis", FakeMode::Succeed),
        ]);

        let outcome = WorkloadBackupCollector::new(&registry)
            .collect(&CancellationToken::new(), staging.path())
            .await
            .unwrap();

        assert_eq!(outcome.succeeded(), 2);
        assert_eq!(outcome.failed(), 1);
        assert!(outcome.ensure_any_success().is_ok());
        // 失败结果携带错误详情
        let failed = outcome
            .results
            .iter()
            .find(|r| r.outcome == BackupOutcome::Failed)
            .unwrap();
        assert_eq!(failed.name, "gitea");
        assert!(failed.detail.is_some());
    }

    #[tokio::test]
    async fn test_workloads_without_capability_are_skipped() {
        let staging = tempfile::tempdir().unwrap();
        let registry = registry_of(vec![
            FakeWorkload::new("postgres", FakeMode::Succeed),
            FakeWorkload::new("gitea", FakeMode::Succeed),
            FakeWorkload::new("static-site", FakeMode::NoCapability),
        ]);

        let outcome = WorkloadBackupCollector::new(&registry)
            .collect(&CancellationToken::new(), staging.path())
            .await
            .unwrap();

        assert_eq!(outcome.succeeded(), 2);
        assert_eq!(outcome.failed(), 0);
        assert_eq!(outcome.skipped(), 1);

        // 暂存目录只包含两个成功模块的子目录
        assert!(staging.path().join("postgres/data.dump").exists());
        assert!(staging.path().join("gitea/data.dump").exists());
        assert!(!staging.path().join("static-site").exists());
    }

    #[tokio::test]
    async fn test_zero_success_is_total_failure() {
        let staging = tempfile::tempdir().unwrap();
        let registry = registry_of(vec![
            FakeWorkload::new("postgres", FakeMode::Fail),
            FakeWorkload::new("gitea", FakeMode::Fail),
        ]);

        let outcome = WorkloadBackupCollector::new(&registry)
            .collect(&CancellationToken::new(), staging.path())
            .await
            .unwrap();

        assert!(matches!(
            outcome.ensure_any_success(),
            Err(StackError::TotalFailure)
        ));
    }

    #[tokio::test]
    async fn test_all_skipped_counts_as_total_failure() {
        let staging = tempfile::tempdir().unwrap();
        let registry = registry_of(vec![FakeWorkload::new("static-site", FakeMode::NoCapability)]);

        let outcome = WorkloadBackupCollector::new(&registry)
            .collect(&CancellationToken::new(), staging.path())
            .await
            .unwrap();

        assert_eq!(outcome.skipped(), 1);
        assert!(matches!(
            outcome.ensure_any_success(),
            Err(StackError::TotalFailure)
        ));
    }
}
