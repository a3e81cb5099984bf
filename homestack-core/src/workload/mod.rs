//! 工作负载注册表与备份能力边界。
//!
//! 每个受管服务模块实现 [`Workload`]；是否参与备份通过类型化的
//! 能力探测 [`Workload::backup`] 决定，而不是硬编码的模块列表。

mod exec;

pub use exec::ExecWorkload;

use crate::config::WorkloadConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 备份能力：把自身数据导出到调用方提供的目录
#[async_trait]
pub trait BackupCapability: Send + Sync {
    async fn backup(&self, cancel: &CancellationToken, dest_dir: &Path) -> Result<()>;
}

/// 受管的服务模块
pub trait Workload: Send + Sync {
    fn name(&self) -> &str;

    /// 类型化的能力探测：支持备份的模块返回 Some
    fn backup(&self) -> Option<&dyn BackupCapability> {
        None
    }
}

/// 工作负载注册表
#[derive(Clone, Default)]
pub struct WorkloadRegistry {
    workloads: Vec<Arc<dyn Workload>>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从配置构建注册表
    pub fn from_config(configs: &[WorkloadConfig]) -> Self {
        let mut registry = Self::new();
        for config in configs {
            registry.register(Arc::new(ExecWorkload::new(config.clone())));
        }
        registry
    }

    pub fn register(&mut self, workload: Arc<dyn Workload>) {
        self.workloads.push(workload);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Workload>> {
        self.workloads.iter()
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkloadConfig;

    #[test]
    fn test_registry_from_config_counts() {
        let empty = WorkloadRegistry::from_config(&[]);
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);

        let configs = vec![
            WorkloadConfig {
                name: "postgres".to_string(),
                backup: None,
            },
            WorkloadConfig {
                name: "gitea".to_string(),
                backup: None,
            },
        ];
        let registry = WorkloadRegistry::from_config(&configs);

        assert!(!registry.is_empty());
        assert_eq!(registry.len(), 2);
        let names: Vec<&str> = registry.iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["postgres", "gitea"]);
    }
}
