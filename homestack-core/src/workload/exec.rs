use crate::config::{ExecBackupConfig, WorkloadConfig};
use crate::constants::tools;
use crate::error::{Result, StackError};
use crate::process;
use crate::workload::{BackupCapability, Workload};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// 基于 kubectl exec 的工作负载
///
/// 在容器内执行配置的导出命令，把命令的标准输出以流式方式写入
/// 暂存目录下的导出文件。没有 backup 配置的模块注册后不具备
/// 备份能力，会在收集阶段被跳过。
pub struct ExecWorkload {
    config: WorkloadConfig,
}

impl ExecWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }

    /// 导出文件名，默认 <name>.dump
    fn output_file_name(&self, backup: &ExecBackupConfig) -> String {
        backup
            .output
            .clone()
            .unwrap_or_else(|| format!("{}.dump", self.config.name))
    }

    /// 构建 kubectl exec 参数向量
    fn exec_args(backup: &ExecBackupConfig) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if let Some(namespace) = &backup.namespace {
            args.push("-n".to_string());
            args.push(namespace.clone());
        }
        args.push(backup.target.clone());
        args.push("--".to_string());
        args.extend(backup.command.iter().cloned());
        args
    }
}

impl Workload for ExecWorkload {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn backup(&self) -> Option<&dyn BackupCapability> {
        // 能力由配置决定：缺失 backup 小节即不支持备份
        self.config.backup.as_ref()?;
        Some(self)
    }
}

#[async_trait]
impl BackupCapability for ExecWorkload {
    async fn backup(&self, cancel: &CancellationToken, dest_dir: &Path) -> Result<()> {
        let backup = self
            .config
            .backup
            .as_ref()
            .ok_or_else(|| StackError::backup(format!("工作负载 {} 未配置导出命令", self.config.name)))?;

        if backup.command.is_empty() {
            return Err(StackError::config(format!(
                "工作负载 {} 的导出命令为空",
                self.config.name
            )));
        }

        process::ensure_tool(tools::KUBECTL_BIN)?;

        let output_path = dest_dir.join(self.output_file_name(backup));
        let args = Self::exec_args(backup);

        tracing::debug!(
            workload = %self.config.name,
            target = %backup.target,
            "执行数据导出: {} {}",
            tools::KUBECTL_BIN,
            args.join(" ")
        );

        let mut child = Command::new(tools::KUBECTL_BIN)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| StackError::subprocess("无法获取 kubectl 标准输出管道"))?;
        let mut file = tokio::fs::File::create(&output_path).await?;

        // 导出数据直接从子进程管道流入文件，不在内存中整体缓冲；
        // 长时间的数据流依赖取消信号终止
        let copied = tokio::select! {
            result = tokio::io::copy(&mut stdout, &mut file) => result?,
            _ = cancel.cancelled() => {
                tracing::warn!(workload = %self.config.name, "收到取消信号，终止数据导出");
                let _ = child.kill().await;
                return Err(StackError::Cancelled);
            }
        };
        drop(stdout);

        let output = child.wait_with_output().await?;
        process::check_status_with_stderr(
            &format!("{} exec ({})", tools::KUBECTL_BIN, self.config.name),
            output.status,
            &output.stderr,
        )?;

        tracing::info!(
            workload = %self.config.name,
            bytes = copied,
            "数据导出完成: {}",
            output_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_backup() -> ExecBackupConfig {
        ExecBackupConfig {
            namespace: Some("db".to_string()),
            target: "deploy/postgres".to_string(),
            command: vec!["pg_dumpall".to_string(), "-U".to_string(), "app".to_string()],
            output: None,
        }
    }

    #[test]
    fn test_exec_args_layout() {
        let args = ExecWorkload::exec_args(&sample_backup());

        assert_eq!(
            args,
            vec!["exec", "-n", "db", "deploy/postgres", "--", "pg_dumpall", "-U", "app"]
        );
    }

    #[test]
    fn test_exec_args_without_namespace() {
        let mut backup = sample_backup();
        backup.namespace = None;
        let args = ExecWorkload::exec_args(&backup);

        assert_eq!(args[..2], ["exec".to_string(), "deploy/postgres".to_string()]);
    }

    #[test]
    fn test_capability_follows_config() {
        let with_backup = ExecWorkload::new(WorkloadConfig {
            name: "postgres".to_string(),
            backup: Some(sample_backup()),
        });
        let without_backup = ExecWorkload::new(WorkloadConfig {
            name: "static-site".to_string(),
            backup: None,
        });

        assert!(Workload::backup(&with_backup).is_some());
        assert!(Workload::backup(&without_backup).is_none());
    }

    #[test]
    fn test_default_output_file_name() {
        let workload = ExecWorkload::new(WorkloadConfig {
            name: "postgres".to_string(),
            backup: Some(sample_backup()),
        });

        assert_eq!(workload.output_file_name(&sample_backup()), "postgres.dump");
    }
}
