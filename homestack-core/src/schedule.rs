//! 系统 crontab 中定时备份条目的管理。
//!
//! 核心是两个纯文本变换（追加条目 / 按托管标记过滤），所有 I/O
//! 都推到边缘的 `crontab -l` / `crontab -` 子进程调用，因此变换
//! 本身无需真实调度器即可测试。
//!
//! 注意：对 crontab 的读和写之间没有事务隔离，并发的外部编辑
//! 遵循“后写者胜”。单操作者工具可以接受，见设计文档。

use crate::constants::{cron, tools};
use crate::error::{Result, StackError};
use crate::process;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// 定时任务管理器
pub struct ScheduleManager {
    /// 生效的配置文件路径（写入 crontab 条目）
    config_path: PathBuf,
    /// cron 表达式
    cron_expression: String,
}

impl ScheduleManager {
    pub fn new(config_path: PathBuf, cron_expression: String) -> Self {
        Self {
            config_path,
            cron_expression,
        }
    }

    /// 追加一条托管的定时备份条目
    ///
    /// 注意：不做重复检测，重复调用会累积多条托管条目；
    /// `clear` 一次即可全部移除。
    pub async fn add(&self) -> Result<()> {
        process::ensure_tool(tools::CRONTAB_BIN)?;

        if !validate_cron_expression(&self.cron_expression) {
            return Err(StackError::schedule(format!(
                "无效的 cron 表达式: {}",
                self.cron_expression
            )));
        }

        // 写入 crontab 的路径必须是绝对路径，且符号链接已解析
        let binary = process::resolve_current_exe()
            .map_err(|e| StackError::schedule(format!("无法定位当前可执行文件: {e}")))?;
        let config = std::fs::canonicalize(&self.config_path).map_err(|e| {
            StackError::schedule(format!(
                "无法解析配置文件路径 {}: {e}",
                self.config_path.display()
            ))
        })?;

        let command = build_command(&binary, &config);
        let line = build_entry_line(&self.cron_expression, &command, cron::MANAGED_TAG);

        let current = read_crontab().await?;
        let updated = append_entry(&current, &line);
        write_crontab(&updated).await?;

        tracing::info!("已写入定时备份条目: {}", line);
        Ok(())
    }

    /// 移除所有带托管标记的条目，其余行（含空行结构）逐字节保留。
    /// 没有托管条目时只告警，不执行写入。
    pub async fn clear(&self) -> Result<()> {
        process::ensure_tool(tools::CRONTAB_BIN)?;

        let current = read_crontab().await?;
        let (updated, removed) = remove_tagged_lines(&current, cron::MANAGED_TAG);

        if removed == 0 {
            tracing::warn!("未找到托管的定时备份条目，无需清理");
            return Ok(());
        }

        write_crontab(&updated).await?;
        tracing::info!("已移除 {} 条托管的定时备份条目", removed);
        Ok(())
    }
}

/// 构建定时任务执行的完整命令
pub fn build_command(binary: &Path, config: &Path) -> String {
    format!(
        "{} --config {} backup",
        binary.display(),
        config.display()
    )
}

/// 构建完整的 crontab 行: `<cron-expr> <command> # <managed-tag>`
pub fn build_entry_line(expression: &str, command: &str, tag: &str) -> String {
    format!("{expression} {command} # {tag}")
}

/// 纯文本变换：在现有 crontab 末尾追加一行。
/// 现有内容缺少结尾换行时先补齐。
pub fn append_entry(current: &str, line: &str) -> String {
    let mut updated = current.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(line);
    updated.push('\n');
    updated
}

/// 纯文本变换：过滤掉所有包含托管标记的行，返回新文本和移除行数。
/// 其余行的顺序和空行结构保持不变。
pub fn remove_tagged_lines(current: &str, tag: &str) -> (String, usize) {
    let had_trailing_newline = current.ends_with('\n');
    let total = current.lines().count();
    let kept: Vec<&str> = current.lines().filter(|l| !l.contains(tag)).collect();
    let removed = total - kept.len();

    let mut updated = kept.join("\n");
    if had_trailing_newline && !updated.is_empty() {
        updated.push('\n');
    }
    (updated, removed)
}

/// 验证 cron 表达式格式
fn validate_cron_expression(expr: &str) -> bool {
    // 标准 cron 表达式应该有 5 个字段: 分 时 日 月 周
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() != cron::CRON_FIELDS_COUNT {
        return false;
    }
    parts.iter().all(|p| !p.is_empty())
}

/// 读取现有 crontab；"no crontab for user" 视为空表
async fn read_crontab() -> Result<String> {
    let output = Command::new(tools::CRONTAB_BIN)
        .arg("-l")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.to_lowercase().contains("no crontab") {
        return Ok(String::new());
    }

    Err(StackError::schedule(format!(
        "读取 crontab 失败: {}",
        stderr.trim()
    )))
}

/// 以单次完整写入替换整张 crontab
async fn write_crontab(content: &str) -> Result<()> {
    let mut child = Command::new(tools::CRONTAB_BIN)
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| StackError::subprocess("无法获取 crontab 标准输入管道"))?;
    stdin.write_all(content.as_bytes()).await?;
    drop(stdin);

    let output = child.wait_with_output().await?;
    process::check_status_with_stderr(tools::CRONTAB_BIN, output.status, &output.stderr)
        .map_err(|e| StackError::schedule(e.to_string()))
}
