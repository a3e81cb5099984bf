//! 外部命令执行的公共辅助函数。
//!
//! 所有子进程都通过这里的等待函数退出，保证取消信号到达时
//! 在途的子进程被终止而不是被遗留为孤儿进程。

use crate::error::{Result, StackError};
use std::process::ExitStatus;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;

/// 解析符号链接后的当前可执行文件绝对路径
pub fn resolve_current_exe() -> std::io::Result<std::path::PathBuf> {
    let exe = std::env::current_exe()?;
    std::fs::canonicalize(exe)
}

/// 确认外部命令存在于 PATH 中
pub fn ensure_tool(name: &str) -> Result<()> {
    which::which(name)
        .map(|_| ())
        .map_err(|_| StackError::subprocess(format!("{name} 未安装或不在 PATH 中")))
}

/// 等待子进程退出；收到取消信号时先终止子进程再返回
pub async fn wait_with_cancel(
    child: &mut Child,
    name: &str,
    cancel: &CancellationToken,
) -> Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => Ok(status?),
        _ = cancel.cancelled() => {
            tracing::warn!("收到取消信号，终止子进程: {}", name);
            let _ = child.kill().await;
            Err(StackError::Cancelled)
        }
    }
}

/// 校验退出状态，失败时附带 stderr 内容
pub fn check_status_with_stderr(name: &str, status: ExitStatus, stderr: &[u8]) -> Result<()> {
    if status.success() {
        return Ok(());
    }

    let detail = String::from_utf8_lossy(stderr);
    let detail = detail.trim();
    if detail.is_empty() {
        Err(StackError::subprocess(format!("{name} 退出状态异常: {status}")))
    } else {
        Err(StackError::subprocess(format!("{name} 失败: {detail}")))
    }
}
