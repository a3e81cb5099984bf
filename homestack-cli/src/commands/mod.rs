mod backup;
mod decrypt;
mod download;
mod schedule;

// Backup commands
pub use backup::run_backup;

// Restore commands
pub use decrypt::run_decrypt;
pub use download::run_download;

// Schedule commands
pub use schedule::{run_schedule_add, run_schedule_clear};

use tokio_util::sync::CancellationToken;

/// 创建取消令牌并在收到 Ctrl-C 时触发取消。
/// 流水线中所有在途子进程都会随取消被终止。
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到 Ctrl-C，正在取消当前操作...");
            handle.cancel();
        }
    });
    token
}
