use crate::app::CliApp;
use crate::commands::cancel_on_ctrl_c;
use homestack_core::{backup::BackupPipeline, error::Result, report::build_reporter};
use tracing::{error, info, warn};

/// 执行完整备份流水线
pub async fn run_backup(app: &CliApp) -> Result<()> {
    info!("💾 开始完整备份流水线");
    info!("======================");

    let reporter = build_reporter(app.config.reporter.as_ref());
    let pipeline =
        BackupPipeline::from_config(&app.config, Some(app.config_path.clone()), reporter)?;

    let cancel = cancel_on_ctrl_c();
    match pipeline.run(&cancel).await {
        Ok(summary) => {
            info!("🎉 备份完成！");
            info!("   归档文件: {}", summary.archive_name);
            info!("   文件大小: {:.2} MB", summary.size_bytes as f64 / (1024.0 * 1024.0));
            info!("   SHA-256:  {}", summary.sha256);
            info!("   包含条目: {}", summary.included_items.join(", "));
            info!(
                "   工作负载: {} 成功, {} 失败, {} 跳过",
                summary.succeeded, summary.failed, summary.skipped
            );

            // 部分失败不是致命错误，进程仍以 0 退出
            if summary.failed > 0 {
                warn!("⚠️  有 {} 个工作负载备份失败，详情见上方日志", summary.failed);
            }
            Ok(())
        }
        Err(e) => {
            error!("❌ 备份流水线失败: {}", e);
            info!("💡 请检查:");
            info!("   - 工作负载的导出命令是否可用");
            info!("   - gpg / tar 是否已安装");
            info!("   - WebDAV 地址和凭据是否正确");
            Err(e)
        }
    }
}
