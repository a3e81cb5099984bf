use crate::app::CliApp;
use homestack_core::{error::Result, schedule::ScheduleManager};
use tracing::info;

fn manager_for(app: &CliApp) -> ScheduleManager {
    ScheduleManager::new(
        app.config_path.clone(),
        app.config.backup.cron_expression.clone(),
    )
}

/// 写入托管的定时备份条目
pub async fn run_schedule_add(app: &CliApp) -> Result<()> {
    info!("⏰ 写入定时备份条目");
    info!("   cron 表达式: {}", app.config.backup.cron_expression);

    manager_for(app).add().await?;

    info!("✅ 定时备份已启用");
    info!("💡 移除定时备份: homestack-cli backup schedule clear");
    info!(
        "💡 cron 环境没有交互终端，建议设置 {} 让日志落盘",
        homestack_core::constants::env::LOG_FILE
    );
    Ok(())
}

/// 移除所有托管的定时备份条目
pub async fn run_schedule_clear(app: &CliApp) -> Result<()> {
    info!("⏰ 清理定时备份条目");

    manager_for(app).clear().await?;
    Ok(())
}
