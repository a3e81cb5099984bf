use homestack_core::{config::AppConfig, constants::config as config_consts, error::Result};
use tracing::{info, warn};

/// 运行独立的初始化流程
pub async fn run_init(force: bool) -> Result<()> {
    info!("🏠 Homestack 初始化");
    info!("====================");

    // 检查是否已经初始化过
    if !force && AppConfig::find_active_config_path().is_some() {
        warn!("⚠️  检测到已存在的配置文件");
        info!("如果您要重新初始化，请使用 --force 参数");
        info!("示例: homestack-cli init --force");
        return Ok(());
    }

    info!("📋 步骤 1: 创建配置文件");

    let config = AppConfig::default();
    config.save_to_file(config_consts::DEFAULT_FILE)?;
    info!("   ✅ 创建配置文件: {}", config_consts::DEFAULT_FILE);

    info!("📋 步骤 2: 创建备份工作目录");

    let work_dir = config.ensure_work_dir()?;
    info!("   ✅ 创建目录: {} (暂存目录和归档生成位置)", work_dir.display());

    info!("🎉 初始化完成！接下来:");
    info!("   1. 编辑 {} 填写 WebDAV 地址和工作负载列表", config_consts::DEFAULT_FILE);
    info!(
        "   2. 通过环境变量注入敏感信息: {} / {}",
        homestack_core::constants::env::PASSPHRASE,
        homestack_core::constants::env::WEBDAV_PASSWORD
    );
    info!("   3. 执行 homestack-cli backup 验证完整流水线");
    info!("   4. 执行 homestack-cli backup schedule 写入定时任务");

    Ok(())
}
