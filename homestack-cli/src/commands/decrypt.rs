use crate::app::CliApp;
use crate::commands::cancel_on_ctrl_c;
use homestack_core::{crypto::SymmetricEncryptor, error::Result};
use std::path::Path;
use tracing::info;

/// 解密并解压本地的加密归档
///
/// 归档内部自带 global_backup_<时间戳>/ 顶层目录，因此直接解压到
/// 当前工作目录即可保持内容收拢在一个目录里。
pub async fn run_decrypt(app: &CliApp, path: &Path, passphrase: Option<String>) -> Result<()> {
    // 口令优先级: --passphrase 参数 > 配置文件/环境变量
    let passphrase = match passphrase {
        Some(p) => p,
        None => app.config.passphrase()?,
    };

    // 空口令在这里被拒绝，任何子进程都不会启动
    let encryptor = SymmetricEncryptor::new(passphrase)?;

    info!("🔓 解密归档: {}", path.display());
    let target = std::env::current_dir()?;
    let cancel = cancel_on_ctrl_c();
    encryptor.decrypt_and_extract(&cancel, path, &target).await?;

    info!("✅ 解密解压完成，内容位于当前目录下的归档同名目录中");
    Ok(())
}
