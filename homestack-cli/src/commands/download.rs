use crate::app::CliApp;
use crate::commands::cancel_on_ctrl_c;
use homestack_core::{error::Result, storage::RemoteArchiveStore};
use std::path::Path;
use tracing::info;

/// 从远端下载加密归档到当前目录
pub async fn run_download(app: &CliApp, remote_file: &str) -> Result<()> {
    info!("⬇️  下载远端归档: {}", remote_file);

    let store = RemoteArchiveStore::new(app.config.webdav_credentials()?)?;
    let cancel = cancel_on_ctrl_c();
    let local_path = store.download(&cancel, remote_file, Path::new(".")).await?;

    info!("✅ 下载完成: {}", local_path.display());
    info!(
        "💡 解密并解压: homestack-cli backup --decrypt {} --passphrase <口令>",
        local_path.display()
    );
    Ok(())
}
