//! 基于外部 gpg 的对称加密。
//!
//! 口令只通过子进程 stdin 管道传入（`--passphrase-fd 0`），
//! 永远不出现在参数向量里，因此对进程列表不可见。

use crate::constants::tools;
use crate::error::{Result, StackError};
use crate::process;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// 对称加密器
pub struct SymmetricEncryptor {
    passphrase: String,
}

impl SymmetricEncryptor {
    /// 创建加密器；空口令在任何子进程启动之前就被拒绝
    pub fn new(passphrase: impl Into<String>) -> Result<Self> {
        let passphrase = passphrase.into();
        if passphrase.trim().is_empty() {
            return Err(StackError::config("加密口令不能为空"));
        }
        Ok(Self { passphrase })
    }

    /// gpg 对称加密参数（口令不在其中）
    fn encrypt_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "--batch".to_string(),
            "--yes".to_string(),
            "--pinentry-mode".to_string(),
            "loopback".to_string(),
            "--passphrase-fd".to_string(),
            "0".to_string(),
            "--cipher-algo".to_string(),
            "AES256".to_string(),
            "--symmetric".to_string(),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
            input.to_string_lossy().to_string(),
        ]
    }

    /// gpg 解密参数，明文写到 stdout（口令不在其中）
    fn decrypt_args(input: &Path) -> Vec<String> {
        vec![
            "--batch".to_string(),
            "--yes".to_string(),
            "--pinentry-mode".to_string(),
            "loopback".to_string(),
            "--passphrase-fd".to_string(),
            "0".to_string(),
            "-o".to_string(),
            "-".to_string(),
            "--decrypt".to_string(),
            input.to_string_lossy().to_string(),
        ]
    }

    /// 从 stdin 读取 tar 流并解压到目标目录的参数
    fn extract_args(target_dir: &Path) -> Vec<String> {
        vec![
            "-xzf".to_string(),
            "-".to_string(),
            "-C".to_string(),
            target_dir.to_string_lossy().to_string(),
        ]
    }

    /// 把口令写入子进程 stdin 并关闭管道
    async fn feed_passphrase(&self, child: &mut Child) -> Result<()> {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StackError::subprocess("无法获取 gpg 标准输入管道"))?;
        stdin.write_all(self.passphrase.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        // 关闭 stdin，gpg 才能确认口令读取完毕
        drop(stdin);
        Ok(())
    }

    /// 加密归档文件，成功后删除明文归档
    ///
    /// 失败时保留明文归档，便于调用方重试。
    pub async fn encrypt_file(
        &self,
        cancel: &CancellationToken,
        archive: &Path,
    ) -> Result<PathBuf> {
        process::ensure_tool(tools::GPG_BIN)?;

        let mut encrypted = archive.as_os_str().to_owned();
        encrypted.push(crate::constants::backup::ENCRYPTED_SUFFIX);
        let encrypted = PathBuf::from(encrypted);

        tracing::info!("开始加密归档: {}", encrypted.display());

        let mut child = Command::new(tools::GPG_BIN)
            .args(Self::encrypt_args(archive, &encrypted))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // 口令写入等提前返回的错误路径上，句柄销毁即终止子进程
            .kill_on_drop(true)
            .spawn()?;

        self.feed_passphrase(&mut child).await?;

        let stderr_task = drain_stderr(&mut child);
        let status = process::wait_with_cancel(&mut child, tools::GPG_BIN, cancel).await?;
        let stderr_buf = stderr_task.await.unwrap_or_default();
        process::check_status_with_stderr(tools::GPG_BIN, status, &stderr_buf)?;

        // 加密确认成功后才能删除明文归档
        tokio::fs::remove_file(archive).await?;
        tracing::info!("加密完成，已删除明文归档: {}", archive.display());

        Ok(encrypted)
    }

    /// 解密并解压：gpg 的 stdout 直接接到 tar 的 stdin（进程到进程），
    /// 两个子进程的退出状态独立检查，任一非零则整体失败。
    pub async fn decrypt_and_extract(
        &self,
        cancel: &CancellationToken,
        encrypted: &Path,
        target_dir: &Path,
    ) -> Result<()> {
        process::ensure_tool(tools::GPG_BIN)?;
        process::ensure_tool(tools::TAR_BIN)?;

        if !encrypted.exists() {
            return Err(StackError::backup(format!(
                "加密归档不存在: {}",
                encrypted.display()
            )));
        }
        tokio::fs::create_dir_all(target_dir).await?;

        tracing::info!(
            "开始解密并解压: {} -> {}",
            encrypted.display(),
            target_dir.display()
        );

        let mut gpg = Command::new(tools::GPG_BIN)
            .args(Self::decrypt_args(encrypted))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 口令写入/管道接线失败的错误路径上，句柄销毁即终止子进程
            .kill_on_drop(true)
            .spawn()?;

        self.feed_passphrase(&mut gpg).await?;

        let gpg_stdout = gpg
            .stdout
            .take()
            .ok_or_else(|| StackError::subprocess("无法获取 gpg 标准输出管道"))?;
        let gpg_stdout: Stdio = gpg_stdout
            .try_into()
            .map_err(|e| StackError::subprocess(format!("无法连接解密管道: {e}")))?;

        let mut tar = Command::new(tools::TAR_BIN)
            .args(Self::extract_args(target_dir))
            .stdin(gpg_stdout)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let gpg_stderr_task = drain_stderr(&mut gpg);
        let tar_stderr_task = drain_stderr(&mut tar);

        // 两个进程句柄都要等待，即使第一个已经失败，避免遗留孤儿进程
        let gpg_wait = process::wait_with_cancel(&mut gpg, tools::GPG_BIN, cancel).await;
        let tar_wait = process::wait_with_cancel(&mut tar, tools::TAR_BIN, cancel).await;

        let gpg_stderr = gpg_stderr_task.await.unwrap_or_default();
        let tar_stderr = tar_stderr_task.await.unwrap_or_default();

        process::check_status_with_stderr(tools::GPG_BIN, gpg_wait?, &gpg_stderr)?;
        process::check_status_with_stderr(tools::TAR_BIN, tar_wait?, &tar_stderr)?;

        tracing::info!("解密解压完成: {}", target_dir.display());
        Ok(())
    }
}

/// 并发排空子进程 stderr，进程退出后返回其内容
fn drain_stderr(child: &mut Child) -> tokio::task::JoinHandle<Vec<u8>> {
    let mut stderr = child.stderr.take();
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(stderr) = stderr.as_mut() {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_passphrase_rejected_before_spawn() {
        assert!(matches!(
            SymmetricEncryptor::new(""),
            Err(StackError::Config(_))
        ));
        assert!(matches!(
            SymmetricEncryptor::new("   "),
            Err(StackError::Config(_))
        ));
        assert!(SymmetricEncryptor::new("hunter2").is_ok());
    }

    #[test]
    fn test_passphrase_never_in_argv() {
        let encrypt = SymmetricEncryptor::encrypt_args(
            Path::new("/tmp/a.tar.gz"),
            Path::new("/tmp/a.tar.gz.gpg"),
        );
        let decrypt = SymmetricEncryptor::decrypt_args(Path::new("/tmp/a.tar.gz.gpg"));

        for args in [&encrypt, &decrypt] {
            assert!(args.iter().all(|a| !a.contains("top-secret")));
        }
        // 口令只通过管道传入
        assert!(encrypt.contains(&"--passphrase-fd".to_string()));
        assert!(decrypt.contains(&"--passphrase-fd".to_string()));
    }

    #[test]
    fn test_encrypt_args_shape() {
        let args = SymmetricEncryptor::encrypt_args(
            Path::new("/work/global_backup_x.tar.gz"),
            Path::new("/work/global_backup_x.tar.gz.gpg"),
        );

        assert!(args.contains(&"--symmetric".to_string()));
        assert_eq!(args.last().unwrap(), "/work/global_backup_x.tar.gz");
        let o_pos = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o_pos + 1], "/work/global_backup_x.tar.gz.gpg");
    }

    #[test]
    fn test_extract_args_read_from_stdin() {
        let args = SymmetricEncryptor::extract_args(Path::new("/restore"));
        assert_eq!(args, vec!["-xzf", "-", "-C", "/restore"]);
    }

    /// 构造一个真实的压缩归档作为加密测试的输入
    async fn compressed_fixture(work: &Path) -> PathBuf {
        let staging = work.join("global_backup_20260830_120000");
        std::fs::create_dir_all(staging.join("postgres")).unwrap();
        std::fs::write(staging.join("postgres/data.dump"), b"round-trip").unwrap();

        crate::backup::ArchiveBuilder::new(work.to_path_buf())
            .compress(&CancellationToken::new(), &staging)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_round_trip() {
        let work = tempfile::tempdir().unwrap();
        let archive = compressed_fixture(work.path()).await;
        let cancel = CancellationToken::new();

        let encryptor = SymmetricEncryptor::new("hunter2").unwrap();
        let encrypted = encryptor.encrypt_file(&cancel, &archive).await.unwrap();

        // 加密确认成功后明文归档被删除
        assert!(!archive.exists());
        assert_eq!(
            encrypted.file_name().unwrap().to_string_lossy(),
            "global_backup_20260830_120000.tar.gz.gpg"
        );

        let restore = work.path().join("restore");
        encryptor
            .decrypt_and_extract(&cancel, &encrypted, &restore)
            .await
            .unwrap();

        // 同一口令解密解压后目录树逐字节还原
        assert_eq!(
            std::fs::read(restore.join("global_backup_20260830_120000/postgres/data.dump"))
                .unwrap(),
            b"round-trip"
        );
    }

    #[tokio::test]
    async fn test_wrong_passphrase_fails_before_extraction() {
        let work = tempfile::tempdir().unwrap();
        let archive = compressed_fixture(work.path()).await;
        let cancel = CancellationToken::new();

        let encrypted = SymmetricEncryptor::new("hunter2")
            .unwrap()
            .encrypt_file(&cancel, &archive)
            .await
            .unwrap();

        let restore = work.path().join("restore");
        let err = SymmetricEncryptor::new("not-the-passphrase")
            .unwrap()
            .decrypt_and_extract(&cancel, &encrypted, &restore)
            .await
            .unwrap_err();

        assert!(matches!(err, StackError::Subprocess(_)));
        // 解密失败时目标目录里没有任何解出的文件
        let extracted: Vec<_> = std::fs::read_dir(&restore).unwrap().collect();
        assert!(extracted.is_empty());
    }
}
