use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Homestack CLI - 个人基础设施备份与调度工具
#[derive(Parser)]
#[command(name = "homestack-cli")]
#[command(about = "个人基础设施备份、恢复与定时调度工具")]
#[command(version)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 首次使用时初始化客户端，创建配置文件
    Init {
        /// 如果配置文件已存在，强制覆盖
        #[arg(long)]
        force: bool,
    },
    /// 备份相关命令（不带子命令时执行完整备份流水线）
    Backup(BackupArgs),
}

#[derive(Args)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: Option<BackupCommand>,

    /// 解密并解压指定的加密归档，不执行备份
    #[arg(long, value_name = "PATH")]
    pub decrypt: Option<PathBuf>,

    /// 解密口令（缺省时使用配置文件或环境变量中的口令）
    #[arg(long, value_name = "PASSPHRASE")]
    pub passphrase: Option<String>,
}

/// 备份相关子命令
#[derive(Subcommand)]
pub enum BackupCommand {
    /// 管理定时备份（不带子命令时写入定时条目）
    Schedule {
        #[command(subcommand)]
        action: Option<ScheduleCommand>,
    },
    /// 从远端下载加密归档
    Download {
        /// 远端文件名，例如 global_backup_20260830_020000.tar.gz.gpg
        remote_file: String,
    },
}

/// 定时备份管理子命令
#[derive(Subcommand)]
pub enum ScheduleCommand {
    /// 移除所有托管的定时备份条目
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_backup() {
        let cli = Cli::try_parse_from(["homestack-cli", "backup"]).unwrap();
        let Commands::Backup(args) = cli.command else {
            panic!("应当解析为 backup 命令");
        };
        assert!(args.command.is_none());
        assert!(args.decrypt.is_none());
    }

    #[test]
    fn test_parse_schedule_and_clear() {
        let cli = Cli::try_parse_from(["homestack-cli", "backup", "schedule"]).unwrap();
        let Commands::Backup(args) = cli.command else {
            panic!()
        };
        assert!(matches!(
            args.command,
            Some(BackupCommand::Schedule { action: None })
        ));

        let cli = Cli::try_parse_from(["homestack-cli", "backup", "schedule", "clear"]).unwrap();
        let Commands::Backup(args) = cli.command else {
            panic!()
        };
        assert!(matches!(
            args.command,
            Some(BackupCommand::Schedule {
                action: Some(ScheduleCommand::Clear)
            })
        ));
    }

    #[test]
    fn test_parse_download() {
        let cli =
            Cli::try_parse_from(["homestack-cli", "backup", "download", "a.tar.gz.gpg"]).unwrap();
        let Commands::Backup(args) = cli.command else {
            panic!()
        };
        assert!(matches!(
            args.command,
            Some(BackupCommand::Download { remote_file }) if remote_file == "a.tar.gz.gpg"
        ));
    }

    #[test]
    fn test_parse_decrypt_allows_empty_passphrase() {
        // 空口令在流水线里被拒绝，参数解析层面允许传入
        let cli = Cli::try_parse_from([
            "homestack-cli",
            "backup",
            "--decrypt",
            "a.tar.gz.gpg",
            "--passphrase",
            "",
        ])
        .unwrap();
        let Commands::Backup(args) = cli.command else {
            panic!()
        };
        assert_eq!(args.decrypt.unwrap(), PathBuf::from("a.tar.gz.gpg"));
        assert_eq!(args.passphrase.as_deref(), Some(""));
    }

    #[test]
    fn test_parse_custom_config_path() {
        let cli =
            Cli::try_parse_from(["homestack-cli", "--config", "/etc/homestack.yaml", "backup"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/homestack.yaml"));
    }
}
