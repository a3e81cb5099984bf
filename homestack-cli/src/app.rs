use homestack_core::{config::AppConfig, error::Result, StackError};
use std::path::{Path, PathBuf};

use crate::cli::{BackupArgs, BackupCommand, Commands, ScheduleCommand};
use crate::commands;

pub struct CliApp {
    pub config: AppConfig,
    /// 实际加载的配置文件路径（打包进归档、写入 crontab 条目）
    pub config_path: PathBuf,
}

impl CliApp {
    /// 初始化CLI应用：优先使用 --config 指定的文件，
    /// 不存在时按候选文件名智能查找
    pub async fn new_with_auto_config(preferred: &Path) -> Result<Self> {
        if preferred.exists() {
            let config = AppConfig::load_from_file(preferred)?;
            return Ok(Self {
                config,
                config_path: preferred.to_path_buf(),
            });
        }

        let config = AppConfig::find_and_load_config()?;
        let config_path = AppConfig::find_active_config_path().ok_or(StackError::ConfigNotFound)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    /// 运行应用命令
    pub async fn run_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Init { .. } => unreachable!(), // 已经在 main.rs 中处理
            Commands::Backup(args) => self.run_backup_command(args).await,
        }
    }

    /// 运行备份相关命令
    async fn run_backup_command(&mut self, args: BackupArgs) -> Result<()> {
        if let Some(path) = args.decrypt {
            if args.command.is_some() {
                return Err(StackError::config("--decrypt 不能与备份子命令同时使用"));
            }
            return commands::run_decrypt(self, &path, args.passphrase).await;
        }

        match args.command {
            None => commands::run_backup(self).await,
            Some(BackupCommand::Schedule { action: None }) => {
                commands::run_schedule_add(self).await
            }
            Some(BackupCommand::Schedule {
                action: Some(ScheduleCommand::Clear),
            }) => commands::run_schedule_clear(self).await,
            Some(BackupCommand::Download { remote_file }) => {
                commands::run_download(self, &remote_file).await
            }
        }
    }
}
