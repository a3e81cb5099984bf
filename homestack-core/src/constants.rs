/// 备份归档相关常量
pub mod backup {
    /// 归档文件名前缀
    pub const ARCHIVE_PREFIX: &str = "global_backup_";

    /// 归档时间戳格式（同时作为备份任务的标识）
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// 压缩归档扩展名
    pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

    /// 加密归档追加的扩展名
    pub const ENCRYPTED_SUFFIX: &str = ".gpg";

    /// 根据时间戳生成暂存目录名
    pub fn staging_dir_name(timestamp: &str) -> String {
        format!("{ARCHIVE_PREFIX}{timestamp}")
    }

    /// 根据时间戳生成压缩归档文件名
    pub fn archive_file_name(timestamp: &str) -> String {
        format!("{ARCHIVE_PREFIX}{timestamp}{ARCHIVE_SUFFIX}")
    }
}

/// 定时任务相关常量
pub mod cron {
    /// 写入 crontab 的托管标记，用于识别并清理本工具创建的条目
    pub const MANAGED_TAG: &str = "homestack-managed-backup";

    /// 默认的备份 cron 表达式（每天凌晨 2 点）
    pub const DEFAULT_EXPRESSION: &str = "0 2 * * *";

    /// 标准 cron 表达式字段数: 分 时 日 月 周
    pub const CRON_FIELDS_COUNT: usize = 5;
}

/// 外部命令名称
pub mod tools {
    /// 对称加密命令
    pub const GPG_BIN: &str = "gpg";

    /// 压缩/解压命令
    pub const TAR_BIN: &str = "tar";

    /// 系统定时任务命令
    pub const CRONTAB_BIN: &str = "crontab";

    /// Kubernetes 命令行客户端（工作负载数据导出）
    pub const KUBECTL_BIN: &str = "kubectl";
}

/// 环境变量名称（敏感信息只允许从配置文件或环境变量进入内存）
pub mod env {
    /// 加密口令
    pub const PASSPHRASE: &str = "HOMESTACK_PASSPHRASE";

    /// WebDAV 密码
    pub const WEBDAV_PASSWORD: &str = "HOMESTACK_WEBDAV_PASSWORD";

    /// 日志文件路径，设置后日志输出到文件而非终端
    pub const LOG_FILE: &str = "HOMESTACK_LOG_FILE";
}

/// 配置文件相关常量
pub mod config {
    /// 按优先级查找的配置文件名
    pub const CANDIDATE_FILES: [&str; 3] = ["config.yaml", "homestack.yaml", ".homestack.yaml"];

    /// 默认配置文件名
    pub const DEFAULT_FILE: &str = "config.yaml";
}
