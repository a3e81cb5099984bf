use crate::constants::{config as config_consts, cron, env as env_consts};
use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 应用配置结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub backup: BackupSettings,
    pub webdav: WebdavConfig,
    #[serde(default)]
    pub reporter: Option<ReporterConfig>,
    #[serde(default)]
    pub workloads: Vec<WorkloadConfig>,
}

/// 备份相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackupSettings {
    /// 备份工作目录（暂存目录和归档文件的生成位置）
    pub work_dir: String,
    /// 定时备份的 cron 表达式
    #[serde(default = "default_cron_expression")]
    pub cron_expression: String,
    /// 对称加密口令，建议通过环境变量 HOMESTACK_PASSPHRASE 注入
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// WebDAV 远端存储配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebdavConfig {
    /// WebDAV 服务地址，例如 https://dav.example.com/homestack
    pub host: String,
    pub username: String,
    /// 密码，建议通过环境变量 HOMESTACK_WEBDAV_PASSWORD 注入
    #[serde(default)]
    pub password: Option<String>,
}

/// 可选的故障上报配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReporterConfig {
    /// 接收事件的 Webhook 地址
    pub webhook_url: String,
}

/// 工作负载配置
///
/// 每个条目对应一个受管服务模块；带有 `backup` 小节的模块具备
/// 备份能力，缺失该小节的模块在备份流程中被跳过。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkloadConfig {
    pub name: String,
    #[serde(default)]
    pub backup: Option<ExecBackupConfig>,
}

/// 基于 kubectl exec 的数据导出配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecBackupConfig {
    /// Kubernetes 命名空间
    #[serde(default)]
    pub namespace: Option<String>,
    /// exec 目标，例如 deploy/postgres 或具体 Pod 名称
    pub target: String,
    /// 容器内执行的导出命令，stdout 即为备份数据流
    pub command: Vec<String>,
    /// 导出文件名，默认 <name>.dump
    #[serde(default)]
    pub output: Option<String>,
}

/// 运行期使用的 WebDAV 凭据（仅存在于内存中）
#[derive(Debug, Clone)]
pub struct WebdavCredentials {
    pub host: String,
    pub username: String,
    pub password: String,
}

fn default_cron_expression() -> String {
    cron::DEFAULT_EXPRESSION.to_string()
}

/// 密钥解析：环境变量优先于配置文件，空字符串视为未设置
fn resolve_secret(from_config: Option<&str>, from_env: Option<String>) -> Option<String> {
    from_env
        .filter(|v| !v.trim().is_empty())
        .or_else(|| from_config.map(str::to_string).filter(|v| !v.trim().is_empty()))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backup: BackupSettings {
                work_dir: "./backups".to_string(),
                cron_expression: default_cron_expression(),
                passphrase: None,
            },
            webdav: WebdavConfig {
                host: String::new(),
                username: String::new(),
                password: None,
            },
            reporter: None,
            workloads: Vec::new(),
        }
    }
}

impl AppConfig {
    /// 智能查找并加载配置文件
    /// 按优先级查找：config.yaml -> homestack.yaml -> .homestack.yaml
    pub fn find_and_load_config() -> Result<Self> {
        for config_file in &config_consts::CANDIDATE_FILES {
            if Path::new(config_file).exists() {
                tracing::info!("找到配置文件: {}", config_file);
                return Self::load_from_file(config_file);
            }
        }

        Err(StackError::ConfigNotFound)
    }

    /// 查找当前生效的配置文件路径（用于打包进归档和生成 crontab 条目）
    pub fn find_active_config_path() -> Option<PathBuf> {
        config_consts::CANDIDATE_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    /// 从指定文件加载配置，并应用环境变量覆盖
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let mut config: AppConfig = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_yaml_with_comments();
        fs::write(&path, content)?;
        Ok(())
    }

    /// 生成带注释的 YAML 配置
    fn to_yaml_with_comments(&self) -> String {
        const TEMPLATE: &str = include_str!("../templates/config.yaml.template");

        TEMPLATE
            .replace("{work_dir}", &self.backup.work_dir)
            .replace("{cron_expression}", &self.backup.cron_expression)
            .replace("{webdav_host}", &self.webdav.host)
            .replace("{webdav_username}", &self.webdav.username)
    }

    /// 应用环境变量覆盖（敏感信息优先取环境变量）
    fn apply_env_overrides(&mut self) {
        self.backup.passphrase = resolve_secret(
            self.backup.passphrase.as_deref(),
            std::env::var(env_consts::PASSPHRASE).ok(),
        );
        self.webdav.password = resolve_secret(
            self.webdav.password.as_deref(),
            std::env::var(env_consts::WEBDAV_PASSWORD).ok(),
        );
    }

    /// 获取加密口令，未配置或为空时报配置错误
    pub fn passphrase(&self) -> Result<String> {
        self.backup
            .passphrase
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                StackError::config(format!(
                    "未配置加密口令，请在配置文件 backup.passphrase 或环境变量 {} 中设置",
                    env_consts::PASSPHRASE
                ))
            })
    }

    /// 获取完整的 WebDAV 凭据，任一字段缺失即报配置错误
    pub fn webdav_credentials(&self) -> Result<WebdavCredentials> {
        if self.webdav.host.trim().is_empty() {
            return Err(StackError::config("未配置 WebDAV 地址 (webdav.host)"));
        }
        if self.webdav.username.trim().is_empty() {
            return Err(StackError::config("未配置 WebDAV 用户名 (webdav.username)"));
        }
        let password = self
            .webdav
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                StackError::config(format!(
                    "未配置 WebDAV 密码，请在配置文件 webdav.password 或环境变量 {} 中设置",
                    env_consts::WEBDAV_PASSWORD
                ))
            })?;

        Ok(WebdavCredentials {
            host: self.webdav.host.trim_end_matches('/').to_string(),
            username: self.webdav.username.clone(),
            password,
        })
    }

    /// 获取备份工作目录
    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.backup.work_dir)
    }

    /// 确保备份工作目录存在
    pub fn ensure_work_dir(&self) -> Result<PathBuf> {
        let dir = self.work_dir();
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
