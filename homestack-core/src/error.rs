use thiserror::Error;

pub type Result<T> = std::result::Result<T, StackError>;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("配置文件未找到")]
    ConfigNotFound,

    #[error("配置解析错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP 请求错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL 错误: {0}")]
    Url(#[from] url::ParseError),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("目录遍历错误: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("外部命令执行失败: {0}")]
    Subprocess(String),

    #[error("网络传输失败: {0}")]
    Network(String),

    #[error("远端文件不存在: {0}")]
    RemoteNotFound(String),

    #[error("WebDAV 认证失败: {0}")]
    Unauthorized(String),

    #[error("备份操作失败: {0}")]
    Backup(String),

    #[error("所有工作负载备份均失败")]
    TotalFailure,

    #[error("操作被取消")]
    Cancelled,

    #[error("定时任务操作失败: {0}")]
    Schedule(String),

    #[error("自定义错误: {0}")]
    Custom(String),
}

impl StackError {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn subprocess(msg: impl Into<String>) -> Self {
        Self::Subprocess(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn backup(msg: impl Into<String>) -> Self {
        Self::Backup(msg.into())
    }

    pub fn schedule(msg: impl Into<String>) -> Self {
        Self::Schedule(msg.into())
    }
}
