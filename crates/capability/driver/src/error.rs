//! 驱动错误类型定义

/// 驱动错误
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// 注册表中不存在该驱动
    #[error("driver not found: {0}")]
    NotFound(String),

    /// 驱动未连接
    #[error("driver not connected")]
    NotConnected,

    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 配置错误
    #[error("config error: {0}")]
    Config(String),

    /// 驱动不支持的操作
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}
