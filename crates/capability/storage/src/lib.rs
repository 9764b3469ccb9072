//! # 采集存储模块
//!
//! 采集引擎的持久化协作方抽象：引擎只通过这里的 Trait 读写领域记录，
//! 不关心具体后端。
//!
//! ## 模块说明
//!
//! - [`traits`]：存储接口定义（数据源、设备、设备类型、读数、设备状态、驱动元数据、命令）
//! - [`error`]：存储错误类型定义
//! - [`in_memory`]：内存存储实现
//!   - 使用 `RwLock<HashMap>` / `RwLock<Vec>` 提供线程安全的内存存储
//!   - 适用于单元测试、集成测试和本地守护进程
//!
//! ## 约定
//!
//! - 读数在写入时补齐派生字段（ID、时间戳、UTC 分桶、元 ID）
//! - 命令的瞬态字段（信号定义/配置）不落库
//! - 更新接口对不存在的记录返回 `Ok(None)`，而非错误

pub mod error;
pub mod in_memory;
pub mod traits;

pub use error::*;
pub use traits::*;

pub use in_memory::{
    InMemoryDatasourceStore, InMemoryDeviceCommandStore, InMemoryDeviceStateStore,
    InMemoryDeviceStore, InMemoryDriverDefinitionStore, InMemoryReadingStore,
};
