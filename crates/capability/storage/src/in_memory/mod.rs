//! 内存存储实现模块
//!
//! 用于守护进程本地运行与测试。
//!
//! 包含以下实现：
//! - DatasourceStore: InMemoryDatasourceStore
//! - DeviceStore + DeviceDefinitionStore: InMemoryDeviceStore
//! - ReadingStore: InMemoryReadingStore
//! - DeviceStateStore: InMemoryDeviceStateStore
//! - DriverDefinitionStore: InMemoryDriverDefinitionStore
//! - DeviceCommandStore: InMemoryDeviceCommandStore

pub mod command;
pub mod datasource;
pub mod device;
pub mod device_state;
pub mod driver_definition;
pub mod reading;

pub use command::*;
pub use datasource::*;
pub use device::*;
pub use device_state::*;
pub use driver_definition::*;
pub use reading::*;
