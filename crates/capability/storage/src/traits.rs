//! 存储接口 Trait 定义
//!
//! 采集引擎依赖的持久化协作方接口：
//! - DatasourceStore：数据源
//! - DeviceStore：设备
//! - DeviceDefinitionStore：设备类型定义
//! - ReadingStore：读数
//! - DeviceStateStore：设备状态
//! - DriverDefinitionStore：驱动元数据
//! - DeviceCommandStore：设备命令
//!
//! 设计原则：
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发（`Arc<dyn ...>`）

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{
    Datasource, Device, DeviceCommand, DeviceDefinition, DeviceState, DriverDefinition, Reading,
};

/// 数据源存储接口
#[async_trait]
pub trait DatasourceStore: Send + Sync {
    /// 列出所有启用的数据源
    async fn list_active(&self) -> Result<Vec<Datasource>, StorageError>;

    async fn find_datasource(&self, datasource_id: &str)
    -> Result<Option<Datasource>, StorageError>;

    async fn create_datasource(&self, datasource: Datasource) -> Result<Datasource, StorageError>;

    /// 整体替换；不存在时返回 None
    async fn update_datasource(
        &self,
        datasource_id: &str,
        datasource: Datasource,
    ) -> Result<Option<Datasource>, StorageError>;
}

/// 设备存储接口
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn list_by_datasource(&self, datasource_id: &str) -> Result<Vec<Device>, StorageError>;

    async fn find_device(&self, device_id: &str) -> Result<Option<Device>, StorageError>;

    async fn create_device(&self, device: Device) -> Result<Device, StorageError>;
}

/// 设备类型定义存储接口
#[async_trait]
pub trait DeviceDefinitionStore: Send + Sync {
    async fn find_device_definition(
        &self,
        definition_id: &str,
    ) -> Result<Option<DeviceDefinition>, StorageError>;

    async fn create_device_definition(
        &self,
        definition: DeviceDefinition,
    ) -> Result<DeviceDefinition, StorageError>;
}

/// 读数存储接口
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// 写入读数，返回补齐派生字段后的记录
    async fn create_reading(&self, reading: Reading) -> Result<Reading, StorageError>;

    async fn list_by_meta_id(&self, meta_id: &str) -> Result<Vec<Reading>, StorageError>;

    async fn list_by_device(&self, device_id: &str) -> Result<Vec<Reading>, StorageError>;
}

/// 设备状态存储接口
#[async_trait]
pub trait DeviceStateStore: Send + Sync {
    async fn find_by_device_id(&self, device_id: &str)
    -> Result<Option<DeviceState>, StorageError>;

    async fn create_device_state(&self, state: DeviceState) -> Result<DeviceState, StorageError>;

    async fn update_device_state(
        &self,
        state_id: &str,
        state: DeviceState,
    ) -> Result<Option<DeviceState>, StorageError>;
}

/// 驱动元数据存储接口
#[async_trait]
pub trait DriverDefinitionStore: Send + Sync {
    async fn find_driver_definition(
        &self,
        driver_id: &str,
    ) -> Result<Option<DriverDefinition>, StorageError>;

    async fn create_driver_definition(
        &self,
        definition: DriverDefinition,
    ) -> Result<DriverDefinition, StorageError>;

    async fn update_driver_definition(
        &self,
        driver_id: &str,
        definition: DriverDefinition,
    ) -> Result<Option<DriverDefinition>, StorageError>;

    async fn list_driver_definitions(&self) -> Result<Vec<DriverDefinition>, StorageError>;
}

/// 设备命令存储接口
#[async_trait]
pub trait DeviceCommandStore: Send + Sync {
    async fn create_command(&self, command: DeviceCommand) -> Result<DeviceCommand, StorageError>;

    async fn find_command(&self, command_id: &str) -> Result<Option<DeviceCommand>, StorageError>;

    async fn update_command(
        &self,
        command_id: &str,
        command: DeviceCommand,
    ) -> Result<Option<DeviceCommand>, StorageError>;

    async fn list_commands_by_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<DeviceCommand>, StorageError>;
}
