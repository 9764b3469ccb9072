//! 设备与设备类型定义内存存储实现

use crate::error::StorageError;
use crate::traits::{DeviceDefinitionStore, DeviceStore};
use domain::{Device, DeviceDefinition};
use std::collections::HashMap;
use std::sync::RwLock;

/// 设备内存存储（同时承载设备类型定义）
#[derive(Default)]
pub struct InMemoryDeviceStore {
    devices: RwLock<HashMap<String, Device>>,
    definitions: RwLock<HashMap<String, DeviceDefinition>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    /// 列出数据源下的设备（按 ID 排序）
    async fn list_by_datasource(&self, datasource_id: &str) -> Result<Vec<Device>, StorageError> {
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<Device> = map
            .values()
            .filter(|item| item.datasource_id == datasource_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn find_device(&self, device_id: &str) -> Result<Option<Device>, StorageError> {
        let item = self
            .devices
            .read()
            .ok()
            .and_then(|map| map.get(device_id).cloned());
        Ok(item)
    }

    async fn create_device(&self, device: Device) -> Result<Device, StorageError> {
        let mut map = self
            .devices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&device.id) {
            return Err(StorageError::new("device exists"));
        }
        map.insert(device.id.clone(), device.clone());
        Ok(device)
    }
}

#[async_trait::async_trait]
impl DeviceDefinitionStore for InMemoryDeviceStore {
    async fn find_device_definition(
        &self,
        definition_id: &str,
    ) -> Result<Option<DeviceDefinition>, StorageError> {
        let map = self
            .definitions
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.get(definition_id).cloned())
    }

    async fn create_device_definition(
        &self,
        definition: DeviceDefinition,
    ) -> Result<DeviceDefinition, StorageError> {
        let mut map = self
            .definitions
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&definition.id) {
            return Err(StorageError::new("device definition exists"));
        }
        map.insert(definition.id.clone(), definition.clone());
        Ok(definition)
    }
}
