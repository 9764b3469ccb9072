//! 设备状态内存存储实现
//!
//! 以状态 ID 为主键，同时维护 device_id → state_id 索引。

use crate::error::StorageError;
use crate::traits::DeviceStateStore;
use domain::{DeviceState, now_epoch_ms};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct StateTable {
    states: HashMap<String, DeviceState>,
    by_device: HashMap<String, String>,
}

#[derive(Default)]
pub struct InMemoryDeviceStateStore {
    table: RwLock<StateTable>,
}

impl InMemoryDeviceStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DeviceStateStore for InMemoryDeviceStateStore {
    async fn find_by_device_id(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceState>, StorageError> {
        let table = self
            .table
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(table
            .by_device
            .get(device_id)
            .and_then(|state_id| table.states.get(state_id))
            .cloned())
    }

    async fn create_device_state(
        &self,
        mut state: DeviceState,
    ) -> Result<DeviceState, StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if table.by_device.contains_key(&state.device_id) {
            return Err(StorageError::new("device state exists"));
        }
        let state_id = state
            .id
            .get_or_insert_with(|| default_state_id(&state.device_id))
            .clone();
        let now = now_epoch_ms();
        state.created_at_ms.get_or_insert(now);
        state.updated_at_ms.get_or_insert(now);
        table
            .by_device
            .insert(state.device_id.clone(), state_id.clone());
        table.states.insert(state_id, state.clone());
        Ok(state)
    }

    async fn update_device_state(
        &self,
        state_id: &str,
        mut state: DeviceState,
    ) -> Result<Option<DeviceState>, StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(existing) = table.states.get_mut(state_id) else {
            return Ok(None);
        };
        state.id = Some(state_id.to_string());
        state.created_at_ms = existing.created_at_ms;
        state.updated_at_ms.get_or_insert_with(now_epoch_ms);
        *existing = state.clone();
        Ok(Some(state))
    }
}

fn default_state_id(device_id: &str) -> String {
    format!("state-{device_id}")
}
