//! 设备命令内存存储实现

use crate::error::StorageError;
use crate::traits::DeviceCommandStore;
use domain::DeviceCommand;
use std::sync::RwLock;

/// 命令内存存储（按创建顺序保存）
#[derive(Default)]
pub struct InMemoryDeviceCommandStore {
    commands: RwLock<Vec<DeviceCommand>>,
}

impl InMemoryDeviceCommandStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DeviceCommandStore for InMemoryDeviceCommandStore {
    async fn create_command(&self, command: DeviceCommand) -> Result<DeviceCommand, StorageError> {
        let mut commands = self
            .commands
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if commands.iter().any(|item| item.id == command.id) {
            return Err(StorageError::new("command exists"));
        }
        let mut stored = command.clone();
        stored.signal_configurations.clear();
        stored.signal_definitions.clear();
        commands.push(stored);
        Ok(command)
    }

    async fn find_command(&self, command_id: &str) -> Result<Option<DeviceCommand>, StorageError> {
        let commands = self
            .commands
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(commands.iter().find(|item| item.id == command_id).cloned())
    }

    async fn update_command(
        &self,
        command_id: &str,
        command: DeviceCommand,
    ) -> Result<Option<DeviceCommand>, StorageError> {
        let mut commands = self
            .commands
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        for item in commands.iter_mut() {
            if item.id == command_id {
                *item = command;
                item.id = command_id.to_string();
                // 瞬态字段不落库
                item.signal_configurations.clear();
                item.signal_definitions.clear();
                return Ok(Some(item.clone()));
            }
        }
        Ok(None)
    }

    async fn list_commands_by_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<DeviceCommand>, StorageError> {
        let commands = self
            .commands
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(commands
            .iter()
            .filter(|item| item.device_id == device_id)
            .cloned()
            .collect())
    }
}
