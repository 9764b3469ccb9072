//! 启动种子数据：从 JSON 文件导入数据源、设备类型与设备，可附带启动后下发的命令。
//!
//! ```json
//! {
//!   "datasources": [{ "id": "ds-1", "name": "Line 1", "driverId": "test-driver-v1" }],
//!   "deviceDefinitions": [{ "id": "meter", "name": "Meter", "signals": [...] }],
//!   "devices": [{ "id": "m-1", "datasourceId": "ds-1", "deviceDefinitionId": "meter" }],
//!   "commands": []
//! }
//! ```

use crate::Stores;
use acq_storage::{DatasourceStore, DeviceDefinitionStore, DeviceStore, StorageError};
use domain::{Datasource, Device, DeviceCommand, DeviceDefinition};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("read seed file failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse seed file failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store seed record failed: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seed {
    pub datasources: Vec<Datasource>,
    pub device_definitions: Vec<DeviceDefinition>,
    pub devices: Vec<Device>,
    pub commands: Vec<DeviceCommand>,
}

impl Seed {
    pub fn from_file(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// 写入存储；返回待下发的启动命令。
    pub async fn apply(self, stores: &Stores) -> Result<Vec<DeviceCommand>, SeedError> {
        info!(
            datasources = self.datasources.len(),
            device_definitions = self.device_definitions.len(),
            devices = self.devices.len(),
            commands = self.commands.len(),
            "seed_loading"
        );
        for datasource in self.datasources {
            stores.datasources.create_datasource(datasource).await?;
        }
        for definition in self.device_definitions {
            stores.devices.create_device_definition(definition).await?;
        }
        for device in self.devices {
            stores.devices.create_device(device).await?;
        }
        Ok(self.commands)
    }
}
