//! 驱动元数据内存存储实现

use crate::error::StorageError;
use crate::traits::DriverDefinitionStore;
use domain::{DriverDefinition, now_epoch_ms};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemoryDriverDefinitionStore {
    definitions: RwLock<HashMap<String, DriverDefinition>>,
}

impl InMemoryDriverDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DriverDefinitionStore for InMemoryDriverDefinitionStore {
    async fn find_driver_definition(
        &self,
        driver_id: &str,
    ) -> Result<Option<DriverDefinition>, StorageError> {
        let map = self
            .definitions
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.get(driver_id).cloned())
    }

    async fn create_driver_definition(
        &self,
        mut definition: DriverDefinition,
    ) -> Result<DriverDefinition, StorageError> {
        let mut map = self
            .definitions
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&definition.id) {
            return Err(StorageError::new("driver definition exists"));
        }
        let now = now_epoch_ms();
        definition.created_at_ms = Some(now);
        definition.updated_at_ms = Some(now);
        map.insert(definition.id.clone(), definition.clone());
        Ok(definition)
    }

    async fn update_driver_definition(
        &self,
        driver_id: &str,
        mut definition: DriverDefinition,
    ) -> Result<Option<DriverDefinition>, StorageError> {
        let mut map = self
            .definitions
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(existing) = map.get_mut(driver_id) else {
            return Ok(None);
        };
        definition.id = driver_id.to_string();
        definition.created_at_ms = existing.created_at_ms;
        definition.updated_at_ms = Some(now_epoch_ms());
        *existing = definition.clone();
        Ok(Some(definition))
    }

    async fn list_driver_definitions(&self) -> Result<Vec<DriverDefinition>, StorageError> {
        let map = self
            .definitions
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<DriverDefinition> = map.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }
}
