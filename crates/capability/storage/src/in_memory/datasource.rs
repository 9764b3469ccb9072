//! 数据源内存存储实现

use crate::error::StorageError;
use crate::traits::DatasourceStore;
use domain::{Datasource, now_epoch_ms};
use std::collections::HashMap;
use std::sync::RwLock;

/// 数据源内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
#[derive(Default)]
pub struct InMemoryDatasourceStore {
    datasources: RwLock<HashMap<String, Datasource>>,
}

impl InMemoryDatasourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DatasourceStore for InMemoryDatasourceStore {
    async fn list_active(&self) -> Result<Vec<Datasource>, StorageError> {
        let map = self
            .datasources
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<Datasource> = map.values().filter(|item| item.active).cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn find_datasource(
        &self,
        datasource_id: &str,
    ) -> Result<Option<Datasource>, StorageError> {
        let map = self
            .datasources
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.get(datasource_id).cloned())
    }

    async fn create_datasource(
        &self,
        mut datasource: Datasource,
    ) -> Result<Datasource, StorageError> {
        let mut map = self
            .datasources
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&datasource.id) {
            return Err(StorageError::new("datasource exists"));
        }
        let now = now_epoch_ms();
        datasource.created_at_ms.get_or_insert(now);
        datasource.updated_at_ms = Some(now);
        map.insert(datasource.id.clone(), datasource.clone());
        Ok(datasource)
    }

    async fn update_datasource(
        &self,
        datasource_id: &str,
        mut datasource: Datasource,
    ) -> Result<Option<Datasource>, StorageError> {
        let mut map = self
            .datasources
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(existing) = map.get_mut(datasource_id) else {
            return Ok(None);
        };
        datasource.id = datasource_id.to_string();
        datasource.created_at_ms = existing.created_at_ms;
        datasource.updated_at_ms = Some(now_epoch_ms());
        *existing = datasource.clone();
        Ok(Some(datasource))
    }
}
