//! 读数内存存储实现
//!
//! 按写入顺序追加，查询时按元 ID / 设备 ID 过滤。

use crate::error::StorageError;
use crate::traits::ReadingStore;
use domain::{Reading, now_epoch_ms};
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemoryReadingStore {
    readings: RwLock<Vec<Reading>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入读数数量（用于测试）
    pub fn len(&self) -> usize {
        self.readings.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn create_reading(&self, mut reading: Reading) -> Result<Reading, StorageError> {
        reading.normalize(now_epoch_ms());
        let mut items = self
            .readings
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        items.push(reading.clone());
        Ok(reading)
    }

    async fn list_by_meta_id(&self, meta_id: &str) -> Result<Vec<Reading>, StorageError> {
        let items = self
            .readings
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(items
            .iter()
            .filter(|item| item.meta_id == meta_id)
            .cloned()
            .collect())
    }

    async fn list_by_device(&self, device_id: &str) -> Result<Vec<Reading>, StorageError> {
        let items = self
            .readings
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(items
            .iter()
            .filter(|item| item.device_id == device_id)
            .cloned()
            .collect())
    }
}
