//! 驱动注册表
//!
//! 进程启动时显式登记驱动工厂（不是实例），并记录各驱动的元数据。
//! 每次 `create_driver` 都返回一个全新的、未连接的实例。

use crate::driver::Driver;
use crate::error::DriverError;
use crate::simulator::SimulatorDriver;
use acq_storage::DriverDefinitionStore;
use domain::DriverDefinition;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// 驱动工厂
pub type DriverFactory = Arc<dyn Fn() -> Box<dyn Driver> + Send + Sync>;

struct RegisteredDriver {
    factory: DriverFactory,
    definition: DriverDefinition,
}

/// 驱动注册表（启动后只读）
#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, RegisteredDriver>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记全部内置驱动
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        registry.register(|| Box::new(SimulatorDriver::new()));
        registry
    }

    /// 登记驱动工厂。驱动 ID 与元数据取自工厂产出的探测实例；重复 ID 以后登记者为准。
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Driver> + Send + Sync + 'static,
    {
        let probe = factory();
        let driver_id = probe.id().to_string();
        let definition = probe.definition();
        if self.drivers.contains_key(&driver_id) {
            warn!(target: "acq.registry", driver_id = %driver_id, "driver_registration_replaced");
        }
        info!(
            target: "acq.registry",
            driver_id = %driver_id,
            version = %definition.version,
            "driver_registered"
        );
        self.drivers.insert(
            driver_id,
            RegisteredDriver {
                factory: Arc::new(factory),
                definition,
            },
        );
    }

    /// 创建全新驱动实例
    pub fn create_driver(&self, driver_id: &str) -> Result<Box<dyn Driver>, DriverError> {
        self.drivers
            .get(driver_id)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| DriverError::NotFound(driver_id.to_string()))
    }

    pub fn is_available(&self, driver_id: &str) -> bool {
        self.drivers.contains_key(driver_id)
    }

    pub fn driver_ids(&self) -> Vec<String> {
        self.drivers.keys().cloned().collect()
    }

    pub fn definition(&self, driver_id: &str) -> Option<&DriverDefinition> {
        self.drivers.get(driver_id).map(|entry| &entry.definition)
    }

    /// 将驱动元数据发布到存储：不存在则创建，存在则更新；从不删除。
    ///
    /// 单个驱动发布失败只记录日志，返回成功发布的数量。
    pub async fn publish(&self, store: &dyn DriverDefinitionStore) -> usize {
        let mut published = 0;
        for (driver_id, entry) in &self.drivers {
            let definition = entry.definition.clone();
            let result = match store.find_driver_definition(driver_id).await {
                Ok(Some(_)) => store
                    .update_driver_definition(driver_id, definition)
                    .await
                    .map(|_| "updated"),
                Ok(None) => store
                    .create_driver_definition(definition)
                    .await
                    .map(|_| "created"),
                Err(err) => Err(err),
            };
            match result {
                Ok(action) => {
                    published += 1;
                    info!(
                        target: "acq.registry",
                        driver_id = %driver_id,
                        action,
                        "driver_definition_published"
                    );
                }
                Err(err) => {
                    warn!(
                        target: "acq.registry",
                        driver_id = %driver_id,
                        error = %err,
                        "driver_definition_publish_failed"
                    );
                }
            }
        }
        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SIMULATOR_DRIVER_ID;

    #[test]
    fn builtin_registry_exposes_simulator() {
        let registry = DriverRegistry::with_builtin_drivers();
        assert!(registry.is_available(SIMULATOR_DRIVER_ID));
        assert!(!registry.is_available("modbus-tcp"));
        assert_eq!(registry.driver_ids(), vec![SIMULATOR_DRIVER_ID.to_string()]);
        let definition = registry
            .definition(SIMULATOR_DRIVER_ID)
            .expect("definition");
        assert_eq!(definition.connection_properties.len(), 2);
    }

    #[test]
    fn unknown_driver_is_not_found() {
        let registry = DriverRegistry::new();
        match registry.create_driver("missing") {
            Err(DriverError::NotFound(id)) => assert_eq!(id, "missing"),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("driver should not exist"),
        }
    }
}
