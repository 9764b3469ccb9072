//! 引擎集群
//!
//! 维护 datasource_id → Engine 映射。映射本身只在插入/移除/快照时短暂加锁，
//! 引擎的启动、停止与轮询都在锁外进行，互不阻塞。

use crate::engine::{Engine, EngineStatistics, EngineStatus};
use crate::error::EngineError;
use acq_driver::DriverRegistry;
use acq_storage::{
    DatasourceStore, DeviceDefinitionStore, DeviceStateStore, DeviceStore, ReadingStore,
};
use domain::{Datasource, DeviceCommand, DeviceDefinition, Reading, now_epoch_ms};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// 引擎集群依赖的存储协作方。
#[derive(Clone)]
pub struct FleetStores {
    pub datasources: Arc<dyn DatasourceStore>,
    pub devices: Arc<dyn DeviceStore>,
    pub device_definitions: Arc<dyn DeviceDefinitionStore>,
    pub readings: Arc<dyn ReadingStore>,
    pub device_states: Arc<dyn DeviceStateStore>,
}

/// 集群汇总统计。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStatistics {
    pub engine_count: usize,
    pub running_count: usize,
    pub disconnected_count: usize,
    pub poll_count: u64,
    pub error_count: u64,
    pub reading_count: u64,
}

impl FleetStatistics {
    fn add(&mut self, stats: &EngineStatistics) {
        self.engine_count += 1;
        match stats.status {
            EngineStatus::Running => self.running_count += 1,
            EngineStatus::Disconnected => self.disconnected_count += 1,
            EngineStatus::Stopped => {}
        }
        self.poll_count += stats.poll_count;
        self.error_count += stats.error_count;
        self.reading_count += stats.reading_count;
    }
}

pub struct Engines {
    registry: Arc<DriverRegistry>,
    stores: FleetStores,
    engines: RwLock<HashMap<String, Arc<Engine>>>,
}

impl Engines {
    pub fn new(registry: Arc<DriverRegistry>, stores: FleetStores) -> Self {
        Self {
            registry,
            stores,
            engines: RwLock::new(HashMap::new()),
        }
    }

    // 映射中只有 Arc 句柄，持锁期间不会 panic，中毒时直接沿用内部数据。
    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Engine>>> {
        self.engines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Engine>>> {
        self.engines.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn engine(&self, datasource_id: &str) -> Option<Arc<Engine>> {
        self.read_map().get(datasource_id).cloned()
    }

    /// 当前全部引擎的快照（按数据源 ID 排序）。
    pub fn snapshot(&self) -> Vec<Arc<Engine>> {
        let mut engines: Vec<_> = self.read_map().values().cloned().collect();
        engines.sort_by(|a, b| a.datasource_id().cmp(b.datasource_id()));
        engines
    }

    /// 为所有启用的数据源创建并启动引擎；单个数据源失败不影响其他数据源。
    /// 返回已在运行的引擎数量。
    pub async fn load_and_start_engines(&self) -> usize {
        let datasources = match self.stores.datasources.list_active().await {
            Ok(datasources) => datasources,
            Err(err) => {
                error!(target: "acq.fleet", error = %err, "datasource_list_failed");
                return 0;
            }
        };
        info!(target: "acq.fleet", count = datasources.len(), "engines_loading");
        let mut started = 0;
        for datasource in &datasources {
            if self.create_and_start_engine(datasource).await {
                started += 1;
            }
        }
        info!(
            target: "acq.fleet",
            started,
            total = datasources.len(),
            "engines_loaded"
        );
        started
    }

    /// 创建并启动引擎；已存在时直接返回 true。
    ///
    /// 以下情况不创建引擎并返回 false：数据源未启用、驱动未知、没有启用的设备、启动失败。
    pub async fn create_and_start_engine(&self, datasource: &Datasource) -> bool {
        let datasource_id = datasource.id.as_str();
        if self.read_map().contains_key(datasource_id) {
            debug!(target: "acq.fleet", datasource_id, "engine_exists");
            return true;
        }
        if !datasource.active {
            warn!(target: "acq.fleet", datasource_id, "datasource_inactive");
            return false;
        }
        let driver = match self.registry.create_driver(&datasource.driver_id) {
            Ok(driver) => driver,
            Err(err) => {
                error!(
                    target: "acq.fleet",
                    datasource_id,
                    driver_id = %datasource.driver_id,
                    error = %err,
                    "driver_unavailable"
                );
                return false;
            }
        };
        let devices = match self.stores.devices.list_by_datasource(datasource_id).await {
            Ok(devices) => devices
                .into_iter()
                .filter(|device| device.active)
                .collect::<Vec<_>>(),
            Err(err) => {
                error!(target: "acq.fleet", datasource_id, error = %err, "device_list_failed");
                return false;
            }
        };
        if devices.is_empty() {
            warn!(target: "acq.fleet", datasource_id, "engine_without_devices");
            return false;
        }
        let definition_ids: BTreeSet<&str> = devices
            .iter()
            .filter_map(|device| device.device_definition_id.as_deref())
            .collect();
        let definitions = self.load_definitions(datasource_id, definition_ids).await;

        let engine = Arc::new(Engine::new(
            datasource.clone(),
            devices,
            definitions,
            driver,
            self.stores.readings.clone(),
            self.stores.device_states.clone(),
        ));
        if !engine.start().await {
            error!(target: "acq.fleet", datasource_id, "engine_start_failed");
            return false;
        }

        let duplicate = {
            let mut engines = self.write_map();
            if engines.contains_key(datasource_id) {
                true
            } else {
                engines.insert(datasource_id.to_string(), engine.clone());
                false
            }
        };
        if duplicate {
            // 并发创建：保留先插入者
            engine.stop().await;
            return true;
        }
        info!(target: "acq.fleet", datasource_id, "engine_registered");
        self.record_connectivity(datasource_id, true).await;
        true
    }

    async fn load_definitions(
        &self,
        datasource_id: &str,
        definition_ids: BTreeSet<&str>,
    ) -> Vec<DeviceDefinition> {
        let mut definitions = Vec::with_capacity(definition_ids.len());
        for definition_id in definition_ids {
            match self
                .stores
                .device_definitions
                .find_device_definition(definition_id)
                .await
            {
                Ok(Some(definition)) => definitions.push(definition),
                Ok(None) => warn!(
                    target: "acq.fleet",
                    datasource_id,
                    definition_id,
                    "device_definition_missing"
                ),
                Err(err) => warn!(
                    target: "acq.fleet",
                    datasource_id,
                    definition_id,
                    error = %err,
                    "device_definition_load_failed"
                ),
            }
        }
        definitions
    }

    /// 尽力更新数据源的连接字段；失败只记录日志。
    async fn record_connectivity(&self, datasource_id: &str, connected: bool) {
        let mut datasource = match self.stores.datasources.find_datasource(datasource_id).await {
            Ok(Some(datasource)) => datasource,
            Ok(None) => return,
            Err(err) => {
                warn!(target: "acq.fleet", datasource_id, error = %err, "connectivity_update_failed");
                return;
            }
        };
        datasource.connected = connected;
        datasource.connection_status = Some(
            if connected {
                "CONNECTED"
            } else {
                "DISCONNECTED"
            }
            .to_string(),
        );
        if connected {
            datasource.last_connection_ms = Some(now_epoch_ms());
        }
        if let Err(err) = self
            .stores
            .datasources
            .update_datasource(datasource_id, datasource)
            .await
        {
            warn!(target: "acq.fleet", datasource_id, error = %err, "connectivity_update_failed");
        }
    }

    /// 停止并移除引擎；不存在时返回 false。
    pub async fn stop_engine(&self, datasource_id: &str) -> bool {
        let Some(engine) = self.write_map().remove(datasource_id) else {
            warn!(target: "acq.fleet", datasource_id, "engine_not_found");
            return false;
        };
        engine.stop().await;
        info!(target: "acq.fleet", datasource_id, "engine_removed");
        self.record_connectivity(datasource_id, false).await;
        true
    }

    /// 停止后重新读取数据源并再次创建引擎。
    pub async fn restart_engine(&self, datasource_id: &str) -> bool {
        if !self.stop_engine(datasource_id).await {
            return false;
        }
        match self.stores.datasources.find_datasource(datasource_id).await {
            Ok(Some(datasource)) => self.create_and_start_engine(&datasource).await,
            Ok(None) => {
                error!(target: "acq.fleet", datasource_id, "datasource_not_found");
                false
            }
            Err(err) => {
                error!(target: "acq.fleet", datasource_id, error = %err, "datasource_load_failed");
                false
            }
        }
    }

    /// 立即轮询指定数据源；引擎不存在或未连接时返回空。
    pub async fn poll_engine(&self, datasource_id: &str) -> Vec<Reading> {
        match self.engine(datasource_id) {
            Some(engine) if engine.is_active() => engine.poll().await,
            Some(_) => {
                warn!(target: "acq.fleet", datasource_id, "engine_not_active");
                Vec::new()
            }
            None => {
                warn!(target: "acq.fleet", datasource_id, "engine_not_found");
                Vec::new()
            }
        }
    }

    /// 按设备轮询：按所属数据源分组，每个数据源轮询一次，结果只保留请求的设备。
    pub async fn poll_devices(&self, device_ids: &[String]) -> Vec<Reading> {
        if device_ids.is_empty() {
            return Vec::new();
        }
        let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for device_id in device_ids {
            match self.stores.devices.find_device(device_id).await {
                Ok(Some(device)) if !device.datasource_id.is_empty() => {
                    grouped
                        .entry(device.datasource_id)
                        .or_default()
                        .insert(device.id);
                }
                Ok(_) => debug!(target: "acq.fleet", device_id = %device_id, "device_not_found"),
                Err(err) => warn!(
                    target: "acq.fleet",
                    device_id = %device_id,
                    error = %err,
                    "device_load_failed"
                ),
            }
        }

        let mut readings = Vec::new();
        for (datasource_id, wanted) in grouped {
            let Some(engine) = self.engine(&datasource_id) else {
                continue;
            };
            if !engine.is_active() {
                continue;
            }
            readings.extend(
                engine
                    .poll()
                    .await
                    .into_iter()
                    .filter(|reading| wanted.contains(&reading.device_id)),
            );
        }
        readings
    }

    fn active_engine_for(&self, command: &DeviceCommand) -> Result<Arc<Engine>, EngineError> {
        let engine = self
            .engine(&command.datasource_id)
            .ok_or_else(|| EngineError::EngineNotFound(command.datasource_id.clone()))?;
        if !engine.is_active() {
            return Err(EngineError::NotRunning(command.datasource_id.clone()));
        }
        Ok(engine)
    }

    /// 将命令路由到其数据源的引擎，经驱动组合入口执行。
    pub async fn execute_command(&self, command: &DeviceCommand) -> Result<Vec<Reading>, EngineError> {
        let engine = self.active_engine_for(command)?;
        engine.execute_command(command).await
    }

    /// 将命令路由到其数据源的引擎，经驱动写入口执行。
    pub async fn write_command(&self, command: &DeviceCommand) -> Result<(), EngineError> {
        let engine = self.active_engine_for(command)?;
        engine.write_command(command).await
    }

    pub fn active_engine_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_map().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// datasource_id → 是否 RUNNING+CONNECTED
    pub fn engine_status(&self) -> BTreeMap<String, bool> {
        self.read_map()
            .iter()
            .map(|(id, engine)| (id.clone(), engine.is_active()))
            .collect()
    }

    pub fn statistics(&self, datasource_id: &str) -> Option<EngineStatistics> {
        self.engine(datasource_id).map(|engine| engine.statistics())
    }

    pub fn all_statistics(&self) -> Vec<EngineStatistics> {
        self.snapshot()
            .iter()
            .map(|engine| engine.statistics())
            .collect()
    }

    pub fn fleet_statistics(&self) -> FleetStatistics {
        self.all_statistics()
            .iter()
            .fold(FleetStatistics::default(), |mut total, stats| {
                total.add(stats);
                total
            })
    }

    /// 停止全部引擎并清空映射。
    pub async fn shutdown(&self) {
        let engines: Vec<Arc<Engine>> = {
            let mut map = self.write_map();
            map.drain().map(|(_, engine)| engine).collect()
        };
        info!(target: "acq.fleet", count = engines.len(), "engines_shutting_down");
        for engine in engines {
            engine.stop().await;
            self.record_connectivity(engine.datasource_id(), false).await;
        }
    }
}
