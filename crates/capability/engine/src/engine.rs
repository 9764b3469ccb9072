//! 单数据源运行时
//!
//! 状态机：`STOPPED → start → RUNNING+CONNECTED → 连接丢失 → RUNNING+DISCONNECTED`，
//! 任意运行态经 `stop` 回到 `STOPPED`。
//!
//! 驱动实例由 `tokio::sync::Mutex` 独占：启动、停止、轮询、命令在同一引擎上串行执行。
//! 统计计数均为原子量，读取统计不需要等待进行中的轮询。

use crate::error::EngineError;
use crate::processing::{DeviceCatalog, ReadingPipeline};
use acq_driver::Driver;
use acq_storage::{DeviceStateStore, ReadingStore};
use acq_telemetry::{new_cycle_id, record_poll_failed, record_poll_skipped, record_poll_started};
use domain::{Datasource, Device, DeviceCommand, DeviceDefinition, Reading, now_epoch_ms};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, warn};

/// 引擎对外状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineStatus {
    Running,
    Disconnected,
    Stopped,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Disconnected => "DISCONNECTED",
            Self::Stopped => "STOPPED",
        }
    }
}

/// 引擎统计快照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatistics {
    pub datasource_id: String,
    pub datasource_name: String,
    pub device_count: usize,
    pub running: bool,
    pub connected: bool,
    pub status: EngineStatus,
    pub last_poll_ms: Option<i64>,
    pub last_successful_poll_ms: Option<i64>,
    pub poll_count: u64,
    pub error_count: u64,
    pub reading_count: u64,
}

#[derive(Default)]
struct EngineCounters {
    poll_count: AtomicU64,
    error_count: AtomicU64,
    reading_count: AtomicU64,
    // 0 表示尚未发生
    last_poll_ms: AtomicI64,
    last_successful_poll_ms: AtomicI64,
}

fn optional_ms(value: &AtomicI64) -> Option<i64> {
    match value.load(Ordering::Relaxed) {
        0 => None,
        ms => Some(ms),
    }
}

/// 单数据源运行时：绑定数据源快照、设备列表与一个独占驱动实例。
pub struct Engine {
    datasource: Datasource,
    catalog: DeviceCatalog,
    driver: Mutex<Box<dyn Driver>>,
    pipeline: ReadingPipeline,
    running: AtomicBool,
    connected: AtomicBool,
    // 调度器已为本引擎排入一次轮询（等待许可或执行中）
    scheduled: AtomicBool,
    counters: EngineCounters,
}

impl Engine {
    pub fn new(
        datasource: Datasource,
        devices: Vec<Device>,
        definitions: Vec<DeviceDefinition>,
        driver: Box<dyn Driver>,
        readings: Arc<dyn ReadingStore>,
        device_states: Arc<dyn DeviceStateStore>,
    ) -> Self {
        Self {
            datasource,
            catalog: DeviceCatalog::new(devices, definitions),
            driver: Mutex::new(driver),
            pipeline: ReadingPipeline::new(readings, device_states),
            running: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            counters: EngineCounters::default(),
        }
    }

    pub fn datasource_id(&self) -> &str {
        &self.datasource.id
    }

    pub fn datasource(&self) -> &Datasource {
        &self.datasource
    }

    pub fn devices(&self) -> &[Device] {
        self.catalog.devices()
    }

    pub fn owns_device(&self, device_id: &str) -> bool {
        self.catalog.device(device_id).is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// RUNNING+CONNECTED
    pub fn is_active(&self) -> bool {
        self.is_running() && self.is_connected()
    }

    pub fn status(&self) -> EngineStatus {
        match (self.is_running(), self.is_connected()) {
            (true, true) => EngineStatus::Running,
            (true, false) => EngineStatus::Disconnected,
            _ => EngineStatus::Stopped,
        }
    }

    /// 启动：初始化驱动并连接。已运行时直接返回 true；连接失败回到 STOPPED，不做重试。
    pub async fn start(&self) -> bool {
        let mut driver = self.driver.lock().await;
        if self.is_running() {
            debug!(target: "acq.engine", datasource_id = %self.datasource.id, "engine_already_running");
            return true;
        }
        info!(
            target: "acq.engine",
            datasource_id = %self.datasource.id,
            driver_id = %driver.id(),
            devices = self.catalog.devices().len(),
            "engine_starting"
        );
        driver.initialize(&self.datasource);
        match driver.connect().await {
            Ok(()) => {
                self.connected.store(true, Ordering::Release);
                self.running.store(true, Ordering::Release);
                info!(target: "acq.engine", datasource_id = %self.datasource.id, "engine_started");
                true
            }
            Err(err) => {
                self.connected.store(false, Ordering::Release);
                self.running.store(false, Ordering::Release);
                self.counters.error_count.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "acq.engine",
                    datasource_id = %self.datasource.id,
                    error = %err,
                    "engine_connect_failed"
                );
                false
            }
        }
    }

    /// 停止：先标记为未运行（拒绝后续轮询），再等待进行中的操作结束后断开驱动。
    /// 断开失败只记录日志，引擎总是回到 STOPPED。
    pub async fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        let mut driver = self.driver.lock().await;
        self.running.store(false, Ordering::Release);
        self.connected.store(false, Ordering::Release);
        if !was_running && !driver.is_connected() {
            return;
        }
        if let Err(err) = driver.disconnect().await {
            warn!(
                target: "acq.engine",
                datasource_id = %self.datasource.id,
                error = %err,
                "engine_disconnect_failed"
            );
        }
        info!(target: "acq.engine", datasource_id = %self.datasource.id, "engine_stopped");
    }

    /// 轮询全部设备；未处于 RUNNING+CONNECTED 时返回空。驱动错误计入错误数并返回空。
    pub async fn poll(&self) -> Vec<Reading> {
        if !self.is_active() {
            debug!(target: "acq.engine", datasource_id = %self.datasource.id, "poll_refused");
            return Vec::new();
        }
        let mut driver = self.driver.lock().await;
        self.poll_locked(driver.as_mut()).await
    }

    /// 占用调度名额；已有排队或执行中的调度轮询时返回 false。
    pub(crate) fn try_claim_schedule(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_schedule(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    /// 调度器使用：上一次操作仍在执行时跳过本次轮询并返回 None。
    pub async fn poll_if_idle(&self) -> Option<Vec<Reading>> {
        if !self.is_active() {
            return Some(Vec::new());
        }
        let Ok(mut driver) = self.driver.try_lock() else {
            record_poll_skipped();
            debug!(target: "acq.engine", datasource_id = %self.datasource.id, "poll_skipped_busy");
            return None;
        };
        Some(self.poll_locked(driver.as_mut()).await)
    }

    async fn poll_locked(&self, driver: &mut dyn Driver) -> Vec<Reading> {
        // 等锁期间可能已被停止
        if !self.is_active() {
            return Vec::new();
        }
        let cycle_id = new_cycle_id();
        let span = info_span!(
            target: "acq.engine",
            "poll_cycle",
            datasource_id = %self.datasource.id,
            cycle_id = %cycle_id
        );
        async {
            record_poll_started();
            self.counters
                .last_poll_ms
                .store(now_epoch_ms(), Ordering::Relaxed);
            self.counters.poll_count.fetch_add(1, Ordering::Relaxed);

            let commands = self.read_commands();
            let raw = match driver.execute(&commands).await {
                Ok(raw) => raw,
                Err(err) => {
                    record_poll_failed();
                    self.counters.error_count.fetch_add(1, Ordering::Relaxed);
                    warn!(target: "acq.engine", error = %err, "poll_failed");
                    self.check_connection(driver);
                    return Vec::new();
                }
            };
            let received = raw.len();
            let processed = self.pipeline.process(&self.catalog, raw).await;
            self.counters
                .last_successful_poll_ms
                .store(now_epoch_ms(), Ordering::Relaxed);
            self.counters
                .reading_count
                .fetch_add(processed.len() as u64, Ordering::Relaxed);
            debug!(
                target: "acq.engine",
                received,
                persisted = processed.len(),
                "poll_completed"
            );
            processed
        }
        .instrument(span)
        .await
    }

    /// 每个设备一条 READ 命令，附带该设备的信号配置与信号定义。
    fn read_commands(&self) -> Vec<DeviceCommand> {
        self.catalog
            .devices()
            .iter()
            .map(|device| {
                let mut command = DeviceCommand::read(&self.datasource.id, &device.id);
                self.catalog.enrich(&mut command);
                command
            })
            .collect()
    }

    fn prepare(&self, command: &DeviceCommand) -> Result<DeviceCommand, EngineError> {
        if !self.is_active() {
            return Err(EngineError::NotRunning(self.datasource.id.clone()));
        }
        let mut command = command.clone();
        if command.datasource_id.is_empty() {
            command.datasource_id = self.datasource.id.clone();
        }
        if !self.catalog.enrich(&mut command) {
            return Err(EngineError::DeviceNotFound {
                datasource_id: self.datasource.id.clone(),
                device_id: command.device_id,
            });
        }
        Ok(command)
    }

    /// 经驱动组合入口执行单条命令；READ 命令返回的读数走同一处理流水线。
    pub async fn execute_command(&self, command: &DeviceCommand) -> Result<Vec<Reading>, EngineError> {
        let command = self.prepare(command)?;
        let mut driver = self.driver.lock().await;
        if !self.is_active() {
            return Err(EngineError::NotRunning(self.datasource.id.clone()));
        }
        match driver.execute(std::slice::from_ref(&command)).await {
            Ok(raw) => {
                let processed = self.pipeline.process(&self.catalog, raw).await;
                self.counters
                    .reading_count
                    .fetch_add(processed.len() as u64, Ordering::Relaxed);
                debug!(
                    target: "acq.engine",
                    datasource_id = %self.datasource.id,
                    command_id = %command.id,
                    device_id = %command.device_id,
                    "command_executed"
                );
                Ok(processed)
            }
            Err(err) => {
                self.counters.error_count.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "acq.engine",
                    datasource_id = %self.datasource.id,
                    command_id = %command.id,
                    error = %err,
                    "command_execute_failed"
                );
                self.check_connection(driver.as_ref());
                Err(err.into())
            }
        }
    }

    /// 经驱动写入口下发单条命令。
    pub async fn write_command(&self, command: &DeviceCommand) -> Result<(), EngineError> {
        let command = self.prepare(command)?;
        let mut driver = self.driver.lock().await;
        if !self.is_active() {
            return Err(EngineError::NotRunning(self.datasource.id.clone()));
        }
        match driver.write(std::slice::from_ref(&command)).await {
            Ok(()) => {
                debug!(
                    target: "acq.engine",
                    datasource_id = %self.datasource.id,
                    command_id = %command.id,
                    device_id = %command.device_id,
                    writes = command.write.len(),
                    "command_written"
                );
                Ok(())
            }
            Err(err) => {
                self.counters.error_count.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "acq.engine",
                    datasource_id = %self.datasource.id,
                    command_id = %command.id,
                    error = %err,
                    "command_write_failed"
                );
                self.check_connection(driver.as_ref());
                Err(err.into())
            }
        }
    }

    /// 驱动报告已断开时转入 RUNNING+DISCONNECTED；恢复依赖重启。
    fn check_connection(&self, driver: &dyn Driver) {
        if !driver.is_connected() && self.connected.swap(false, Ordering::AcqRel) {
            warn!(
                target: "acq.engine",
                datasource_id = %self.datasource.id,
                "engine_connection_lost"
            );
        }
    }

    pub fn statistics(&self) -> EngineStatistics {
        let running = self.is_running();
        let connected = self.is_connected();
        EngineStatistics {
            datasource_id: self.datasource.id.clone(),
            datasource_name: self.datasource.name.clone(),
            device_count: self.catalog.devices().len(),
            running,
            connected,
            status: self.status(),
            last_poll_ms: optional_ms(&self.counters.last_poll_ms),
            last_successful_poll_ms: optional_ms(&self.counters.last_successful_poll_ms),
            poll_count: self.counters.poll_count.load(Ordering::Relaxed),
            error_count: self.counters.error_count.load(Ordering::Relaxed),
            reading_count: self.counters.reading_count.load(Ordering::Relaxed),
        }
    }
}
