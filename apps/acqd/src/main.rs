//! 采集守护进程：加载配置与种子数据，启动全部数据源引擎并按固定周期轮询，Ctrl-C 退出。

mod seed;

use acq_config::AppConfig;
use acq_control::{CommandService, CommandServiceConfig, FleetDispatcher};
use acq_driver::DriverRegistry;
use acq_engine::{Engines, FleetStores, PollScheduler, SchedulerConfig};
use acq_storage::{
    InMemoryDatasourceStore, InMemoryDeviceCommandStore, InMemoryDeviceStateStore,
    InMemoryDeviceStore, InMemoryDriverDefinitionStore, InMemoryReadingStore,
};
use acq_telemetry::init_tracing;
use seed::Seed;
use std::sync::Arc;
use tracing::{info, warn};

/// 进程内存储集合。
#[derive(Clone)]
pub struct Stores {
    pub datasources: Arc<InMemoryDatasourceStore>,
    pub devices: Arc<InMemoryDeviceStore>,
    pub readings: Arc<InMemoryReadingStore>,
    pub device_states: Arc<InMemoryDeviceStateStore>,
    pub driver_definitions: Arc<InMemoryDriverDefinitionStore>,
    pub commands: Arc<InMemoryDeviceCommandStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            datasources: Arc::new(InMemoryDatasourceStore::new()),
            devices: Arc::new(InMemoryDeviceStore::new()),
            readings: Arc::new(InMemoryReadingStore::new()),
            device_states: Arc::new(InMemoryDeviceStateStore::new()),
            driver_definitions: Arc::new(InMemoryDriverDefinitionStore::new()),
            commands: Arc::new(InMemoryDeviceCommandStore::new()),
        }
    }

    fn fleet_stores(&self) -> FleetStores {
        FleetStores {
            datasources: self.datasources.clone(),
            devices: self.devices.clone(),
            device_definitions: self.devices.clone(),
            readings: self.readings.clone(),
            device_states: self.device_states.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let stores = Stores::in_memory();
    let startup_commands = match &config.seed_file {
        Some(path) => Seed::from_file(path)?.apply(&stores).await?,
        None => {
            warn!("seed_file_not_configured");
            Vec::new()
        }
    };

    // 登记内置驱动并发布驱动元数据
    let registry = Arc::new(DriverRegistry::with_builtin_drivers());
    registry.publish(stores.driver_definitions.as_ref()).await;

    let fleet = Arc::new(Engines::new(registry, stores.fleet_stores()));
    let started = fleet.load_and_start_engines().await;
    info!(started, "acquisition_ready");

    let commands = CommandService::new_with_config(
        stores.commands.clone(),
        Arc::new(FleetDispatcher::new(fleet.clone())),
        CommandServiceConfig {
            dispatch_max_retries: config.command_dispatch_max_retries,
            dispatch_backoff_ms: config.command_dispatch_backoff_ms,
        },
    );
    for command in startup_commands {
        match commands.issue_command(command).await {
            Ok(issued) => info!(
                command_id = %issued.id,
                status = issued.status.as_str(),
                "startup_command_issued"
            ),
            Err(err) => warn!(error = %err, "startup_command_failed"),
        }
    }

    let scheduler = config.scheduler_enabled.then(|| {
        PollScheduler::spawn(
            fleet.clone(),
            SchedulerConfig {
                interval: config.poll_interval(),
                concurrency: config.poll_concurrency,
            },
        )
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown_requested");

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    let totals = fleet.fleet_statistics();
    fleet.shutdown().await;
    info!(
        engines = totals.engine_count,
        polls = totals.poll_count,
        errors = totals.error_count,
        readings = totals.reading_count,
        persisted = stores.readings.len(),
        metrics = ?acq_telemetry::snapshot(),
        "acquisition_stopped"
    );
    Ok(())
}
