//! 引擎测试公共设施：可编排的驱动替身与内存存储组装。
#![allow(dead_code)]

use acq_driver::{Driver, DriverError, DriverRegistry};
use acq_engine::{Engine, Engines, FleetStores};
use acq_storage::{
    DatasourceStore, DeviceDefinitionStore, DeviceStore, InMemoryDatasourceStore,
    InMemoryDeviceStateStore, InMemoryDeviceStore, InMemoryReadingStore,
};
use async_trait::async_trait;
use domain::{
    AlarmCondition, AlarmSeverity, CommandType, DataType, Datasource, Device, DeviceCommand,
    DeviceDefinition, DriverDefinition, Reading, SignalConfiguration, SignalDefinition,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SCRIPTED_DRIVER_ID: &str = "scripted";

/// 驱动调用计数与故障开关，由测试与驱动实例共享。
#[derive(Default)]
pub struct Script {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub executes: AtomicUsize,
    pub writes: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_execute: AtomicBool,
    /// execute 失败时同时断开连接
    pub drop_on_failure: AtomicBool,
    pub values: Mutex<HashMap<String, Value>>,
    pub written: Mutex<Vec<DeviceCommand>>,
    pub execute_delay_ms: AtomicUsize,
}

impl Script {
    pub fn set_value(&self, signal_id: &str, value: Value) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(signal_id.to_string(), value);
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct ScriptedDriver {
    script: Arc<Script>,
    connected: bool,
}

impl ScriptedDriver {
    pub fn new(script: Arc<Script>) -> Self {
        Self {
            script,
            connected: false,
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn id(&self) -> &str {
        SCRIPTED_DRIVER_ID
    }

    fn definition(&self) -> DriverDefinition {
        DriverDefinition {
            id: SCRIPTED_DRIVER_ID.to_string(),
            name: "Scripted".to_string(),
            version: "0.0.1".to_string(),
            ..DriverDefinition::default()
        }
    }

    fn initialize(&mut self, _datasource: &Datasource) {}

    async fn connect(&mut self) -> Result<(), DriverError> {
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_connect.load(Ordering::SeqCst) {
            return Err(DriverError::Connection("refused".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        self.script.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn execute(&mut self, commands: &[DeviceCommand]) -> Result<Vec<Reading>, DriverError> {
        self.script.executes.fetch_add(1, Ordering::SeqCst);
        let delay = self.script.execute_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.script.fail_execute.load(Ordering::SeqCst) {
            if self.script.drop_on_failure.load(Ordering::SeqCst) {
                self.connected = false;
            }
            return Err(DriverError::Connection("timeout".to_string()));
        }
        let values = self
            .script
            .values
            .lock()
            .map(|values| values.clone())
            .unwrap_or_default();
        let mut readings = Vec::new();
        for command in commands {
            match command.command_type {
                CommandType::Read => {
                    for definition in &command.signal_definitions {
                        let value = values.get(&definition.id).cloned().unwrap_or(Value::Null);
                        readings.push(Reading::new(
                            command.datasource_id.clone(),
                            command.device_id.clone(),
                            definition.id.clone(),
                            value,
                        ));
                    }
                }
                CommandType::Write => {
                    if let Ok(mut written) = self.script.written.lock() {
                        written.push(command.clone());
                    }
                }
            }
        }
        Ok(readings)
    }

    async fn write(&mut self, commands: &[DeviceCommand]) -> Result<(), DriverError> {
        self.script.writes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut written) = self.script.written.lock() {
            written.extend(commands.iter().cloned());
        }
        Ok(())
    }
}

/// 温度 + 运行状态两信号的设备类型；温度 > 50 告警。
pub fn thermostat_definition() -> DeviceDefinition {
    DeviceDefinition::new("thermostat", "Thermostat")
        .with_signal(
            SignalDefinition::new("temp", "Temperature", DataType::Double).with_alarm(
                AlarmCondition::new("value > 50", AlarmSeverity::Major).describe("overheat"),
            ),
        )
        .with_signal(SignalDefinition::new("running", "Running", DataType::Boolean))
}

pub fn thermostat(device_id: &str, datasource_id: &str) -> Device {
    Device::new(device_id, datasource_id, "thermostat")
        .with_signal(SignalConfiguration::new("temp"))
        .with_signal(SignalConfiguration::new("running"))
}

pub struct Harness {
    pub script: Arc<Script>,
    pub registry: Arc<DriverRegistry>,
    pub datasources: Arc<InMemoryDatasourceStore>,
    pub devices: Arc<InMemoryDeviceStore>,
    pub readings: Arc<InMemoryReadingStore>,
    pub states: Arc<InMemoryDeviceStateStore>,
}

impl Harness {
    pub async fn new() -> Self {
        let script = Arc::new(Script::default());
        script.set_value("temp", Value::from(20.0));
        script.set_value("running", Value::Bool(true));

        let mut registry = DriverRegistry::new();
        let shared = script.clone();
        registry.register(move || Box::new(ScriptedDriver::new(shared.clone())));

        let devices = Arc::new(InMemoryDeviceStore::new());
        devices
            .create_device_definition(thermostat_definition())
            .await
            .expect("definition");

        Self {
            script,
            registry: Arc::new(registry),
            datasources: Arc::new(InMemoryDatasourceStore::new()),
            devices,
            readings: Arc::new(InMemoryReadingStore::new()),
            states: Arc::new(InMemoryDeviceStateStore::new()),
        }
    }

    pub async fn add_datasource(&self, datasource_id: &str, device_ids: &[&str]) -> Datasource {
        let datasource = self
            .datasources
            .create_datasource(Datasource::new(
                datasource_id,
                datasource_id,
                SCRIPTED_DRIVER_ID,
            ))
            .await
            .expect("datasource");
        for device_id in device_ids {
            self.devices
                .create_device(thermostat(device_id, datasource_id))
                .await
                .expect("device");
        }
        datasource
    }

    pub fn fleet(&self) -> Arc<Engines> {
        Arc::new(Engines::new(
            self.registry.clone(),
            FleetStores {
                datasources: self.datasources.clone(),
                devices: self.devices.clone(),
                device_definitions: self.devices.clone(),
                readings: self.readings.clone(),
                device_states: self.states.clone(),
            },
        ))
    }

    /// 单设备引擎，绕过集群直接构造。
    pub fn engine(&self, device: Device) -> Engine {
        Engine::new(
            Datasource::new(device.datasource_id.clone(), "direct", SCRIPTED_DRIVER_ID),
            vec![device],
            vec![thermostat_definition()],
            Box::new(ScriptedDriver::new(self.script.clone())),
            self.readings.clone(),
            self.states.clone(),
        )
    }
}
