//! 内置仿真驱动 `test-driver-v1`
//!
//! 不连接任何现场设备，按信号数据类型生成读数，用于联调与测试。
//!
//! ## 配置格式
//!
//! 数据源连接参数：
//! - `minConnectionDelay` / `maxConnectionDelay`：连接时模拟的延迟区间（毫秒，默认 100 / 1000）
//!
//! 信号参数（SignalConfiguration）：
//! - `minValue` / `maxValue`：数值区间（默认 0 / 100）
//! - `valueType`：`RANDOM`（默认）或 `STATIC`
//! - `staticValue`：`LOW` / `MEDIUM`（默认）/ `HIGH` / `ON` / `OFF` / `ERROR`
//!
//! 写入的值会在后续读取同一设备信号时原样返回。

use crate::driver::Driver;
use crate::error::DriverError;
use async_trait::async_trait;
use chrono::Utc;
use domain::{
    CommandType, DataType, Datasource, DeviceCommand, DriverDefinition, PropertyDefinition,
    Reading, SignalConfiguration, now_epoch_ms,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SIMULATOR_DRIVER_ID: &str = "test-driver-v1";

const MIN_DELAY_KEY: &str = "minConnectionDelay";
const MAX_DELAY_KEY: &str = "maxConnectionDelay";
const DEFAULT_MIN_DELAY_MS: u64 = 100;
const DEFAULT_MAX_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueMode {
    Random,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaticLevel {
    Low,
    Medium,
    High,
    On,
    Off,
    Error,
}

impl StaticLevel {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "ON" => Some(Self::On),
            "OFF" => Some(Self::Off),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::On => "ON",
            Self::Off => "OFF",
            Self::Error => "ERROR",
        }
    }
}

/// 单信号生成参数
#[derive(Debug, Clone, Copy)]
struct SignalProfile {
    min: f64,
    max: f64,
    mode: ValueMode,
    level: StaticLevel,
}

impl SignalProfile {
    fn from_configuration(configuration: Option<&SignalConfiguration>) -> Self {
        let number = |name: &str, default: f64| {
            configuration
                .and_then(|c| c.property(name))
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .unwrap_or(default)
        };
        let (mut min, mut max) = (number("minValue", 0.0), number("maxValue", 100.0));
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }
        let mode = match configuration.and_then(|c| c.property("valueType")) {
            Some(raw) if raw.eq_ignore_ascii_case("STATIC") => ValueMode::Static,
            _ => ValueMode::Random,
        };
        let level = configuration
            .and_then(|c| c.property("staticValue"))
            .and_then(StaticLevel::parse)
            .unwrap_or(StaticLevel::Medium);
        Self {
            min,
            max,
            mode,
            level,
        }
    }
}

/// 仿真驱动
pub struct SimulatorDriver {
    datasource_id: Option<String>,
    min_delay_ms: u64,
    max_delay_ms: u64,
    connected: bool,
    rng: StdRng,
    written: HashMap<(String, String), Value>,
}

impl Default for SimulatorDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorDriver {
    pub fn new() -> Self {
        Self {
            datasource_id: None,
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            connected: false,
            rng: StdRng::from_entropy(),
            written: HashMap::new(),
        }
    }

    /// 最近一次写入某设备信号的值
    pub fn last_written_value(&self, device_id: &str, signal_id: &str) -> Option<&Value> {
        self.written
            .get(&(device_id.to_string(), signal_id.to_string()))
    }

    fn connection_delay(&mut self) -> Duration {
        let delay_ms = if self.min_delay_ms >= self.max_delay_ms {
            self.min_delay_ms
        } else {
            self.rng.gen_range(self.min_delay_ms..=self.max_delay_ms)
        };
        Duration::from_millis(delay_ms)
    }

    fn apply_writes(&mut self, command: &DeviceCommand) {
        for request in &command.write {
            debug!(
                target: "acq.driver",
                device_id = %command.device_id,
                signal_id = %request.signal_id,
                value = %request.value,
                "simulator_value_written"
            );
            self.written.insert(
                (command.device_id.clone(), request.signal_id.clone()),
                request.value.clone(),
            );
        }
    }

    fn read_command(&mut self, command: &DeviceCommand) -> Vec<Reading> {
        let signal_ids: Vec<String> = if command.read.is_empty() {
            command
                .signal_definitions
                .iter()
                .map(|definition| definition.id.clone())
                .collect()
        } else {
            command
                .read
                .iter()
                .map(|request| request.signal_id.clone())
                .collect()
        };

        let datasource_id = if command.datasource_id.is_empty() {
            self.datasource_id.clone().unwrap_or_default()
        } else {
            command.datasource_id.clone()
        };
        let now = now_epoch_ms();

        signal_ids
            .into_iter()
            .map(|signal_id| {
                let key = (command.device_id.clone(), signal_id.clone());
                let echoed = self.written.get(&key).cloned();
                let value = match echoed {
                    Some(value) => value,
                    None => {
                        let data_type = command
                            .find_signal_definition(&signal_id)
                            .and_then(|definition| definition.data_type);
                        let profile = SignalProfile::from_configuration(
                            command.find_signal_configuration(&signal_id),
                        );
                        self.generate(data_type, profile)
                    }
                };
                Reading::new(datasource_id.clone(), command.device_id.clone(), signal_id, value)
                    .with_timestamp(now)
            })
            .collect()
    }

    fn generate(&mut self, data_type: Option<DataType>, profile: SignalProfile) -> Value {
        if profile.mode == ValueMode::Static {
            if let Some(value) = static_value(data_type, profile) {
                return value;
            }
        }
        match data_type {
            Some(DataType::Double | DataType::Float) => {
                // 按比例插值，跨度超出 f64 表示范围时依然有限
                let fraction: f64 = self.rng.r#gen();
                let value = profile.min * (1.0 - fraction) + profile.max * fraction;
                Value::from(value.clamp(profile.min, profile.max))
            }
            Some(DataType::Boolean) => Value::Bool(self.rng.gen_bool(0.5)),
            Some(DataType::String) => {
                let token = uuid::Uuid::new_v4().simple().to_string();
                Value::String(format!("Value-{}", &token[..8]))
            }
            Some(DataType::Date) => Value::String(Utc::now().format("%Y-%m-%d").to_string()),
            Some(DataType::Datetime) => {
                Value::String(Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Some(DataType::Timestamp) => Value::String(Utc::now().to_rfc3339()),
            Some(DataType::Binary) => Value::Array(
                (0..4)
                    .map(|_| Value::from(self.rng.gen_range(0..=u8::MAX)))
                    .collect(),
            ),
            Some(DataType::Integer | DataType::Long) | None => {
                let low = profile.min.ceil() as i64;
                let high = (profile.max.floor() as i64).max(low);
                Value::from(self.rng.gen_range(low..=high))
            }
        }
    }
}

/// 固定值模式；时间与二进制类型没有固定值，返回 None 回退到随机生成。
fn static_value(data_type: Option<DataType>, profile: SignalProfile) -> Option<Value> {
    let level = profile.level;
    if level == StaticLevel::Error {
        return Some(Value::String(level.as_str().to_string()));
    }
    let numeric = match level {
        StaticLevel::Low => profile.min,
        StaticLevel::Medium => profile.min / 2.0 + profile.max / 2.0,
        StaticLevel::High => profile.max,
        StaticLevel::On => 1.0,
        StaticLevel::Off | StaticLevel::Error => 0.0,
    };
    match data_type {
        Some(DataType::Boolean) => Some(Value::Bool(!matches!(
            level,
            StaticLevel::Off | StaticLevel::Low
        ))),
        Some(DataType::String) => Some(Value::String(level.as_str().to_string())),
        Some(DataType::Double | DataType::Float) => Some(Value::from(numeric)),
        Some(DataType::Integer | DataType::Long) | None => Some(Value::from(numeric.round() as i64)),
        Some(DataType::Date | DataType::Datetime | DataType::Timestamp | DataType::Binary) => None,
    }
}

fn read_delay(datasource: &Datasource, key: &str, default: u64) -> u64 {
    match datasource.property(key) {
        None => default,
        Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
            warn!(
                target: "acq.driver",
                datasource_id = %datasource.id,
                property = key,
                value = raw,
                "simulator_property_invalid"
            );
            default
        }),
    }
}

#[async_trait]
impl Driver for SimulatorDriver {
    fn id(&self) -> &str {
        SIMULATOR_DRIVER_ID
    }

    fn definition(&self) -> DriverDefinition {
        DriverDefinition {
            id: SIMULATOR_DRIVER_ID.to_string(),
            name: "Test Driver v1".to_string(),
            description: Some("Simulation driver for testing purposes".to_string()),
            version: "1.0.0".to_string(),
            connection_properties: vec![
                PropertyDefinition::new(MIN_DELAY_KEY, DataType::Integer)
                    .describe("Minimum delay in milliseconds when simulating connection")
                    .default_value(DEFAULT_MIN_DELAY_MS.to_string()),
                PropertyDefinition::new(MAX_DELAY_KEY, DataType::Integer)
                    .describe("Maximum delay in milliseconds when simulating connection")
                    .default_value(DEFAULT_MAX_DELAY_MS.to_string()),
            ],
            signal_properties: vec![
                PropertyDefinition::new("minValue", DataType::Float)
                    .describe("Minimum value for random signal generation")
                    .default_value("0"),
                PropertyDefinition::new("maxValue", DataType::Float)
                    .describe("Maximum value for random signal generation")
                    .default_value("100"),
                PropertyDefinition::new("valueType", DataType::String)
                    .describe("Type of value to generate")
                    .default_value("RANDOM")
                    .allow("RANDOM", "Random value within range")
                    .allow("STATIC", "Static predefined value"),
                PropertyDefinition::new("staticValue", DataType::String)
                    .describe("Predefined value used when valueType is STATIC")
                    .default_value("MEDIUM")
                    .allow("LOW", "Range minimum")
                    .allow("MEDIUM", "Range midpoint")
                    .allow("HIGH", "Range maximum")
                    .allow("ON", "Boolean on / numeric 1")
                    .allow("OFF", "Boolean off / numeric 0")
                    .allow("ERROR", "Malformed value"),
            ],
            tags: vec!["test".to_string(), "simulation".to_string()],
            created_at_ms: None,
            updated_at_ms: None,
        }
    }

    fn initialize(&mut self, datasource: &Datasource) {
        self.datasource_id = Some(datasource.id.clone());
        self.min_delay_ms = read_delay(datasource, MIN_DELAY_KEY, DEFAULT_MIN_DELAY_MS);
        self.max_delay_ms = read_delay(datasource, MAX_DELAY_KEY, DEFAULT_MAX_DELAY_MS);
        info!(target: "acq.driver", datasource_id = %datasource.id, "simulator_initialized");
    }

    async fn connect(&mut self) -> Result<(), DriverError> {
        if self.connected {
            return Ok(());
        }
        let Some(datasource_id) = self.datasource_id.clone() else {
            return Err(DriverError::Config("driver not initialized".to_string()));
        };
        let delay = self.connection_delay();
        tokio::time::sleep(delay).await;
        self.connected = true;
        info!(
            target: "acq.driver",
            datasource_id = %datasource_id,
            delay_ms = delay.as_millis() as u64,
            "simulator_connected"
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        self.connected = false;
        info!(
            target: "acq.driver",
            datasource_id = self.datasource_id.as_deref().unwrap_or_default(),
            "simulator_disconnected"
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn execute(&mut self, commands: &[DeviceCommand]) -> Result<Vec<Reading>, DriverError> {
        if !self.connected {
            return Err(DriverError::NotConnected);
        }
        let mut readings = Vec::new();
        for command in commands {
            match command.command_type {
                CommandType::Read => readings.extend(self.read_command(command)),
                CommandType::Write => self.apply_writes(command),
            }
        }
        debug!(
            target: "acq.driver",
            commands = commands.len(),
            readings = readings.len(),
            "simulator_executed"
        );
        Ok(readings)
    }

    async fn write(&mut self, commands: &[DeviceCommand]) -> Result<(), DriverError> {
        if !self.connected {
            return Err(DriverError::NotConnected);
        }
        for command in commands {
            if command.command_type == CommandType::Write {
                self.apply_writes(command);
            }
        }
        Ok(())
    }
}
