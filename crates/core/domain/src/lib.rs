//! 采集引擎领域模型。
//!
//! - 配置侧：Datasource / Device / DeviceDefinition / SignalDefinition / SignalConfiguration
//! - 驱动元数据：DriverDefinition / PropertyDefinition
//! - 运行侧：Reading / DeviceState / DeviceCommand
//! - 规则：Expression（表达式求值）与 AlarmCondition / ValidateCondition

pub mod command;
pub mod condition;
pub mod datasource;
pub mod definition;
pub mod expression;
pub mod reading;
pub mod state;

pub use command::{CommandError, CommandStatus, CommandType, DeviceCommand, ReadRequest, WriteRequest};
pub use condition::{AlarmCondition, AlarmSeverity, Condition, Evaluable, ValidateCondition};
pub use datasource::{Datasource, Device, Property, SignalConfiguration};
pub use definition::{
    DataType, DeviceDefinition, DriverDefinition, PropertyDefinition, SignalDefinition,
};
pub use expression::{EvalError, Expression, Variables};
pub use reading::{Reading, meta_id};
pub use state::{DeviceState, HealthStatus, SignalState};

/// 当前时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
