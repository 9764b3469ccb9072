//! # 驱动能力模块
//!
//! 采集引擎与现场设备之间的插件边界：
//! - **Driver**：驱动契约（初始化 / 连接 / 断开 / 读写合一执行 / 写入）
//! - **DriverRegistry**：启动时显式登记的驱动工厂表，按 ID 创建全新实例，并发布驱动元数据
//! - **SimulatorDriver**：内置仿真驱动 `test-driver-v1`
//!
//! ## 架构设计
//!
//! ```text
//! DriverRegistry (driver_id → factory + DriverDefinition)
//!       │ create_driver
//!       ▼
//! Box<dyn Driver>  ── 独占于一个 Engine
//!       │ execute / write
//!       ▼
//! 现场设备 / 仿真
//! ```
//!
//! 具体现场协议（Modbus、MQTT、OPC-UA 等）的线缆级实现不在本模块内，
//! 新协议通过实现 [`Driver`] 并在注册表登记接入。

mod driver;
mod error;
mod registry;
mod simulator;

pub use driver::Driver;
pub use error::DriverError;
pub use registry::{DriverFactory, DriverRegistry};
pub use simulator::{SIMULATOR_DRIVER_ID, SimulatorDriver};
