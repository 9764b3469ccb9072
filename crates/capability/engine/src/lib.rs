//! 采集运行时
//!
//! - `Engine`：单数据源运行时（启动/停止/轮询/命令）与读数处理流水线
//! - `Engines`：引擎集群，负责按数据源创建、路由与汇总统计
//! - `PollScheduler`：固定周期轮询调度

pub mod engine;
pub mod error;
pub mod fleet;
mod processing;
pub mod scheduler;

pub use engine::{Engine, EngineStatistics, EngineStatus};
pub use error::EngineError;
pub use fleet::{Engines, FleetStatistics, FleetStores};
pub use scheduler::{PollScheduler, SchedulerConfig};
