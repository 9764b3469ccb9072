//! 设备命令生命周期：创建 → 下发（可重试）→ 完成/失败，以及外部状态回写。

mod service;

use acq_engine::Engines;
use async_trait::async_trait;
use domain::{CommandError, CommandType, DeviceCommand};
use std::sync::Arc;
use tracing::debug;

pub use service::{CommandService, CommandServiceConfig};

/// 控制链路错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("dispatch error: {0}")]
    Dispatch(String),
    #[error("command not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    InvalidTransition(#[from] CommandError),
}

/// 命令下发器抽象。
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, command: &DeviceCommand) -> Result<(), ControlError>;
}

/// 空下发器（用于占位）。
#[derive(Debug, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl CommandDispatcher for NoopDispatcher {
    async fn dispatch(&self, _command: &DeviceCommand) -> Result<(), ControlError> {
        Ok(())
    }
}

/// 经引擎集群下发：WRITE 走驱动写入口，READ 走组合执行入口。
#[derive(Clone)]
pub struct FleetDispatcher {
    fleet: Arc<Engines>,
}

impl FleetDispatcher {
    pub fn new(fleet: Arc<Engines>) -> Self {
        Self { fleet }
    }
}

#[async_trait]
impl CommandDispatcher for FleetDispatcher {
    async fn dispatch(&self, command: &DeviceCommand) -> Result<(), ControlError> {
        match command.command_type {
            CommandType::Write => self
                .fleet
                .write_command(command)
                .await
                .map_err(|err| ControlError::Dispatch(err.to_string())),
            CommandType::Read => {
                let readings = self
                    .fleet
                    .execute_command(command)
                    .await
                    .map_err(|err| ControlError::Dispatch(err.to_string()))?;
                debug!(
                    target: "acq.control",
                    command_id = %command.id,
                    readings = readings.len(),
                    "read_command_dispatched"
                );
                Ok(())
            }
        }
    }
}
