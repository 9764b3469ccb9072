//! 设备命令模型。

use crate::datasource::SignalConfiguration;
use crate::definition::SignalDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    #[default]
    Read,
    Write,
}

/// 命令状态。PENDING → SENT → ACKNOWLEDGED → {COMPLETED | FAILED | CANCELLED}。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    #[default]
    Pending,
    Sent,
    Acknowledged,
    Completed,
    Failed,
    Cancelled,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Sent => 1,
            Self::Acknowledged => 2,
            Self::Completed | Self::Failed | Self::Cancelled => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("invalid command transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriteRequest {
    pub signal_id: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadRequest {
    pub signal_id: String,
}

/// 设备命令。
///
/// `signal_configurations` / `signal_definitions` 仅在下发前由引擎临时填充，不参与持久化。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceCommand {
    pub id: String,
    pub datasource_id: String,
    pub device_id: String,
    pub command_type: CommandType,
    pub write: Vec<WriteRequest>,
    pub read: Vec<ReadRequest>,
    pub created_at_ms: Option<i64>,
    pub created_by: Option<String>,
    pub status: CommandStatus,
    pub sent_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub result_message: Option<String>,
    pub retry_count: u32,
    #[serde(skip)]
    pub signal_configurations: Vec<SignalConfiguration>,
    #[serde(skip)]
    pub signal_definitions: Vec<SignalDefinition>,
}

impl DeviceCommand {
    pub fn read(datasource_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            datasource_id: datasource_id.into(),
            device_id: device_id.into(),
            command_type: CommandType::Read,
            ..Self::default()
        }
    }

    pub fn write(
        datasource_id: impl Into<String>,
        device_id: impl Into<String>,
        writes: Vec<WriteRequest>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            datasource_id: datasource_id.into(),
            device_id: device_id.into(),
            command_type: CommandType::Write,
            write: writes,
            ..Self::default()
        }
    }

    /// 状态迁移。同状态为空操作（返回 false）；回退或离开终态返回错误。
    pub fn transition(&mut self, next: CommandStatus, now_ms: i64) -> Result<bool, CommandError> {
        if self.status == next {
            return Ok(false);
        }
        if self.status.is_terminal() || next.rank() < self.status.rank() {
            return Err(CommandError::InvalidTransition {
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        if next == CommandStatus::Sent {
            self.sent_at_ms = Some(now_ms);
        }
        if next.is_terminal() {
            self.completed_at_ms = Some(now_ms);
        }
        self.status = next;
        Ok(true)
    }

    pub fn find_signal_definition(&self, signal_id: &str) -> Option<&SignalDefinition> {
        self.signal_definitions
            .iter()
            .find(|definition| definition.id == signal_id)
    }

    pub fn find_signal_configuration(&self, signal_id: &str) -> Option<&SignalConfiguration> {
        self.signal_configurations
            .iter()
            .find(|configuration| configuration.signal_id == signal_id)
    }
}
