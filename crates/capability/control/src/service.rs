use crate::{CommandDispatcher, ControlError};
use acq_storage::DeviceCommandStore;
use acq_telemetry::{
    record_command_dispatch_failure, record_command_dispatch_success, record_command_issued,
};
use domain::{CommandStatus, DeviceCommand, now_epoch_ms};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct CommandServiceConfig {
    pub dispatch_max_retries: u32,
    pub dispatch_backoff_ms: u64,
}

/// 命令服务（落库 + 下发 + 状态流转）。
#[derive(Clone)]
pub struct CommandService {
    command_store: Arc<dyn DeviceCommandStore>,
    dispatcher: Arc<dyn CommandDispatcher>,
    config: CommandServiceConfig,
}

impl CommandService {
    pub fn new(
        command_store: Arc<dyn DeviceCommandStore>,
        dispatcher: Arc<dyn CommandDispatcher>,
    ) -> Self {
        Self::new_with_config(command_store, dispatcher, CommandServiceConfig::default())
    }

    pub fn new_with_config(
        command_store: Arc<dyn DeviceCommandStore>,
        dispatcher: Arc<dyn CommandDispatcher>,
        config: CommandServiceConfig,
    ) -> Self {
        Self {
            command_store,
            dispatcher,
            config,
        }
    }

    /// 以 PENDING 落库后下发：成功流转为 SENT → COMPLETED，重试耗尽流转为 FAILED。
    pub async fn issue_command(
        &self,
        mut command: DeviceCommand,
    ) -> Result<DeviceCommand, ControlError> {
        record_command_issued();
        if command.id.is_empty() {
            command.id = uuid::Uuid::new_v4().to_string();
        }
        command.status = CommandStatus::Pending;
        command.created_at_ms = Some(now_epoch_ms());
        command.sent_at_ms = None;
        command.completed_at_ms = None;
        command.result_message = None;
        command.retry_count = 0;

        let created = self
            .command_store
            .create_command(command.clone())
            .await
            .map_err(|err| ControlError::Storage(err.to_string()))?;
        info!(
            target: "acq.control",
            command_id = %created.id,
            datasource_id = %created.datasource_id,
            device_id = %created.device_id,
            command_type = ?created.command_type,
            "command_created"
        );

        let mut attempt = 0u32;
        let outcome = loop {
            match self.dispatcher.dispatch(&command).await {
                Ok(()) => break Ok(()),
                Err(err) => {
                    warn!(
                        target: "acq.control",
                        command_id = %command.id,
                        attempt,
                        error = %err,
                        "command_dispatch_attempt_failed"
                    );
                    if attempt >= self.config.dispatch_max_retries {
                        break Err(err);
                    }
                    attempt += 1;
                    command.retry_count = attempt;
                    if self.config.dispatch_backoff_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.config.dispatch_backoff_ms))
                            .await;
                    }
                }
            }
        };

        let now = now_epoch_ms();
        match &outcome {
            Ok(()) => {
                record_command_dispatch_success();
                command.transition(CommandStatus::Sent, now)?;
                command.transition(CommandStatus::Completed, now)?;
            }
            Err(err) => {
                record_command_dispatch_failure();
                command.transition(CommandStatus::Failed, now)?;
                command.result_message = Some(err.to_string());
            }
        }
        info!(
            target: "acq.control",
            command_id = %command.id,
            status = command.status.as_str(),
            retries = command.retry_count,
            "command_dispatched"
        );
        self.persist(command).await
    }

    pub async fn find_command(&self, command_id: &str) -> Result<DeviceCommand, ControlError> {
        self.command_store
            .find_command(command_id)
            .await
            .map_err(|err| ControlError::Storage(err.to_string()))?
            .ok_or_else(|| ControlError::NotFound(command_id.to_string()))
    }

    pub async fn list_commands(&self, device_id: &str) -> Result<Vec<DeviceCommand>, ControlError> {
        self.command_store
            .list_commands_by_device(device_id)
            .await
            .map_err(|err| ControlError::Storage(err.to_string()))
    }

    /// 外部回写状态；只允许向前流转。
    pub async fn update_command_status(
        &self,
        command_id: &str,
        status: CommandStatus,
    ) -> Result<DeviceCommand, ControlError> {
        let mut command = self.find_command(command_id).await?;
        if !command.transition(status, now_epoch_ms())? {
            return Ok(command);
        }
        self.persist(command).await
    }

    pub async fn update_command_result(
        &self,
        command_id: &str,
        status: CommandStatus,
        message: impl Into<String>,
    ) -> Result<DeviceCommand, ControlError> {
        let mut command = self.find_command(command_id).await?;
        command.transition(status, now_epoch_ms())?;
        command.result_message = Some(message.into());
        self.persist(command).await
    }

    pub async fn cancel_command(&self, command_id: &str) -> Result<DeviceCommand, ControlError> {
        self.update_command_status(command_id, CommandStatus::Cancelled)
            .await
    }

    async fn persist(&self, command: DeviceCommand) -> Result<DeviceCommand, ControlError> {
        let command_id = command.id.clone();
        let updated = self
            .command_store
            .update_command(&command_id, command)
            .await
            .map_err(|err| ControlError::Storage(err.to_string()))?
            .ok_or_else(|| ControlError::NotFound(command_id.clone()))?;
        info!(
            target: "acq.control",
            command_id = %command_id,
            status = updated.status.as_str(),
            "command_updated"
        );
        Ok(updated)
    }
}
