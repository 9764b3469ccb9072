use acq_control::{
    CommandDispatcher, CommandService, CommandServiceConfig, ControlError, FleetDispatcher,
    NoopDispatcher,
};
use acq_driver::{DriverRegistry, SIMULATOR_DRIVER_ID};
use acq_engine::{Engines, FleetStores};
use acq_storage::{
    DatasourceStore, DeviceCommandStore, DeviceDefinitionStore, DeviceStore,
    InMemoryDatasourceStore, InMemoryDeviceCommandStore, InMemoryDeviceStateStore,
    InMemoryDeviceStore, InMemoryReadingStore, ReadingStore,
};
use async_trait::async_trait;
use domain::{
    CommandStatus, DataType, Datasource, Device, DeviceCommand, DeviceDefinition,
    SignalConfiguration, SignalDefinition, WriteRequest,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// 前 `failures` 次下发失败。
struct FlakyDispatcher {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyDispatcher {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl CommandDispatcher for FlakyDispatcher {
    async fn dispatch(&self, _command: &DeviceCommand) -> Result<(), ControlError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ControlError::Dispatch("device busy".to_string()));
        }
        Ok(())
    }
}

fn service(
    store: Arc<InMemoryDeviceCommandStore>,
    dispatcher: Arc<dyn CommandDispatcher>,
    max_retries: u32,
) -> CommandService {
    CommandService::new_with_config(
        store,
        dispatcher,
        CommandServiceConfig {
            dispatch_max_retries: max_retries,
            dispatch_backoff_ms: 1,
        },
    )
}

fn setpoint_write(datasource_id: &str, device_id: &str, value: f64) -> DeviceCommand {
    DeviceCommand::write(
        datasource_id,
        device_id,
        vec![WriteRequest {
            signal_id: "setpoint".to_string(),
            value: json!(value),
        }],
    )
}

#[tokio::test]
async fn successful_dispatch_completes_command() {
    let store = Arc::new(InMemoryDeviceCommandStore::new());
    let service = CommandService::new(store.clone(), Arc::new(NoopDispatcher));

    let issued = service
        .issue_command(setpoint_write("ds-1", "dev-1", 21.5))
        .await
        .expect("issue");
    assert_eq!(issued.status, CommandStatus::Completed);
    assert!(issued.created_at_ms.is_some());
    assert!(issued.sent_at_ms.is_some());
    assert!(issued.completed_at_ms.is_some());
    assert_eq!(issued.retry_count, 0);

    let stored = store
        .find_command(&issued.id)
        .await
        .expect("find")
        .expect("command");
    assert_eq!(stored.status, CommandStatus::Completed);
}

#[tokio::test]
async fn retries_until_dispatch_succeeds() {
    let store = Arc::new(InMemoryDeviceCommandStore::new());
    let dispatcher = Arc::new(FlakyDispatcher::new(1));
    let service = service(store, dispatcher.clone(), 2);

    let issued = service
        .issue_command(setpoint_write("ds-1", "dev-1", 18.0))
        .await
        .expect("issue");
    assert_eq!(issued.status, CommandStatus::Completed);
    assert_eq!(issued.retry_count, 1);
    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn exhausted_retries_fail_command() {
    let store = Arc::new(InMemoryDeviceCommandStore::new());
    let dispatcher = Arc::new(FlakyDispatcher::new(10));
    let service = service(store, dispatcher.clone(), 2);

    let issued = service
        .issue_command(setpoint_write("ds-1", "dev-1", 18.0))
        .await
        .expect("issue");
    assert_eq!(issued.status, CommandStatus::Failed);
    assert_eq!(issued.retry_count, 2);
    assert!(issued.sent_at_ms.is_none());
    assert!(
        issued
            .result_message
            .as_deref()
            .is_some_and(|message| message.contains("device busy"))
    );
    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn status_updates_only_move_forward() {
    let store = Arc::new(InMemoryDeviceCommandStore::new());
    let service = CommandService::new(store.clone(), Arc::new(NoopDispatcher));
    let pending = store
        .create_command(DeviceCommand::read("ds-1", "dev-1"))
        .await
        .expect("create");

    let sent = service
        .update_command_status(&pending.id, CommandStatus::Sent)
        .await
        .expect("sent");
    assert!(sent.sent_at_ms.is_some());

    let acknowledged = service
        .update_command_result(&pending.id, CommandStatus::Acknowledged, "ack from device")
        .await
        .expect("ack");
    assert_eq!(acknowledged.result_message.as_deref(), Some("ack from device"));

    assert!(matches!(
        service
            .update_command_status(&pending.id, CommandStatus::Pending)
            .await,
        Err(ControlError::InvalidTransition(_))
    ));

    let cancelled = service.cancel_command(&pending.id).await.expect("cancel");
    assert_eq!(cancelled.status, CommandStatus::Cancelled);
    assert!(matches!(
        service.cancel_command(&pending.id).await,
        Ok(command) if command.status == CommandStatus::Cancelled
    ));
    assert!(matches!(
        service
            .update_command_status(&pending.id, CommandStatus::Completed)
            .await,
        Err(ControlError::InvalidTransition(_))
    ));
}

#[tokio::test]
async fn unknown_command_is_not_found() {
    let store = Arc::new(InMemoryDeviceCommandStore::new());
    let service = CommandService::new(store, Arc::new(NoopDispatcher));
    assert!(matches!(
        service.cancel_command("missing").await,
        Err(ControlError::NotFound(id)) if id == "missing"
    ));
}

#[tokio::test]
async fn fleet_dispatcher_writes_through_the_simulator() {
    let datasources = Arc::new(InMemoryDatasourceStore::new());
    let devices = Arc::new(InMemoryDeviceStore::new());
    let readings = Arc::new(InMemoryReadingStore::new());
    datasources
        .create_datasource(
            Datasource::new("ds-sim", "Simulator", SIMULATOR_DRIVER_ID)
                .with_property("minConnectionDelay", "0")
                .with_property("maxConnectionDelay", "0"),
        )
        .await
        .expect("datasource");
    devices
        .create_device_definition(DeviceDefinition::new("hvac", "HVAC").with_signal(
            SignalDefinition::new("setpoint", "Setpoint", DataType::Float),
        ))
        .await
        .expect("definition");
    devices
        .create_device(
            Device::new("hvac-1", "ds-sim", "hvac").with_signal(SignalConfiguration::new("setpoint")),
        )
        .await
        .expect("device");

    let fleet = Arc::new(Engines::new(
        Arc::new(DriverRegistry::with_builtin_drivers()),
        FleetStores {
            datasources: datasources.clone(),
            devices: devices.clone(),
            device_definitions: devices.clone(),
            readings: readings.clone(),
            device_states: Arc::new(InMemoryDeviceStateStore::new()),
        },
    ));
    assert_eq!(fleet.load_and_start_engines().await, 1);

    let store = Arc::new(InMemoryDeviceCommandStore::new());
    let service = CommandService::new(store.clone(), Arc::new(FleetDispatcher::new(fleet.clone())));

    let written = service
        .issue_command(setpoint_write("ds-sim", "hvac-1", 22.5))
        .await
        .expect("write");
    assert_eq!(written.status, CommandStatus::Completed);

    let read = service
        .issue_command(DeviceCommand::read("ds-sim", "hvac-1"))
        .await
        .expect("read");
    assert_eq!(read.status, CommandStatus::Completed);
    let stored = readings.list_by_device("hvac-1").await.expect("readings");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].value, json!(22.5));

    let orphan = service
        .issue_command(setpoint_write("ds-missing", "hvac-1", 1.0))
        .await
        .expect("orphan");
    assert_eq!(orphan.status, CommandStatus::Failed);
    assert_eq!(store.list_commands_by_device("hvac-1").await.expect("list").len(), 3);

    fleet.shutdown().await;
}
