use acq_storage::{
    DatasourceStore, DeviceDefinitionStore, DeviceStore, DriverDefinitionStore,
    InMemoryDatasourceStore, InMemoryDeviceStore, InMemoryDriverDefinitionStore,
};
use domain::{Datasource, Device, DeviceDefinition, DriverDefinition};

#[tokio::test]
async fn list_active_skips_inactive_datasources() {
    let store = InMemoryDatasourceStore::new();
    store
        .create_datasource(Datasource::new("ds-2", "Line 2", "test-driver-v1"))
        .await
        .expect("create");
    let mut inactive = Datasource::new("ds-1", "Line 1", "test-driver-v1");
    inactive.active = false;
    store.create_datasource(inactive).await.expect("create");

    let active = store.list_active().await.expect("list");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "ds-2");
    assert!(active[0].created_at_ms.is_some());
}

#[tokio::test]
async fn update_datasource_keeps_creation_time() {
    let store = InMemoryDatasourceStore::new();
    let created = store
        .create_datasource(Datasource::new("ds-1", "Line 1", "test-driver-v1"))
        .await
        .expect("create");
    let mut changed = created.clone();
    changed.connected = true;
    changed.connection_status = Some("CONNECTED".to_string());
    let updated = store
        .update_datasource("ds-1", changed)
        .await
        .expect("update")
        .expect("exists");
    assert!(updated.connected);
    assert_eq!(updated.created_at_ms, created.created_at_ms);

    let missing = store
        .update_datasource("ds-x", Datasource::default())
        .await
        .expect("update");
    assert!(missing.is_none());
}

#[tokio::test]
async fn devices_are_grouped_by_datasource() {
    let store = InMemoryDeviceStore::new();
    store
        .create_device(Device::new("dev-b", "ds-1", "def-1"))
        .await
        .expect("create");
    store
        .create_device(Device::new("dev-a", "ds-1", "def-1"))
        .await
        .expect("create");
    store
        .create_device(Device::new("dev-c", "ds-2", "def-1"))
        .await
        .expect("create");

    let devices = store.list_by_datasource("ds-1").await.expect("list");
    let ids: Vec<_> = devices.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["dev-a", "dev-b"]);
    assert!(store.create_device(Device::new("dev-a", "ds-1", "def-1")).await.is_err());

    store
        .create_device_definition(DeviceDefinition::new("def-1", "Meter"))
        .await
        .expect("definition");
    let definition = store
        .find_device_definition("def-1")
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(definition.name, "Meter");
}

#[tokio::test]
async fn driver_definitions_upsert_by_id() {
    let store = InMemoryDriverDefinitionStore::new();
    let definition = DriverDefinition {
        id: "test-driver-v1".to_string(),
        name: "Test".to_string(),
        version: "1.0.0".to_string(),
        ..DriverDefinition::default()
    };
    store
        .create_driver_definition(definition.clone())
        .await
        .expect("create");
    assert!(store.create_driver_definition(definition.clone()).await.is_err());

    let renamed = DriverDefinition {
        name: "Simulator".to_string(),
        ..definition
    };
    let updated = store
        .update_driver_definition("test-driver-v1", renamed)
        .await
        .expect("update")
        .expect("exists");
    assert_eq!(updated.name, "Simulator");
    assert_eq!(store.list_driver_definitions().await.expect("list").len(), 1);
}
