mod common;

use acq_engine::{EngineError, EngineStatus, PollScheduler, SchedulerConfig};
use acq_storage::{DatasourceStore, DeviceStore};
use common::{Harness, Script, thermostat};
use domain::{Datasource, DeviceCommand};
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn load_starts_every_datasource_with_devices() {
    let harness = Harness::new().await;
    harness.add_datasource("ds-a", &["a1"]).await;
    harness.add_datasource("ds-b", &["b1", "b2"]).await;
    harness.add_datasource("ds-empty", &[]).await;
    let fleet = harness.fleet();

    assert_eq!(fleet.load_and_start_engines().await, 2);
    assert_eq!(fleet.active_engine_ids(), vec!["ds-a", "ds-b"]);
    let status = fleet.engine_status();
    assert_eq!(status.get("ds-a"), Some(&true));
    assert!(!status.contains_key("ds-empty"));

    let stored = harness
        .datasources
        .find_datasource("ds-a")
        .await
        .expect("find")
        .expect("datasource");
    assert!(stored.connected);
    assert_eq!(stored.connection_status.as_deref(), Some("CONNECTED"));
    assert!(stored.last_connection_ms.is_some());
}

#[tokio::test]
async fn zero_devices_inactive_or_unknown_driver_is_refused() {
    let harness = Harness::new().await;
    let empty = harness.add_datasource("ds-empty", &[]).await;
    let fleet = harness.fleet();
    assert!(!fleet.create_and_start_engine(&empty).await);

    let mut inactive = harness.add_datasource("ds-off", &["off-1"]).await;
    inactive.active = false;
    assert!(!fleet.create_and_start_engine(&inactive).await);

    let unknown = Datasource::new("ds-x", "x", "modbus-tcp");
    harness
        .devices
        .create_device(thermostat("x1", "ds-x"))
        .await
        .expect("device");
    assert!(!fleet.create_and_start_engine(&unknown).await);

    assert!(fleet.active_engine_ids().is_empty());
    assert_eq!(Script::count(&harness.script.connects), 0);
}

#[tokio::test]
async fn inactive_devices_are_not_bound() {
    let harness = Harness::new().await;
    let datasource = harness.add_datasource("ds-a", &["a1"]).await;
    let mut retired = thermostat("a2", "ds-a");
    retired.active = false;
    harness.devices.create_device(retired).await.expect("device");
    let fleet = harness.fleet();

    assert!(fleet.create_and_start_engine(&datasource).await);
    let engine = fleet.engine("ds-a").expect("engine");
    assert!(engine.owns_device("a1"));
    assert!(!engine.owns_device("a2"));
    assert_eq!(engine.statistics().device_count, 1);
}

#[tokio::test]
async fn failed_start_is_not_registered() {
    let harness = Harness::new().await;
    let datasource = harness.add_datasource("ds-a", &["a1"]).await;
    harness.script.fail_connect.store(true, Ordering::SeqCst);
    let fleet = harness.fleet();

    assert!(!fleet.create_and_start_engine(&datasource).await);
    assert!(fleet.engine("ds-a").is_none());
}

#[tokio::test]
async fn existing_engine_is_reused() {
    let harness = Harness::new().await;
    let datasource = harness.add_datasource("ds-a", &["a1"]).await;
    let fleet = harness.fleet();

    assert!(fleet.create_and_start_engine(&datasource).await);
    assert!(fleet.create_and_start_engine(&datasource).await);
    assert_eq!(Script::count(&harness.script.connects), 1);
}

#[tokio::test]
async fn poll_devices_groups_by_datasource_and_filters() {
    let harness = Harness::new().await;
    harness.add_datasource("ds-a", &["a1", "a2"]).await;
    harness.add_datasource("ds-b", &["b1"]).await;
    let fleet = harness.fleet();
    fleet.load_and_start_engines().await;

    let readings = fleet
        .poll_devices(&["a1".to_string(), "b1".to_string(), "ghost".to_string()])
        .await;
    assert_eq!(readings.len(), 4);
    assert!(
        readings
            .iter()
            .all(|reading| reading.device_id == "a1" || reading.device_id == "b1")
    );
    assert_eq!(Script::count(&harness.script.executes), 2);
    // a2 的读数同样落库，只是不在返回结果中
    assert_eq!(harness.readings.len(), 6);
    assert!(fleet.poll_devices(&[]).await.is_empty());
}

#[tokio::test]
async fn stop_and_restart_engine() {
    let harness = Harness::new().await;
    harness.add_datasource("ds-a", &["a1"]).await;
    let fleet = harness.fleet();
    fleet.load_and_start_engines().await;

    assert!(!fleet.stop_engine("ds-missing").await);
    assert!(!fleet.restart_engine("ds-missing").await);

    assert!(fleet.restart_engine("ds-a").await);
    assert_eq!(Script::count(&harness.script.connects), 2);
    assert_eq!(Script::count(&harness.script.disconnects), 1);
    assert_eq!(fleet.statistics("ds-a").expect("stats").poll_count, 0);

    assert!(fleet.stop_engine("ds-a").await);
    assert!(fleet.engine("ds-a").is_none());
    assert!(fleet.poll_engine("ds-a").await.is_empty());
    let stored = harness
        .datasources
        .find_datasource("ds-a")
        .await
        .expect("find")
        .expect("datasource");
    assert!(!stored.connected);
    assert_eq!(stored.connection_status.as_deref(), Some("DISCONNECTED"));
}

#[tokio::test]
async fn commands_are_routed_by_datasource() {
    let harness = Harness::new().await;
    harness.add_datasource("ds-a", &["a1"]).await;
    let fleet = harness.fleet();
    fleet.load_and_start_engines().await;

    let orphan = DeviceCommand::write("ds-missing", "a1", Vec::new());
    assert!(matches!(
        fleet.write_command(&orphan).await,
        Err(EngineError::EngineNotFound(id)) if id == "ds-missing"
    ));

    fleet
        .write_command(&DeviceCommand::write("ds-a", "a1", Vec::new()))
        .await
        .expect("write");
    let readings = fleet
        .execute_command(&DeviceCommand::read("ds-a", "a1"))
        .await
        .expect("execute");
    assert_eq!(readings.len(), 2);
    assert_eq!(Script::count(&harness.script.writes), 1);
}

#[tokio::test]
async fn aggregate_statistics_and_shutdown() {
    let harness = Harness::new().await;
    harness.add_datasource("ds-a", &["a1"]).await;
    harness.add_datasource("ds-b", &["b1"]).await;
    let fleet = harness.fleet();
    fleet.load_and_start_engines().await;
    fleet.poll_engine("ds-a").await;
    fleet.poll_engine("ds-b").await;

    let totals = fleet.fleet_statistics();
    assert_eq!(totals.engine_count, 2);
    assert_eq!(totals.running_count, 2);
    assert_eq!(totals.poll_count, 2);
    assert_eq!(totals.reading_count, 4);
    let all = fleet.all_statistics();
    assert_eq!(all[0].datasource_id, "ds-a");
    assert_eq!(all[0].status, EngineStatus::Running);

    fleet.shutdown().await;
    assert!(fleet.active_engine_ids().is_empty());
    assert_eq!(Script::count(&harness.script.disconnects), 2);
    assert_eq!(fleet.fleet_statistics().engine_count, 0);
}

#[tokio::test]
async fn scheduler_polls_every_interval() {
    let harness = Harness::new().await;
    harness.add_datasource("ds-a", &["a1"]).await;
    let fleet = harness.fleet();
    fleet.load_and_start_engines().await;

    let scheduler = PollScheduler::spawn(
        fleet.clone(),
        SchedulerConfig {
            interval: Duration::from_millis(20),
            concurrency: 0,
        },
    );
    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.stop().await;
    // 等待最后一个周期派生的任务结束
    tokio::time::sleep(Duration::from_millis(30)).await;

    let polled = Script::count(&harness.script.executes);
    assert!(polled >= 2, "polled {polled} times");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(Script::count(&harness.script.executes), polled);
}

#[tokio::test]
async fn scheduler_skips_engine_still_polling() {
    let harness = Harness::new().await;
    harness.add_datasource("ds-a", &["a1"]).await;
    harness
        .script
        .execute_delay_ms
        .store(300, Ordering::SeqCst);
    let fleet = harness.fleet();
    fleet.load_and_start_engines().await;

    let scheduler = PollScheduler::spawn(
        fleet.clone(),
        SchedulerConfig {
            interval: Duration::from_millis(20),
            concurrency: 0,
        },
    );
    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.stop().await;

    assert_eq!(Script::count(&harness.script.executes), 1);
    assert!(acq_telemetry::snapshot().polls_skipped > 0);
}

#[tokio::test]
async fn bounded_scheduler_queues_at_most_one_poll_per_engine() {
    let harness = Harness::new().await;
    harness.add_datasource("ds-a", &["a1"]).await;
    harness
        .script
        .execute_delay_ms
        .store(100, Ordering::SeqCst);
    let fleet = harness.fleet();
    fleet.load_and_start_engines().await;
    let skipped_before = acq_telemetry::snapshot().polls_skipped;

    let scheduler = PollScheduler::spawn(
        fleet.clone(),
        SchedulerConfig {
            interval: Duration::from_millis(10),
            concurrency: 1,
        },
    );
    tokio::time::sleep(Duration::from_millis(250)).await;
    scheduler.stop().await;

    let at_stop = Script::count(&harness.script.executes);
    assert!((1..=3).contains(&at_stop), "polled {at_stop} times");
    assert!(acq_telemetry::snapshot().polls_skipped > skipped_before);

    // 停止后只允许已在执行的轮询收尾，不再有排队的轮询
    tokio::time::sleep(Duration::from_millis(400)).await;
    let after = Script::count(&harness.script.executes);
    assert!(after <= at_stop + 1, "polled {after} times after stop at {at_stop}");
}
