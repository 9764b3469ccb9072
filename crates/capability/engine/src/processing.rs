//! 读数处理流水线
//!
//! 每个轮询周期对驱动返回的原始读数依次执行：
//! 1. 匹配设备与信号定义（匹配不到直接丢弃）
//! 2. 类型校验 + ValidateCondition 校验
//! 3. 告警检测（首个命中的 AlarmCondition 生效）
//! 4. 读数落库
//! 5. 设备状态按设备聚合，周期结束时每个设备只写一次

use acq_storage::{DeviceStateStore, ReadingStore};
use acq_telemetry::{
    record_alarm_raised, record_device_state_write, record_reading_dropped,
    record_reading_invalid, record_reading_persisted,
};
use domain::{
    Device, DeviceCommand, DeviceDefinition, DeviceState, Evaluable, Reading, SignalDefinition,
    Variables, now_epoch_ms,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// 引擎绑定的设备及其类型定义索引。
pub(crate) struct DeviceCatalog {
    devices: Vec<Device>,
    definitions: HashMap<String, DeviceDefinition>,
}

impl DeviceCatalog {
    pub(crate) fn new(devices: Vec<Device>, definitions: Vec<DeviceDefinition>) -> Self {
        let definitions = definitions
            .into_iter()
            .map(|definition| (definition.id.clone(), definition))
            .collect();
        Self {
            devices,
            definitions,
        }
    }

    pub(crate) fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub(crate) fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.id == device_id)
    }

    fn definition_for(&self, device: &Device) -> Option<&DeviceDefinition> {
        device
            .device_definition_id
            .as_deref()
            .and_then(|definition_id| self.definitions.get(definition_id))
    }

    pub(crate) fn signal_definition(
        &self,
        device_id: &str,
        signal_id: &str,
    ) -> Option<(&Device, &SignalDefinition)> {
        let device = self.device(device_id)?;
        let signal = self.definition_for(device)?.find_signal(signal_id)?;
        Some((device, signal))
    }

    /// 为命令补齐设备的信号配置与对应信号定义。
    ///
    /// 定义中不存在的已配置信号被跳过；设备不属于本引擎时返回 false。
    pub(crate) fn enrich(&self, command: &mut DeviceCommand) -> bool {
        let Some(device) = self.device(&command.device_id) else {
            return false;
        };
        let definition = self.definition_for(device);
        command.signal_configurations = device.signal_configurations.clone();
        command.signal_definitions = device
            .signal_configurations
            .iter()
            .filter_map(|configuration| {
                definition.and_then(|definition| definition.find_signal(&configuration.signal_id))
            })
            .cloned()
            .collect();
        true
    }
}

/// 类型校验与全部 ValidateCondition。
pub(crate) fn validate(reading: &Reading, signal: &SignalDefinition, vars: &Variables) -> bool {
    if signal
        .data_type
        .as_ref()
        .is_some_and(|data_type| !data_type.is_valid_value(&reading.value))
    {
        return false;
    }
    signal
        .validate_conditions
        .iter()
        .all(|condition| condition.is_satisfied_by(vars))
}

/// 首个命中的告警条件写入读数；返回是否告警。
pub(crate) fn detect_alarm(
    reading: &mut Reading,
    signal: &SignalDefinition,
    vars: &Variables,
) -> bool {
    reading.in_alarm = false;
    reading.alarm_message = None;
    reading.alarm_severity = None;
    if !signal.alarms_enabled || signal.alarm_conditions.is_empty() {
        return false;
    }
    let Some(condition) = signal
        .alarm_conditions
        .iter()
        .find(|condition| condition.evaluate(vars))
    else {
        return false;
    };
    reading.in_alarm = true;
    reading.alarm_severity = Some(condition.severity);
    reading.alarm_message = Some(condition.message());
    true
}

struct PendingState {
    state: DeviceState,
    stored: bool,
}

/// 读数处理器：持有读数与设备状态两个存储协作方。
#[derive(Clone)]
pub(crate) struct ReadingPipeline {
    readings: Arc<dyn ReadingStore>,
    device_states: Arc<dyn DeviceStateStore>,
}

impl ReadingPipeline {
    pub(crate) fn new(
        readings: Arc<dyn ReadingStore>,
        device_states: Arc<dyn DeviceStateStore>,
    ) -> Self {
        Self {
            readings,
            device_states,
        }
    }

    /// 处理一个周期的原始读数，返回成功落库的读数。
    pub(crate) async fn process(&self, catalog: &DeviceCatalog, raw: Vec<Reading>) -> Vec<Reading> {
        let mut processed = Vec::with_capacity(raw.len());
        let mut pending: BTreeMap<String, PendingState> = BTreeMap::new();

        for mut reading in raw {
            let Some((device, signal)) =
                catalog.signal_definition(&reading.device_id, &reading.signal_id)
            else {
                record_reading_dropped();
                debug!(
                    target: "acq.engine",
                    device_id = %reading.device_id,
                    signal_id = %reading.signal_id,
                    "reading_unmapped"
                );
                continue;
            };

            // 校验与告警共用同一份变量上下文
            let alarmed = {
                let vars = reading.variables();
                reading.valid = validate(&reading, signal, &vars);
                reading.valid && detect_alarm(&mut reading, signal, &vars)
            };
            if !reading.valid {
                record_reading_invalid();
                debug!(
                    target: "acq.engine",
                    device_id = %device.id,
                    signal_id = %signal.id,
                    value = %reading.value,
                    "reading_invalid"
                );
            }
            if alarmed {
                record_alarm_raised();
                warn!(
                    target: "acq.engine",
                    device_id = %device.id,
                    signal_id = %signal.id,
                    severity = ?reading.alarm_severity,
                    message = reading.alarm_message.as_deref().unwrap_or_default(),
                    "reading_in_alarm"
                );
            }

            let saved = match self.readings.create_reading(reading).await {
                Ok(saved) => saved,
                Err(err) => {
                    warn!(
                        target: "acq.engine",
                        device_id = %device.id,
                        signal_id = %signal.id,
                        error = %err,
                        "reading_persist_failed"
                    );
                    continue;
                }
            };
            record_reading_persisted();

            if !pending.contains_key(&device.id) {
                match self.load_state(&device.id).await {
                    Some(entry) => {
                        pending.insert(device.id.clone(), entry);
                    }
                    None => {
                        processed.push(saved);
                        continue;
                    }
                }
            }
            if let Some(entry) = pending.get_mut(&device.id) {
                if saved.in_alarm && entry.state.degrade_on_alarm() {
                    warn!(
                        target: "acq.engine",
                        device_id = %device.id,
                        "device_health_degraded"
                    );
                }
                entry.state.upsert_signal(saved.clone());
            }
            processed.push(saved);
        }

        self.flush_states(pending).await;
        processed
    }

    async fn load_state(&self, device_id: &str) -> Option<PendingState> {
        match self.device_states.find_by_device_id(device_id).await {
            Ok(Some(state)) => Some(PendingState {
                state,
                stored: true,
            }),
            Ok(None) => Some(PendingState {
                state: DeviceState::new_for_device(device_id, now_epoch_ms()),
                stored: false,
            }),
            Err(err) => {
                warn!(
                    target: "acq.engine",
                    device_id = %device_id,
                    error = %err,
                    "device_state_load_failed"
                );
                None
            }
        }
    }

    async fn flush_states(&self, pending: BTreeMap<String, PendingState>) {
        let now = now_epoch_ms();
        for (device_id, PendingState { mut state, stored }) in pending {
            state.touch(now);
            let result = match (stored, state.id.clone()) {
                (true, Some(state_id)) => self
                    .device_states
                    .update_device_state(&state_id, state)
                    .await
                    .map(|updated| updated.is_some()),
                _ => self
                    .device_states
                    .create_device_state(state)
                    .await
                    .map(|_| true),
            };
            match result {
                Ok(true) => record_device_state_write(),
                Ok(false) => warn!(
                    target: "acq.engine",
                    device_id = %device_id,
                    "device_state_vanished"
                ),
                Err(err) => warn!(
                    target: "acq.engine",
                    device_id = %device_id,
                    error = %err,
                    "device_state_persist_failed"
                ),
            }
        }
    }
}
