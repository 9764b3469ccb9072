//! 设备实时状态快照。

use crate::reading::Reading;
use serde::{Deserialize, Serialize};

/// 设备健康度。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Degraded,
    Critical,
    Maintenance,
}

/// 单信号最新读数。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalState {
    pub signal_id: String,
    pub last_reading: Option<Reading>,
}

/// 每个设备一份状态：连接、健康度与各信号最新读数（按首次出现顺序）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceState {
    pub id: Option<String>,
    pub device_id: String,
    pub created_at_ms: Option<i64>,
    pub updated_at_ms: Option<i64>,
    pub signal_states: Vec<SignalState>,
    pub connected: bool,
    pub connection_status: Option<String>,
    pub health_status: HealthStatus,
}

impl DeviceState {
    /// 新建状态：已连接、健康。
    pub fn new_for_device(device_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            device_id: device_id.into(),
            created_at_ms: Some(now_ms),
            updated_at_ms: Some(now_ms),
            signal_states: Vec::new(),
            connected: true,
            connection_status: Some("CONNECTED".to_string()),
            health_status: HealthStatus::Healthy,
        }
    }

    pub fn signal_state(&self, signal_id: &str) -> Option<&SignalState> {
        self.signal_states
            .iter()
            .find(|state| state.signal_id == signal_id)
    }

    /// 以读数覆盖该信号的最新值，不存在则追加。
    pub fn upsert_signal(&mut self, reading: Reading) {
        match self
            .signal_states
            .iter_mut()
            .find(|state| state.signal_id == reading.signal_id)
        {
            Some(state) => state.last_reading = Some(reading),
            None => self.signal_states.push(SignalState {
                signal_id: reading.signal_id.clone(),
                last_reading: Some(reading),
            }),
        }
    }

    /// 告警导致的自动降级：仅 HEALTHY → DEGRADED，不会自动恢复。
    pub fn degrade_on_alarm(&mut self) -> bool {
        if self.health_status == HealthStatus::Healthy {
            self.health_status = HealthStatus::Degraded;
            return true;
        }
        false
    }

    /// 外部显式复位健康度。
    pub fn reset_health(&mut self, now_ms: i64) {
        self.health_status = HealthStatus::Healthy;
        self.updated_at_ms = Some(now_ms);
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at_ms = Some(now_ms);
    }
}
