//! 采集读数。

use crate::condition::AlarmSeverity;
use crate::expression::Variables;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 时序元 ID：`datasource:device:signal`。
///
/// 各段中的 `\` 与 `:` 会被转义，不同三元组不会拼出相同的 ID。
pub fn meta_id(datasource_id: &str, device_id: &str, signal_id: &str) -> String {
    format!(
        "{}:{}:{}",
        escape(datasource_id),
        escape(device_id),
        escape(signal_id)
    )
}

fn escape(component: &str) -> String {
    component.replace('\\', "\\\\").replace(':', "\\:")
}

/// 尽力数值化：数字直接取值，字符串去空白后解析，其余为 None。
fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// 单信号的一次测量结果。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reading {
    pub id: Option<String>,
    pub datasource_id: String,
    pub device_id: String,
    pub signal_id: String,
    pub meta_id: String,
    pub timestamp_ms: Option<i64>,
    pub value: Value,
    pub raw_value: Option<Value>,
    pub numeric_value: Option<f64>,
    // UTC 时间分桶
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub in_alarm: bool,
    pub alarm_message: Option<String>,
    pub alarm_severity: Option<AlarmSeverity>,
    pub valid: bool,
}

impl Reading {
    pub fn new(
        datasource_id: impl Into<String>,
        device_id: impl Into<String>,
        signal_id: impl Into<String>,
        value: Value,
    ) -> Self {
        let datasource_id = datasource_id.into();
        let device_id = device_id.into();
        let signal_id = signal_id.into();
        let mut reading = Self {
            meta_id: meta_id(&datasource_id, &device_id, &signal_id),
            datasource_id,
            device_id,
            signal_id,
            valid: true,
            ..Self::default()
        };
        reading.set_value(value);
        reading
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.set_timestamp(timestamp_ms);
        self
    }

    pub fn with_raw_value(mut self, raw_value: Value) -> Self {
        self.raw_value = Some(raw_value);
        self
    }

    /// 设置值并同步数值化结果。
    pub fn set_value(&mut self, value: Value) {
        self.numeric_value = coerce_numeric(&value);
        self.value = value;
    }

    /// 设置时间戳并同步时间分桶。
    pub fn set_timestamp(&mut self, timestamp_ms: i64) {
        self.timestamp_ms = Some(timestamp_ms);
        if let Some(instant) = DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
            self.year = instant.year();
            self.month = instant.month();
            self.day = instant.day();
            self.hour = instant.hour();
        }
    }

    /// 入库前补齐派生字段：ID、时间戳、分桶、元 ID、数值化结果。
    pub fn normalize(&mut self, now_ms: i64) {
        if self.id.as_deref().is_none_or(str::is_empty) {
            self.id = Some(uuid::Uuid::new_v4().to_string());
        }
        let timestamp_ms = self.timestamp_ms.unwrap_or(now_ms);
        self.set_timestamp(timestamp_ms);
        self.meta_id = meta_id(&self.datasource_id, &self.device_id, &self.signal_id);
        if self.numeric_value.is_none() {
            self.numeric_value = coerce_numeric(&self.value);
        }
    }

    /// 条件求值上下文：`value`、`numericValue` 与完整的 `reading` 对象。
    ///
    /// 读数字段展开为 `reading.signalId` 等变量；每次调用都会重建，同一读数应复用结果。
    pub fn variables(&self) -> Variables {
        let mut vars = Variables::new();
        vars.insert("value", &self.value);
        vars.insert(
            "numericValue",
            &self.numeric_value.map(Value::from).unwrap_or(Value::Null),
        );
        if let Ok(fields) = serde_json::to_value(self) {
            vars.insert("reading", &fields);
        }
        vars
    }

    pub fn value_as_f64(&self) -> Option<f64> {
        coerce_numeric(&self.value)
    }

    pub fn value_as_i64(&self) -> Option<i64> {
        match &self.value {
            Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|v| v as i64)),
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn value_as_bool(&self) -> Option<bool> {
        match &self.value {
            Value::Bool(flag) => Some(*flag),
            Value::String(text) => Some(text.trim().eq_ignore_ascii_case("true")),
            _ => None,
        }
    }

    pub fn value_as_string(&self) -> Option<String> {
        match &self.value {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}
