//! 设备类型、信号类型与驱动元数据定义。

use crate::condition::{AlarmCondition, ValidateCondition};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 信号/属性的数据类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    #[serde(alias = "NUMERIC")]
    Double,
    Float,
    Integer,
    Long,
    Boolean,
    String,
    Date,
    #[serde(alias = "DATE_TIME")]
    Datetime,
    Timestamp,
    Binary,
}

impl DataType {
    /// 类型级校验：原始值能否被该类型接受。null 对所有类型合法。
    pub fn is_valid_value(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Self::Double | Self::Float => match value {
                Value::Number(_) => true,
                Value::String(text) => text.trim().parse::<f64>().is_ok(),
                _ => false,
            },
            Self::Integer => match value {
                Value::Number(number) => number
                    .as_i64()
                    .is_some_and(|v| i32::try_from(v).is_ok()),
                Value::String(text) => text.trim().parse::<i32>().is_ok(),
                _ => false,
            },
            Self::Long => match value {
                Value::Number(number) => number.as_i64().is_some(),
                Value::String(text) => text.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            Self::Boolean => match value {
                Value::Bool(_) => true,
                Value::String(text) => {
                    text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false")
                }
                _ => false,
            },
            Self::String => true,
            Self::Date => value
                .as_str()
                .is_some_and(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()),
            Self::Datetime => value.as_str().is_some_and(|text| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
            }),
            Self::Timestamp => value
                .as_str()
                .is_some_and(|text| DateTime::parse_from_rfc3339(text).is_ok()),
            Self::Binary => match value {
                Value::Array(items) => items
                    .iter()
                    .all(|item| item.as_u64().is_some_and(|byte| byte <= u8::MAX as u64)),
                _ => false,
            },
        }
    }
}

/// 信号定义：设备类型暴露的一个可测/可控点。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalDefinition {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub data_type: Option<DataType>,
    pub unit: Option<String>,
    pub required: bool,
    pub alarms_enabled: bool,
    /// 按声明顺序求值，首个命中者生效
    pub alarm_conditions: Vec<AlarmCondition>,
    pub validate_conditions: Vec<ValidateCondition>,
}

impl SignalDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data_type: Some(data_type),
            ..Self::default()
        }
    }

    pub fn with_alarm(mut self, condition: AlarmCondition) -> Self {
        self.alarms_enabled = true;
        self.alarm_conditions.push(condition);
        self
    }

    pub fn with_validation(mut self, condition: ValidateCondition) -> Self {
        self.validate_conditions.push(condition);
        self
    }
}

/// 设备类型定义（信号目录）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceDefinition {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub signals: Vec<SignalDefinition>,
}

impl DeviceDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_signal(mut self, signal: SignalDefinition) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn find_signal(&self, signal_id: &str) -> Option<&SignalDefinition> {
        self.signals.iter().find(|signal| signal.id == signal_id)
    }
}

/// 驱动配置项的声明式描述。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyDefinition {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
    pub default_value: Option<String>,
    pub value_type: Option<DataType>,
    /// 允许值 → 说明
    pub allowed_values: BTreeMap<String, String>,
    pub validate_conditions: Vec<ValidateCondition>,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, value_type: DataType) -> Self {
        Self {
            name: name.into(),
            value_type: Some(value_type),
            ..Self::default()
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn allow(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.allowed_values.insert(value.into(), label.into());
        self
    }
}

/// 驱动元数据：由驱动自身声明，经注册表发布到存储。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverDefinition {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub connection_properties: Vec<PropertyDefinition>,
    pub signal_properties: Vec<PropertyDefinition>,
    pub tags: Vec<String>,
    pub created_at_ms: Option<i64>,
    pub updated_at_ms: Option<i64>,
}
