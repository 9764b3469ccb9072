//! 数据源与设备配置模型。

use serde::{Deserialize, Serialize};

/// 名称/值配置项（数据源连接参数、信号驱动参数共用）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

// 序列化缺省时视为启用
fn enabled() -> bool {
    true
}

/// 按名称查找第一个有值的配置项。
fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a str> {
    properties
        .iter()
        .find(|property| property.name == name)
        .and_then(|property| property.value.as_deref())
}

/// 数据源：一个经由某个驱动可达的连接端点。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Datasource {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub driver_id: String,
    #[serde(default = "enabled")]
    pub active: bool,
    /// 有序连接参数
    pub configuration: Vec<Property>,
    pub last_connection_ms: Option<i64>,
    pub connected: bool,
    pub connection_status: Option<String>,
    pub created_at_ms: Option<i64>,
    pub updated_at_ms: Option<i64>,
}

impl Datasource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, driver_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            driver_id: driver_id.into(),
            active: true,
            ..Self::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.configuration.push(Property::new(name, value));
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        find_property(&self.configuration, name)
    }
}

/// 信号接线：把信号 ID 绑定到驱动相关的参数（地址、缩放、只读等）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalConfiguration {
    pub signal_id: String,
    pub properties: Vec<Property>,
}

impl SignalConfiguration {
    pub fn new(signal_id: impl Into<String>) -> Self {
        Self {
            signal_id: signal_id.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(Property::new(name, value));
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        find_property(&self.properties, name)
    }
}

/// 设备：数据源下的逻辑传感器/执行器。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(default = "enabled")]
    pub active: bool,
    pub device_definition_id: Option<String>,
    pub datasource_id: String,
    pub signal_configurations: Vec<SignalConfiguration>,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        datasource_id: impl Into<String>,
        device_definition_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            datasource_id: datasource_id.into(),
            device_definition_id: Some(device_definition_id.into()),
            active: true,
            ..Self::default()
        }
    }

    pub fn with_signal(mut self, configuration: SignalConfiguration) -> Self {
        self.signal_configurations.push(configuration);
        self
    }
}
