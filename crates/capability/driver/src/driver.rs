//! 驱动契约

use crate::error::DriverError;
use async_trait::async_trait;
use domain::{Datasource, DeviceCommand, DriverDefinition, Reading};

/// 协议/仿真驱动。
///
/// 一个实例只绑定一个运行时（Engine），由其串行调用；
/// 新运行时必须通过注册表重新创建实例，不得复用。
#[async_trait]
pub trait Driver: Send {
    /// 驱动 ID（注册表主键）
    fn id(&self) -> &str;

    /// 驱动自描述的配置/信号属性模式
    fn definition(&self) -> DriverDefinition;

    /// 绑定数据源快照（连接前调用）
    fn initialize(&mut self, datasource: &Datasource);

    async fn connect(&mut self) -> Result<(), DriverError>;

    async fn disconnect(&mut self) -> Result<(), DriverError>;

    fn is_connected(&self) -> bool;

    /// 读写合一入口：READ 命令返回读数，WRITE 命令执行写入
    async fn execute(&mut self, commands: &[DeviceCommand]) -> Result<Vec<Reading>, DriverError>;

    /// 仅写入
    async fn write(&mut self, commands: &[DeviceCommand]) -> Result<(), DriverError>;
}
