use acq_driver::DriverError;
use acq_storage::StorageError;

/// 引擎与引擎集群错误。
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine for datasource {0} is not running or not connected")]
    NotRunning(String),
    #[error("no engine for datasource {0}")]
    EngineNotFound(String),
    #[error("device {device_id} is not bound to datasource {datasource_id}")]
    DeviceNotFound {
        datasource_id: String,
        device_id: String,
    },
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
