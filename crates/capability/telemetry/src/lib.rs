//! 追踪初始化、轮询周期 ID 与进程级计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 采集指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub polls_started: u64,
    pub polls_failed: u64,
    pub polls_skipped: u64,
    pub readings_persisted: u64,
    pub readings_dropped: u64,
    pub readings_invalid: u64,
    pub alarms_raised: u64,
    pub device_state_writes: u64,
    pub commands_issued: u64,
    pub command_dispatch_success: u64,
    pub command_dispatch_failure: u64,
}

/// 采集指标。
pub struct TelemetryMetrics {
    polls_started: AtomicU64,
    polls_failed: AtomicU64,
    polls_skipped: AtomicU64,
    readings_persisted: AtomicU64,
    readings_dropped: AtomicU64,
    readings_invalid: AtomicU64,
    alarms_raised: AtomicU64,
    device_state_writes: AtomicU64,
    commands_issued: AtomicU64,
    command_dispatch_success: AtomicU64,
    command_dispatch_failure: AtomicU64,
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            polls_started: AtomicU64::new(0),
            polls_failed: AtomicU64::new(0),
            polls_skipped: AtomicU64::new(0),
            readings_persisted: AtomicU64::new(0),
            readings_dropped: AtomicU64::new(0),
            readings_invalid: AtomicU64::new(0),
            alarms_raised: AtomicU64::new(0),
            device_state_writes: AtomicU64::new(0),
            commands_issued: AtomicU64::new(0),
            command_dispatch_success: AtomicU64::new(0),
            command_dispatch_failure: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            polls_started: self.polls_started.load(Ordering::Relaxed),
            polls_failed: self.polls_failed.load(Ordering::Relaxed),
            polls_skipped: self.polls_skipped.load(Ordering::Relaxed),
            readings_persisted: self.readings_persisted.load(Ordering::Relaxed),
            readings_dropped: self.readings_dropped.load(Ordering::Relaxed),
            readings_invalid: self.readings_invalid.load(Ordering::Relaxed),
            alarms_raised: self.alarms_raised.load(Ordering::Relaxed),
            device_state_writes: self.device_state_writes.load(Ordering::Relaxed),
            commands_issued: self.commands_issued.load(Ordering::Relaxed),
            command_dispatch_success: self.command_dispatch_success.load(Ordering::Relaxed),
            command_dispatch_failure: self.command_dispatch_failure.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 全局指标快照。
pub fn snapshot() -> MetricsSnapshot {
    metrics().snapshot()
}

/// 初始化 tracing（默认 info），重复调用无副作用。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成轮询周期关联 ID。
pub fn new_cycle_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录发起的轮询次数。
pub fn record_poll_started() {
    metrics().polls_started.fetch_add(1, Ordering::Relaxed);
}

/// 记录驱动执行失败的轮询次数。
pub fn record_poll_failed() {
    metrics().polls_failed.fetch_add(1, Ordering::Relaxed);
}

/// 记录因上一轮仍在执行而跳过的轮询次数。
pub fn record_poll_skipped() {
    metrics().polls_skipped.fetch_add(1, Ordering::Relaxed);
}

pub fn record_reading_persisted() {
    metrics().readings_persisted.fetch_add(1, Ordering::Relaxed);
}

/// 记录无法匹配设备或信号而丢弃的读数。
pub fn record_reading_dropped() {
    metrics().readings_dropped.fetch_add(1, Ordering::Relaxed);
}

pub fn record_reading_invalid() {
    metrics().readings_invalid.fetch_add(1, Ordering::Relaxed);
}

pub fn record_alarm_raised() {
    metrics().alarms_raised.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备状态落库次数（每轮每设备一次）。
pub fn record_device_state_write() {
    metrics().device_state_writes.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_issued() {
    metrics().commands_issued.fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_dispatch_success() {
    metrics()
        .command_dispatch_success
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_command_dispatch_failure() {
    metrics()
        .command_dispatch_failure
        .fetch_add(1, Ordering::Relaxed);
}
