//! 周期轮询调度
//!
//! 每个周期对当前引擎快照逐个派生独立任务轮询，慢引擎不会拖慢其他引擎；
//! 每个引擎同一时刻最多一个调度任务（排队或执行中），其余周期跳过。

use crate::engine::Engine;
use crate::fleet::Engines;
use acq_telemetry::record_poll_skipped;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// 调度参数。
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// 每周期同时轮询的引擎上限，0 表示不限
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10_000),
            concurrency: 0,
        }
    }
}

impl SchedulerConfig {
    fn sanitized(mut self) -> Self {
        if self.interval.is_zero() {
            self.interval = Duration::from_millis(1);
        }
        self
    }
}

/// 调度器句柄。
pub struct PollScheduler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollScheduler {
    pub fn spawn(fleet: Arc<Engines>, config: SchedulerConfig) -> Self {
        let config = config.sanitized();
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let limiter = (config.concurrency > 0).then(|| Arc::new(Semaphore::new(config.concurrency)));
        info!(
            target: "acq.engine",
            interval_ms = config.interval.as_millis() as u64,
            concurrency = config.concurrency,
            "scheduler_started"
        );

        let task = tokio::spawn(async move {
            let tick_shutdown = shutdown_rx.clone();
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        poll_tick(&fleet, limiter.as_ref(), &tick_shutdown);
                    }
                }
            }
            info!(target: "acq.engine", "scheduler_stopped");
        });

        Self { shutdown, task }
    }

    /// 停止调度；已派生的轮询任务自行结束。
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(target: "acq.engine", error = %err, "scheduler_join_failed");
        }
    }
}

/// 调度名额，任务结束或被取消时释放。
struct ScheduleSlot(Arc<Engine>);

impl Drop for ScheduleSlot {
    fn drop(&mut self) {
        self.0.release_schedule();
    }
}

fn poll_tick(fleet: &Engines, limiter: Option<&Arc<Semaphore>>, shutdown: &watch::Receiver<bool>) {
    let engines = fleet.snapshot();
    debug!(target: "acq.engine", engines = engines.len(), "scheduler_tick");
    for engine in engines {
        if !engine.is_active() {
            continue;
        }
        if !engine.try_claim_schedule() {
            record_poll_skipped();
            debug!(
                target: "acq.engine",
                datasource_id = %engine.datasource_id(),
                "poll_skipped_scheduled"
            );
            continue;
        }
        let slot = ScheduleSlot(engine);
        let limiter = limiter.cloned();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _permit = match limiter {
                Some(limiter) => match limiter.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };
            // 等待许可期间调度器可能已停止
            if *shutdown.borrow() {
                return;
            }
            let engine = &slot.0;
            if let Some(readings) = engine.poll_if_idle().await {
                debug!(
                    target: "acq.engine",
                    datasource_id = %engine.datasource_id(),
                    readings = readings.len(),
                    "scheduled_poll_done"
                );
            }
        });
    }
}
