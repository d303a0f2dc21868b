//! 后台对账循环
//!
//! 定时拉取所有非终态订单，以有界并发向 accrual 查询并推进订单状态。
//!
//! - 单个订单失败不影响其他订单，留待下一轮
//! - 收到限流后暂停所有查询直到 Retry-After 到期，本轮尚未发出的查询计为延后
//! - 终态订单不会再被列出，轮询自然停止

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use loyalty_shared::config::ReconciliationConfig;
use loyalty_shared::observability::metrics::{
    record_reconciliation_tick, record_reconciliation_update,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::accrual_client::{AccrualLookup, AccrualService};
use crate::error::Result;
use crate::models::OrderStatus;
use crate::repository::{OrderStore, UpdateOutcome};

/// Retry-After 溢出 Instant 时使用的暂停时长
const MAX_PAUSE: Duration = Duration::from_secs(24 * 60 * 60);

/// 单轮对账统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 本轮开始时的待处理订单数
    pub pending: usize,
    /// 状态已写回
    pub updated: usize,
    /// 无结果或结果未带来变化
    pub unchanged: usize,
    /// 因限流未查询
    pub deferred: usize,
    /// 写回失败
    pub failed: usize,
    /// 本轮处于限流暂停期而被跳过
    pub paused: bool,
}

impl TickReport {
    fn record(&mut self, result: OrderResult) {
        match result {
            OrderResult::Updated => self.updated += 1,
            OrderResult::Unchanged => self.unchanged += 1,
            OrderResult::Deferred => self.deferred += 1,
            OrderResult::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderResult {
    Updated,
    Unchanged,
    Deferred,
    Failed,
}

impl OrderResult {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Deferred => "deferred",
            Self::Failed => "failed",
        }
    }
}

/// 对账器
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
    accrual: Arc<dyn AccrualService>,
    interval: Duration,
    max_concurrency: usize,
    /// 限流暂停截止时间
    paused_until: Mutex<Option<Instant>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        accrual: Arc<dyn AccrualService>,
        config: &ReconciliationConfig,
    ) -> Self {
        Self {
            store,
            accrual,
            interval: config.interval(),
            max_concurrency: config.max_concurrency.max(1),
            paused_until: Mutex::new(None),
        }
    }

    /// 按固定间隔运行对账，直到收到关闭信号
    ///
    /// 关闭时正在进行的一轮会被直接放弃，已写回的订单不受影响。
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs(),
            max_concurrency = self.max_concurrency,
            "对账循环已启动"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }

                _ = ticker.tick() => {}
            }

            let tick = self.tick();
            tokio::pin!(tick);

            // 只有关闭信号为 true 时才放弃本轮，其他变更继续等待本轮完成
            let stopped = loop {
                tokio::select! {
                    biased;

                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break true;
                        }
                    }

                    result = &mut tick => {
                        log_tick(result);
                        break false;
                    }
                }
            };

            if stopped {
                info!("对账进行中收到关闭信号，放弃本轮");
                break;
            }
        }

        info!("对账循环已停止");
    }

    /// 执行一轮对账
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickReport> {
        if let Some(remaining) = self.pause_remaining() {
            debug!(remaining_ms = remaining.as_millis() as u64, "处于限流暂停期，跳过本轮");
            return Ok(TickReport {
                paused: true,
                ..TickReport::default()
            });
        }

        let started = std::time::Instant::now();
        let pending = self.store.list_pending().await?;
        let mut report = TickReport {
            pending: pending.len(),
            ..TickReport::default()
        };

        if pending.is_empty() {
            return Ok(report);
        }

        let results: Vec<OrderResult> = stream::iter(pending)
            .map(|number| async move { self.reconcile_order(&number).await })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for result in results {
            record_reconciliation_update(result.as_str());
            report.record(result);
        }

        record_reconciliation_tick(started.elapsed().as_secs_f64());
        Ok(report)
    }

    async fn reconcile_order(&self, number: &str) -> OrderResult {
        if self.pause_remaining().is_some() {
            return OrderResult::Deferred;
        }

        let report = match self.accrual.lookup(number).await {
            AccrualLookup::Found(report) => report,
            AccrualLookup::NotFound | AccrualLookup::Unavailable => return OrderResult::Unchanged,
            AccrualLookup::RateLimited { retry_after } => {
                self.pause_for(retry_after);
                return OrderResult::Deferred;
            }
        };

        let (status, accrual) = report.order_state();
        // REGISTERED 不推进状态，也避免把 PROCESSING 回退为 NEW
        if status == OrderStatus::New {
            return OrderResult::Unchanged;
        }

        match self.store.update_status(number, status, accrual).await {
            Ok(UpdateOutcome::Applied) => {
                debug!(order_number = number, status = %status, accrual = %accrual, "订单状态已更新");
                OrderResult::Updated
            }
            Ok(UpdateOutcome::Terminal | UpdateOutcome::Missing) => OrderResult::Unchanged,
            Err(e) => {
                error!(order_number = number, error = %e, "订单状态写回失败");
                OrderResult::Failed
            }
        }
    }

    fn pause_for(&self, retry_after: Duration) {
        let now = Instant::now();
        let until = now
            .checked_add(retry_after)
            .unwrap_or_else(|| now + MAX_PAUSE);
        let mut paused = self.paused_until.lock();
        if paused.is_none_or(|current| current < until) {
            *paused = Some(until);
            warn!(retry_after_secs = retry_after.as_secs(), "accrual 限流，暂停查询");
        }
    }

    /// 暂停期剩余时长，不在暂停期返回 None
    fn pause_remaining(&self) -> Option<Duration> {
        let paused = *self.paused_until.lock();
        paused
            .map(|until| until.saturating_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }
}

fn log_tick(result: Result<TickReport>) {
    match result {
        Ok(report) if report.pending > 0 => {
            info!(
                pending = report.pending,
                updated = report.updated,
                unchanged = report.unchanged,
                deferred = report.deferred,
                failed = report.failed,
                "本轮对账完成"
            );
        }
        Ok(report) => debug!(paused = report.paused, "本轮无待处理订单"),
        Err(e) => error!(error = %e, "拉取待处理订单失败"),
    }
}
