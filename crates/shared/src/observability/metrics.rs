//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl Drop for MetricsHandle {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 在指定端口启动独立 HTTP 服务器，暴露 `/metrics` 与 `/health`。
pub async fn init(service_name: &str, port: u16) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

fn register_metrics(service_name: &str) {
    metrics::describe_counter!(
        "order_submissions_total",
        "Order submissions by outcome"
    );
    metrics::describe_counter!("withdrawals_total", "Withdrawal requests by outcome");
    metrics::describe_counter!(
        "accrual_lookups_total",
        "Accrual service lookups by outcome"
    );
    metrics::describe_counter!(
        "reconciliation_updates_total",
        "Per-order reconciliation results by outcome"
    );
    metrics::describe_histogram!(
        "reconciliation_tick_duration_seconds",
        "Reconciliation tick duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录订单提交结果
#[inline]
pub fn record_order_submission(outcome: &'static str) {
    metrics::counter!("order_submissions_total", "outcome" => outcome).increment(1);
}

/// 记录提现结果
#[inline]
pub fn record_withdrawal(outcome: &'static str) {
    metrics::counter!("withdrawals_total", "outcome" => outcome).increment(1);
}

/// 记录 accrual 查询结果
#[inline]
pub fn record_accrual_lookup(outcome: &'static str) {
    metrics::counter!("accrual_lookups_total", "outcome" => outcome).increment(1);
}

/// 记录单个订单的对账结果
#[inline]
pub fn record_reconciliation_update(outcome: &'static str) {
    metrics::counter!("reconciliation_updates_total", "outcome" => outcome).increment(1);
}

/// 记录一次对账耗时
#[inline]
pub fn record_reconciliation_tick(duration_secs: f64) {
    metrics::histogram!("reconciliation_tick_duration_seconds").record(duration_secs);
}
