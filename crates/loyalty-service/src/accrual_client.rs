//! accrual 服务 HTTP 客户端
//!
//! 通过 AccrualService trait 抽象对外查询，便于测试时注入 mock 实现。
//! 客户端不持有任何业务状态，所有失败都归类为 `AccrualLookup` 的某个分支返回。

use std::time::Duration;

use async_trait::async_trait;
use loyalty_shared::config::{AccrualConfig, normalize_base_url};
use loyalty_shared::error::LoyaltyError;
use loyalty_shared::observability::metrics::record_accrual_lookup;
use reqwest::StatusCode;
use reqwest::header::{HeaderValue, RETRY_AFTER};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::AccrualReport;

const SERVICE_NAME: &str = "accrual";

// ---------------------------------------------------------------------------
// Trait 抽象
// ---------------------------------------------------------------------------

/// 单次查询的结果分类
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualLookup {
    /// 服务已登记该订单
    Found(AccrualReport),
    /// 服务尚无该订单记录，不视为错误
    NotFound,
    /// 被限流，调用方需等待 `retry_after` 后再查询
    RateLimited { retry_after: Duration },
    /// 网络故障、超时、响应无法解析或返回了其他订单
    Unavailable,
}

impl AccrualLookup {
    /// 用于指标与日志的结果标签
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NotFound => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable => "unavailable",
        }
    }
}

/// accrual 服务查询接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualService: Send + Sync {
    /// 查询订单的积分计算状态
    async fn lookup(&self, order_number: &str) -> AccrualLookup;
}

// ---------------------------------------------------------------------------
// HTTP 客户端实现
// ---------------------------------------------------------------------------

/// 基于 reqwest 的 accrual 客户端
///
/// reqwest::Client 内部带连接池，整个进程共享一个实例即可。
pub struct HttpAccrualClient {
    client: reqwest::Client,
    base_url: String,
    default_retry_after: Duration,
    max_retry_after: Duration,
}

impl HttpAccrualClient {
    /// 创建客户端，请求超时与连接超时取自配置
    pub fn new(config: &AccrualConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| LoyaltyError::ExternalService {
                service: SERVICE_NAME.to_string(),
                message: format!("HTTP 客户端构建失败: {e}"),
            })?;

        let base_url = normalize_base_url(&config.base_url);
        info!(
            base_url = %base_url,
            request_timeout_ms = config.request_timeout_ms,
            "accrual 客户端已初始化"
        );

        Ok(Self {
            client,
            base_url,
            default_retry_after: config.default_retry_after(),
            max_retry_after: config.max_retry_after(),
        })
    }

    fn order_url(&self, order_number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, order_number)
    }

    async fn fetch(&self, order_number: &str) -> AccrualLookup {
        let response = match self.client.get(self.order_url(order_number)).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    order_number,
                    timeout = e.is_timeout(),
                    error = %e,
                    "accrual 请求失败"
                );
                return AccrualLookup::Unavailable;
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<AccrualReport>().await {
                Ok(report) if report.order == order_number => AccrualLookup::Found(report),
                Ok(report) => {
                    warn!(
                        order_number,
                        reported_order = %report.order,
                        "accrual 返回的订单号与请求不一致"
                    );
                    AccrualLookup::Unavailable
                }
                Err(e) => {
                    warn!(order_number, error = %e, "accrual 响应解析失败");
                    AccrualLookup::Unavailable
                }
            },
            StatusCode::NO_CONTENT => AccrualLookup::NotFound,
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = parse_retry_after(
                    response.headers().get(RETRY_AFTER),
                    self.default_retry_after,
                    self.max_retry_after,
                );
                warn!(
                    order_number,
                    retry_after_secs = retry_after.as_secs(),
                    "accrual 服务限流"
                );
                AccrualLookup::RateLimited { retry_after }
            }
            status => {
                warn!(order_number, status = status.as_u16(), "accrual 返回异常状态码");
                AccrualLookup::Unavailable
            }
        }
    }
}

#[async_trait]
impl AccrualService for HttpAccrualClient {
    async fn lookup(&self, order_number: &str) -> AccrualLookup {
        let result = self.fetch(order_number).await;
        debug!(order_number, outcome = result.outcome(), "accrual 查询完成");
        record_accrual_lookup(result.outcome());
        result
    }
}

/// 解析 Retry-After 头（秒数格式），缺失或非法时使用默认值，结果不超过 `max`
fn parse_retry_after(value: Option<&HeaderValue>, default: Duration, max: Duration) -> Duration {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
        .min(max)
}
