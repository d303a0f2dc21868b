//! 订单实体与 accrual 计算结果

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::enums::{AccrualStatus, OrderStatus};

/// 订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    #[sqlx(rename = "order_number")]
    pub number: String,
    pub user_id: i64,
    pub status: OrderStatus,
    /// 到达 PROCESSED 之前恒为 0
    pub accrual: Decimal,
    pub uploaded_at: DateTime<Utc>,
}

/// accrual 服务对单个订单的计算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualReport {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default)]
    pub accrual: Option<Decimal>,
}

impl AccrualReport {
    /// 转换为本地订单的状态与积分
    ///
    /// 只有 PROCESSED 携带积分；缺失按 0 计，负数截断为 0，保留两位小数。
    pub fn order_state(&self) -> (OrderStatus, Decimal) {
        let status = self.status.order_status();
        let accrual = match status {
            OrderStatus::Processed => round_points(self.accrual.unwrap_or(Decimal::ZERO)),
            _ => Decimal::ZERO,
        };
        (status, accrual)
    }
}

/// 积分统一保留两位小数（四舍五入）并截断负数
pub fn round_points(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .max(Decimal::ZERO)
}
