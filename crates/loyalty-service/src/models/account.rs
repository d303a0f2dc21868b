//! 账户相关实体：提现记录与余额

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 提现记录，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub user_id: i64,
    /// 用户提供的订单号标签，只要求通过 Luhn 校验
    pub order_number: String,
    pub amount: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// 账户余额（派生值，不落库）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// 已到账积分减去已提现积分，即可用余额
    pub current: Decimal,
    /// 历史提现总额
    pub withdrawn: Decimal,
}

impl Balance {
    /// 由到账总额与提现总额构造
    pub fn from_totals(accrued: Decimal, withdrawn: Decimal) -> Self {
        Self {
            current: accrued - withdrawn,
            withdrawn,
        }
    }

    /// 可用于提现的积分
    pub fn available(&self) -> Decimal {
        self.current
    }
}
