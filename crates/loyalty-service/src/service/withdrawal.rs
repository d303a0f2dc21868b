//! 积分提现服务
//!
//! 余额校验与记账在存储层以用户为粒度串行执行，
//! 并发提现不会共同透支余额。

use std::sync::Arc;

use loyalty_shared::observability::metrics::record_withdrawal;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::error::Result;
use crate::luhn;
use crate::models::{Withdrawal, round_points};
use crate::repository::{OrderStore, WithdrawalInsert};

/// 提现结果
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawOutcome {
    Recorded(Withdrawal),
    /// 订单号标签未通过 Luhn 校验
    UnprocessableEntity,
    /// 金额保留两位小数后不为正数
    InvalidAmount,
    /// 可用余额不足
    PaymentRequired { available: Decimal },
}

impl WithdrawOutcome {
    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Recorded(_) => 200,
            Self::UnprocessableEntity | Self::InvalidAmount => 422,
            Self::PaymentRequired { .. } => 402,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recorded(_) => "recorded",
            Self::UnprocessableEntity => "unprocessable_entity",
            Self::InvalidAmount => "invalid_amount",
            Self::PaymentRequired { .. } => "payment_required",
        }
    }
}

/// 积分提现服务
pub struct WithdrawalService {
    store: Arc<dyn OrderStore>,
}

impl WithdrawalService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// 以订单号为标签提现积分
    #[instrument(skip(self, amount), fields(amount = %amount))]
    pub async fn withdraw(
        &self,
        user_id: i64,
        order_label: &str,
        amount: Decimal,
    ) -> Result<WithdrawOutcome> {
        let outcome = self.execute(user_id, order_label.trim(), amount).await?;
        record_withdrawal(outcome.as_str());
        Ok(outcome)
    }

    async fn execute(
        &self,
        user_id: i64,
        order_label: &str,
        amount: Decimal,
    ) -> Result<WithdrawOutcome> {
        if !luhn::is_valid(order_label) {
            return Ok(WithdrawOutcome::UnprocessableEntity);
        }

        let amount = round_points(amount);
        if amount <= Decimal::ZERO {
            return Ok(WithdrawOutcome::InvalidAmount);
        }

        match self
            .store
            .record_withdrawal(user_id, order_label, amount)
            .await?
        {
            WithdrawalInsert::Recorded(withdrawal) => {
                info!(
                    user_id,
                    order_number = %withdrawal.order_number,
                    amount = %withdrawal.amount,
                    "提现成功"
                );
                Ok(WithdrawOutcome::Recorded(withdrawal))
            }
            WithdrawalInsert::InsufficientFunds { available } => {
                info!(user_id, available = %available, amount = %amount, "余额不足，拒绝提现");
                Ok(WithdrawOutcome::PaymentRequired { available })
            }
        }
    }
}
