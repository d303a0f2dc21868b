//! 订单受理服务
//!
//! ## 受理流程
//!
//! 1. 请求体去空白 -> 2. Luhn 校验 -> 3. 归属预检 -> 4. 同步查询 accrual -> 5. 原子插入
//!
//! accrual 查询失败不阻塞受理，订单以 NEW 入库，由后台对账继续推进。

use std::sync::Arc;

use loyalty_shared::observability::metrics::record_order_submission;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::accrual_client::{AccrualLookup, AccrualService};
use crate::error::Result;
use crate::luhn;
use crate::models::OrderStatus;
use crate::repository::{InsertOutcome, OrderStore};

/// 订单提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 新订单已受理
    Accepted,
    /// 本用户此前已提交过该订单
    AlreadyAccepted,
    /// 订单已属于其他用户
    Conflict,
    /// 订单号未通过 Luhn 校验
    UnprocessableEntity,
    /// 请求体为空
    BadInput,
}

impl SubmitOutcome {
    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Accepted => 202,
            Self::AlreadyAccepted => 200,
            Self::Conflict => 409,
            Self::UnprocessableEntity => 422,
            Self::BadInput => 400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AlreadyAccepted => "already_accepted",
            Self::Conflict => "conflict",
            Self::UnprocessableEntity => "unprocessable_entity",
            Self::BadInput => "bad_input",
        }
    }
}

/// 订单受理服务
pub struct OrderAdmissionService {
    store: Arc<dyn OrderStore>,
    accrual: Arc<dyn AccrualService>,
}

impl OrderAdmissionService {
    pub fn new(store: Arc<dyn OrderStore>, accrual: Arc<dyn AccrualService>) -> Self {
        Self { store, accrual }
    }

    /// 提交订单号
    ///
    /// 存储故障以 `Err` 返回，其余结果均为 `Ok(SubmitOutcome)`。
    #[instrument(skip(self, raw_body))]
    pub async fn submit_order(&self, user_id: i64, raw_body: &str) -> Result<SubmitOutcome> {
        let outcome = self.admit(user_id, raw_body.trim()).await?;
        record_order_submission(outcome.as_str());
        Ok(outcome)
    }

    async fn admit(&self, user_id: i64, number: &str) -> Result<SubmitOutcome> {
        // 1. 空请求
        if number.is_empty() {
            return Ok(SubmitOutcome::BadInput);
        }

        // 2. 订单号格式
        if !luhn::is_valid(number) {
            info!(order_number = number, "订单号未通过 Luhn 校验");
            return Ok(SubmitOutcome::UnprocessableEntity);
        }

        // 3. 已存在的订单无需再查询 accrual
        if let Some(existing) = self.store.find_order(number).await? {
            return Ok(ownership_outcome(existing.user_id == user_id));
        }

        // 4. 同步查询一次，失败时延后到对账循环处理
        let (status, accrual) = match self.accrual.lookup(number).await {
            AccrualLookup::Found(report) => report.order_state(),
            other => {
                warn!(
                    order_number = number,
                    outcome = other.outcome(),
                    "accrual 暂无结果，订单以 NEW 受理"
                );
                (OrderStatus::New, Decimal::ZERO)
            }
        };

        // 5. 原子插入，并发提交以存储判定为准
        let outcome = match self
            .store
            .insert_order(user_id, number, status, accrual)
            .await?
        {
            InsertOutcome::Created => SubmitOutcome::Accepted,
            InsertOutcome::AlreadyOwned => SubmitOutcome::AlreadyAccepted,
            InsertOutcome::OwnedByOther => SubmitOutcome::Conflict,
        };

        info!(
            user_id,
            order_number = number,
            status = %status,
            accrual = %accrual,
            outcome = outcome.as_str(),
            "订单提交完成"
        );

        Ok(outcome)
    }
}

fn ownership_outcome(same_owner: bool) -> SubmitOutcome {
    if same_owner {
        SubmitOutcome::AlreadyAccepted
    } else {
        SubmitOutcome::Conflict
    }
}
