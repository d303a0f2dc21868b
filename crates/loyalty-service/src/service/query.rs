//! 账户列表查询服务（只读）
//!
//! 返回供外层直接序列化为 JSON 的视图对象：时间为 RFC 3339 字符串，金额为 JSON 数字。

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::models::{Order, OrderStatus, Withdrawal};
use crate::repository::OrderStore;

/// 订单列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub number: String,
    pub status: OrderStatus,
    /// 仅 PROCESSED 订单返回
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
    pub uploaded_at: String,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let accrual = (order.status == OrderStatus::Processed).then_some(order.accrual);
        Self {
            number: order.number,
            status: order.status,
            accrual,
            uploaded_at: format_timestamp(order.uploaded_at),
        }
    }
}

/// 提现列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalView {
    pub order: String,
    pub sum: Decimal,
    pub processed_at: String,
}

impl From<Withdrawal> for WithdrawalView {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            order: withdrawal.order_number,
            sum: withdrawal.amount,
            processed_at: format_timestamp(withdrawal.processed_at),
        }
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// 账户列表查询服务
pub struct AccountQueryService {
    store: Arc<dyn OrderStore>,
}

impl AccountQueryService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// 用户订单，按上传时间倒序
    #[instrument(skip(self))]
    pub async fn list_orders(&self, user_id: i64) -> Result<Vec<OrderView>> {
        let orders = self.store.list_by_user(user_id).await?;
        Ok(orders.into_iter().map(OrderView::from).collect())
    }

    /// 用户提现记录，按处理时间倒序
    #[instrument(skip(self))]
    pub async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<WithdrawalView>> {
        let withdrawals = self.store.list_withdrawals(user_id).await?;
        Ok(withdrawals.into_iter().map(WithdrawalView::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockOrderStore;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn uploaded() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 12, 10, 15, 15, 45).unwrap()
    }

    #[tokio::test]
    async fn test_order_view_hides_accrual_until_processed() {
        let mut store = MockOrderStore::new();
        store.expect_list_by_user().returning(|user_id| {
            Ok(vec![
                Order {
                    number: "9278923470".to_string(),
                    user_id,
                    status: OrderStatus::Processed,
                    accrual: dec!(500),
                    uploaded_at: uploaded(),
                },
                Order {
                    number: "12345678903".to_string(),
                    user_id,
                    status: OrderStatus::Processing,
                    accrual: Decimal::ZERO,
                    uploaded_at: uploaded(),
                },
            ])
        });

        let views = AccountQueryService::new(Arc::new(store))
            .list_orders(1)
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&views).unwrap(),
            json!([
                {
                    "number": "9278923470",
                    "status": "PROCESSED",
                    "accrual": 500.0,
                    "uploaded_at": "2020-12-10T15:15:45Z"
                },
                {
                    "number": "12345678903",
                    "status": "PROCESSING",
                    "uploaded_at": "2020-12-10T15:15:45Z"
                }
            ])
        );
    }

    #[tokio::test]
    async fn test_withdrawal_view_shape() {
        let mut store = MockOrderStore::new();
        store.expect_list_withdrawals().returning(|user_id| {
            Ok(vec![Withdrawal {
                user_id,
                order_number: "2377225624".to_string(),
                amount: dec!(500),
                processed_at: uploaded(),
            }])
        });

        let views = AccountQueryService::new(Arc::new(store))
            .list_withdrawals(1)
            .await
            .unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].order, "2377225624");
        assert_eq!(views[0].sum, dec!(500));
        assert_eq!(views[0].processed_at, "2020-12-10T15:15:45Z");
    }
}
