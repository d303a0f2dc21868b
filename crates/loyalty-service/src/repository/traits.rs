//! 存储 Trait 定义
//!
//! 同一订单号上的所有操作彼此原子；同一用户的余额校验与提现记账彼此串行。

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{Balance, Order, OrderStatus, Withdrawal};

/// 订单插入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// 新建成功
    Created,
    /// 订单已存在且属于同一用户
    AlreadyOwned,
    /// 订单已被其他用户提交
    OwnedByOther,
}

/// 状态更新结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// 订单已处于终态，未做修改
    Terminal,
    Missing,
}

/// 提现记账结果
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawalInsert {
    Recorded(Withdrawal),
    /// 余额不足，未产生任何副作用
    InsufficientFunds { available: Decimal },
}

/// 订单存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    // 订单
    async fn insert_order(
        &self,
        user_id: i64,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<InsertOutcome>;
    async fn find_order(&self, number: &str) -> Result<Option<Order>>;
    async fn update_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<UpdateOutcome>;
    /// 按上传时间倒序
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>>;
    /// 所有非终态订单号
    async fn list_pending(&self) -> Result<Vec<String>>;

    // 账户
    async fn balance(&self, user_id: i64) -> Result<Balance>;
    async fn record_withdrawal(
        &self,
        user_id: i64,
        order_number: &str,
        amount: Decimal,
    ) -> Result<WithdrawalInsert>;
    /// 按处理时间倒序
    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>>;
}
