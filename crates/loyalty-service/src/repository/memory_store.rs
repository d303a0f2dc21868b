//! 内存订单存储
//!
//! 基于 DashMap 实现，用于测试与本地开发。
//! 订单插入依赖 entry API 的分片锁保证原子性，提现按用户持有独立互斥锁。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::traits::{InsertOutcome, OrderStore, UpdateOutcome, WithdrawalInsert};
use crate::error::Result;
use crate::models::{Balance, Order, OrderStatus, Withdrawal};

struct StoredOrder {
    order: Order,
    /// 插入序号，上传时间相同时用于稳定排序
    seq: u64,
}

type Ledger = Arc<Mutex<Vec<Withdrawal>>>;

/// 内存订单存储
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: DashMap<String, StoredOrder>,
    withdrawals: DashMap<i64, Ledger>,
    seq: AtomicU64,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订单总数
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// 写路径：不存在时创建用户账本
    fn ledger(&self, user_id: i64) -> Ledger {
        self.withdrawals.entry(user_id).or_default().clone()
    }

    /// 读路径：不创建账本
    fn existing_ledger(&self, user_id: i64) -> Option<Ledger> {
        self.withdrawals.get(&user_id).map(|ledger| ledger.clone())
    }

    fn accrued(&self, user_id: i64) -> Decimal {
        self.orders
            .iter()
            .filter(|entry| {
                entry.order.user_id == user_id && entry.order.status == OrderStatus::Processed
            })
            .map(|entry| entry.order.accrual)
            .sum()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_order(
        &self,
        user_id: i64,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<InsertOutcome> {
        match self.orders.entry(number.to_string()) {
            Entry::Occupied(entry) => {
                if entry.get().order.user_id == user_id {
                    Ok(InsertOutcome::AlreadyOwned)
                } else {
                    Ok(InsertOutcome::OwnedByOther)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(StoredOrder {
                    order: Order {
                        number: number.to_string(),
                        user_id,
                        status,
                        accrual,
                        uploaded_at: Utc::now(),
                    },
                    seq: self.seq.fetch_add(1, Ordering::SeqCst),
                });
                Ok(InsertOutcome::Created)
            }
        }
    }

    async fn find_order(&self, number: &str) -> Result<Option<Order>> {
        Ok(self.orders.get(number).map(|entry| entry.order.clone()))
    }

    async fn update_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<UpdateOutcome> {
        let Some(mut entry) = self.orders.get_mut(number) else {
            return Ok(UpdateOutcome::Missing);
        };

        if entry.order.status.is_terminal() {
            return Ok(UpdateOutcome::Terminal);
        }

        entry.order.status = status;
        entry.order.accrual = accrual;
        Ok(UpdateOutcome::Applied)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let mut orders: Vec<(u64, Order)> = self
            .orders
            .iter()
            .filter(|entry| entry.order.user_id == user_id)
            .map(|entry| (entry.seq, entry.order.clone()))
            .collect();

        orders.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(orders.into_iter().map(|(_, order)| order).collect())
    }

    async fn list_pending(&self) -> Result<Vec<String>> {
        let mut pending: Vec<(u64, String)> = self
            .orders
            .iter()
            .filter(|entry| !entry.order.status.is_terminal())
            .map(|entry| (entry.seq, entry.key().clone()))
            .collect();

        pending.sort_by_key(|(seq, _)| *seq);
        Ok(pending.into_iter().map(|(_, number)| number).collect())
    }

    async fn balance(&self, user_id: i64) -> Result<Balance> {
        let accrued = self.accrued(user_id);
        let withdrawn: Decimal = self
            .existing_ledger(user_id)
            .map(|ledger| ledger.lock().iter().map(|w| w.amount).sum())
            .unwrap_or_default();
        Ok(Balance::from_totals(accrued, withdrawn))
    }

    async fn record_withdrawal(
        &self,
        user_id: i64,
        order_number: &str,
        amount: Decimal,
    ) -> Result<WithdrawalInsert> {
        let ledger = self.ledger(user_id);
        let mut entries = ledger.lock();

        let withdrawn: Decimal = entries.iter().map(|w| w.amount).sum();
        let balance = Balance::from_totals(self.accrued(user_id), withdrawn);
        if balance.available() < amount {
            return Ok(WithdrawalInsert::InsufficientFunds {
                available: balance.available(),
            });
        }

        let withdrawal = Withdrawal {
            user_id,
            order_number: order_number.to_string(),
            amount,
            processed_at: Utc::now(),
        };
        entries.push(withdrawal.clone());

        Ok(WithdrawalInsert::Recorded(withdrawal))
    }

    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        let Some(ledger) = self.existing_ledger(user_id) else {
            return Ok(Vec::new());
        };
        let entries = ledger.lock();
        Ok(entries.iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_insert_ownership() {
        let store = MemoryOrderStore::new();

        let first = store
            .insert_order(1, "12345678903", OrderStatus::New, Decimal::ZERO)
            .await
            .unwrap();
        let again = store
            .insert_order(1, "12345678903", OrderStatus::Processed, dec!(10))
            .await
            .unwrap();
        let other = store
            .insert_order(2, "12345678903", OrderStatus::New, Decimal::ZERO)
            .await
            .unwrap();

        assert_eq!(first, InsertOutcome::Created);
        assert_eq!(again, InsertOutcome::AlreadyOwned);
        assert_eq!(other, InsertOutcome::OwnedByOther);
        assert_eq!(store.order_count(), 1);

        let order = store.find_order("12345678903").await.unwrap().unwrap();
        assert_eq!(order.user_id, 1);
        assert_eq!(order.status, OrderStatus::New);
    }

    #[tokio::test]
    async fn test_terminal_order_is_frozen() {
        let store = MemoryOrderStore::new();
        store
            .insert_order(1, "79927398713", OrderStatus::New, Decimal::ZERO)
            .await
            .unwrap();

        let applied = store
            .update_status("79927398713", OrderStatus::Processed, dec!(300))
            .await
            .unwrap();
        let frozen = store
            .update_status("79927398713", OrderStatus::Invalid, Decimal::ZERO)
            .await
            .unwrap();
        let missing = store
            .update_status("0", OrderStatus::Processing, Decimal::ZERO)
            .await
            .unwrap();

        assert_eq!(applied, UpdateOutcome::Applied);
        assert_eq!(frozen, UpdateOutcome::Terminal);
        assert_eq!(missing, UpdateOutcome::Missing);

        let order = store.find_order("79927398713").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
        assert_eq!(order.accrual, dec!(300));
        assert!(store.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let store = MemoryOrderStore::new();
        for number in ["12345678903", "79927398713", "4561261212345467"] {
            store
                .insert_order(7, number, OrderStatus::New, Decimal::ZERO)
                .await
                .unwrap();
        }
        store
            .insert_order(8, "0", OrderStatus::New, Decimal::ZERO)
            .await
            .unwrap();

        let numbers: Vec<String> = store
            .list_by_user(7)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.number)
            .collect();
        assert_eq!(numbers, vec!["4561261212345467", "79927398713", "12345678903"]);
    }

    #[tokio::test]
    async fn test_withdrawal_checks_balance() {
        let store = MemoryOrderStore::new();
        store
            .insert_order(1, "12345678903", OrderStatus::Processed, dec!(500))
            .await
            .unwrap();
        store
            .insert_order(1, "79927398713", OrderStatus::Processing, Decimal::ZERO)
            .await
            .unwrap();

        let recorded = store
            .record_withdrawal(1, "2377225624", dec!(200))
            .await
            .unwrap();
        assert!(matches!(recorded, WithdrawalInsert::Recorded(ref w) if w.amount == dec!(200)));

        let refused = store
            .record_withdrawal(1, "2377225624", dec!(400))
            .await
            .unwrap();
        assert_eq!(
            refused,
            WithdrawalInsert::InsufficientFunds {
                available: dec!(300)
            }
        );

        let balance = store.balance(1).await.unwrap();
        assert_eq!(balance.current, dec!(300));
        assert_eq!(balance.withdrawn, dec!(200));
        assert_eq!(store.list_withdrawals(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reads_do_not_create_ledgers() {
        let store = MemoryOrderStore::new();

        for user_id in 0..100 {
            let balance = store.balance(user_id).await.unwrap();
            assert!(balance.current.is_zero());
            assert!(store.list_withdrawals(user_id).await.unwrap().is_empty());
        }
        assert_eq!(store.withdrawals.len(), 0);

        let outcome = store.record_withdrawal(7, "12345678903", dec!(1)).await.unwrap();
        assert!(matches!(outcome, WithdrawalInsert::InsufficientFunds { .. }));
        assert_eq!(store.withdrawals.len(), 1);
    }
}
