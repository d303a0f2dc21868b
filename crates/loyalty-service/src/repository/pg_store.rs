//! PostgreSQL 订单存储
//!
//! 订单号唯一约束 + ON CONFLICT 保证并发提交只有一方成功；
//! 提现通过事务级 advisory lock 按用户串行化。

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info, instrument};

use super::traits::{InsertOutcome, OrderStore, UpdateOutcome, WithdrawalInsert};
use crate::error::Result;
use crate::models::{Balance, Order, OrderStatus, Withdrawal};

/// PostgreSQL 订单存储
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 执行内嵌的数据库迁移
    pub async fn migrate(pool: &PgPool) -> Result<()> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("数据库迁移完成");
        Ok(())
    }

    /// 在事务中计算用户余额
    pub async fn balance_in_tx(conn: &mut PgConnection, user_id: i64) -> Result<Balance> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COALESCE(SUM(accrual), 0)
                 FROM orders
                 WHERE user_id = $1 AND status = 'PROCESSED') AS accrued,
                (SELECT COALESCE(SUM(amount), 0)
                 FROM withdrawals
                 WHERE user_id = $1) AS withdrawn
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

        let accrued: Decimal = row.try_get("accrued")?;
        let withdrawn: Decimal = row.try_get("withdrawn")?;
        Ok(Balance::from_totals(accrued, withdrawn))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    #[instrument(skip(self, accrual))]
    async fn insert_order(
        &self,
        user_id: i64,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (order_number, user_id, status, accrual)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_number) DO NOTHING
            "#,
        )
        .bind(number)
        .bind(user_id)
        .bind(status)
        .bind(accrual)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 1 {
            tx.commit().await?;
            return Ok(InsertOutcome::Created);
        }

        let owner: i64 = sqlx::query_scalar("SELECT user_id FROM orders WHERE order_number = $1")
            .bind(number)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(owner, "订单号已存在");
        if owner == user_id {
            Ok(InsertOutcome::AlreadyOwned)
        } else {
            Ok(InsertOutcome::OwnedByOther)
        }
    }

    async fn find_order(&self, number: &str) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_number, user_id, status, accrual, uploaded_at
            FROM orders
            WHERE order_number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn update_status(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<UpdateOutcome> {
        let affected = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, accrual = $3, updated_at = NOW()
            WHERE order_number = $1
              AND status NOT IN ('INVALID', 'PROCESSED')
            "#,
        )
        .bind(number)
        .bind(status)
        .bind(accrual)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected > 0 {
            return Ok(UpdateOutcome::Applied);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_number = $1)")
                .bind(number)
                .fetch_one(&self.pool)
                .await?;

        Ok(if exists {
            UpdateOutcome::Terminal
        } else {
            UpdateOutcome::Missing
        })
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_number, user_id, status, accrual, uploaded_at
            FROM orders
            WHERE user_id = $1
            ORDER BY uploaded_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn list_pending(&self) -> Result<Vec<String>> {
        let numbers: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT order_number
            FROM orders
            WHERE status NOT IN ('INVALID', 'PROCESSED')
            ORDER BY uploaded_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(numbers)
    }

    async fn balance(&self, user_id: i64) -> Result<Balance> {
        let mut conn = self.pool.acquire().await?;
        Self::balance_in_tx(&mut conn, user_id).await
    }

    #[instrument(skip(self))]
    async fn record_withdrawal(
        &self,
        user_id: i64,
        order_number: &str,
        amount: Decimal,
    ) -> Result<WithdrawalInsert> {
        let mut tx = self.pool.begin().await?;

        // 同一用户的提现在此串行，事务结束时自动释放
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let balance = Self::balance_in_tx(&mut tx, user_id).await?;
        if balance.available() < amount {
            // tx drop 时回滚
            return Ok(WithdrawalInsert::InsufficientFunds {
                available: balance.available(),
            });
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
            INSERT INTO withdrawals (user_id, order_number, amount)
            VALUES ($1, $2, $3)
            RETURNING user_id, order_number, amount, processed_at
            "#,
        )
        .bind(user_id)
        .bind(order_number)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(WithdrawalInsert::Recorded(withdrawal))
    }

    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            r#"
            SELECT user_id, order_number, amount, processed_at
            FROM withdrawals
            WHERE user_id = $1
            ORDER BY processed_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }
}
