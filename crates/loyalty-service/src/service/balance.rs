//! 余额查询服务

use std::sync::Arc;

use tracing::instrument;

use crate::error::Result;
use crate::models::Balance;
use crate::repository::OrderStore;

/// 余额查询服务，每次都从存储实时聚合
pub struct BalanceService {
    store: Arc<dyn OrderStore>,
}

impl BalanceService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn get_balance(&self, user_id: i64) -> Result<Balance> {
        self.store.balance(user_id).await
    }
}
