//! 订单与提现存储层
//!
//! - 存储只负责持久化与原子性，不包含业务判断
//! - `OrderStore` trait 屏蔽具体实现，服务层以 `Arc<dyn OrderStore>` 依赖
//! - `PgOrderStore` 用于生产环境，`MemoryOrderStore` 用于测试与本地开发

mod memory_store;
mod pg_store;
mod traits;

pub use memory_store::MemoryOrderStore;
pub use pg_store::PgOrderStore;
pub use traits::*;
