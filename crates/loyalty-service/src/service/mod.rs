//! 服务层
//!
//! 供外层 HTTP 适配器调用的业务入口，依赖 `OrderStore` 与 `AccrualService` 抽象。
//!
//! ## 模块结构
//!
//! - `admission`: 订单受理
//! - `withdrawal`: 积分提现
//! - `balance`: 余额查询
//! - `query`: 订单与提现列表（只读）

pub mod admission;
pub mod balance;
pub mod query;
pub mod withdrawal;

pub use admission::{OrderAdmissionService, SubmitOutcome};
pub use balance::BalanceService;
pub use query::{AccountQueryService, OrderView, WithdrawalView};
pub use withdrawal::{WithdrawOutcome, WithdrawalService};
