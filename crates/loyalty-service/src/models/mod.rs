//! 积分服务领域模型

pub mod account;
pub mod enums;
pub mod order;

pub use account::{Balance, Withdrawal};
pub use enums::{AccrualStatus, OrderStatus};
pub use order::{AccrualReport, Order, round_points};
