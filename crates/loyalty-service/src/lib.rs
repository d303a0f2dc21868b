//! 积分订单对账服务
//!
//! 用户提交购物订单号，外部 accrual 服务独立计算每笔订单的积分，
//! 账户余额为已到账积分与已提现积分之差。
//!
//! ## 核心功能
//!
//! - **订单受理**：Luhn 校验、归属判定、一次同步 accrual 查询后入库
//! - **后台对账**：定时轮询未终结订单，有界并发查询并推进状态
//! - **余额计算**：按用户实时聚合，不做缓存
//! - **积分提现**：按用户串行化的余额校验与记账
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `luhn`: 订单号校验
//! - `accrual_client`: accrual 服务客户端
//! - `repository`: 订单与提现存储（PostgreSQL / 内存）
//! - `service`: 业务服务层
//! - `reconciler`: 后台对账循环

pub mod accrual_client;
pub mod error;
pub mod luhn;
pub mod models;
pub mod reconciler;
pub mod repository;
pub mod service;

pub use accrual_client::{AccrualLookup, AccrualService, HttpAccrualClient};
pub use error::{Result, ServiceError};
pub use models::*;
pub use reconciler::{Reconciler, TickReport};
pub use repository::{
    InsertOutcome, MemoryOrderStore, OrderStore, PgOrderStore, UpdateOutcome, WithdrawalInsert,
};
pub use service::{
    AccountQueryService, BalanceService, OrderAdmissionService, SubmitOutcome, WithdrawOutcome,
    WithdrawalService,
};
