//! 服务错误类型
//!
//! 只建模基础设施故障；订单冲突、余额不足等业务结果以枚举形式返回。

use loyalty_shared::error::LoyaltyError;
use thiserror::Error;

/// 服务错误类型
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Shared(#[from] LoyaltyError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// 错误码，供外层 HTTP 适配器透出
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Shared(e) => e.code(),
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            Self::Shared(e) => e.is_retryable(),
            Self::Migration(_) => false,
        }
    }

    /// 对应的 HTTP 状态码
    ///
    /// 暂时性故障返回 503，其余返回 500。
    pub fn status_code(&self) -> u16 {
        if self.is_retryable() { 503 } else { 500 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_unavailable() {
        let err = ServiceError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_row_decode_error_is_not_retryable() {
        let err = ServiceError::Database(sqlx::Error::RowNotFound);
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_shared_error_keeps_code() {
        let err: ServiceError = LoyaltyError::Validation("x".to_string()).into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.to_string(), "参数验证失败: x");
    }
}
