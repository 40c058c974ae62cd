pub mod lending_read_model;
pub mod lending_store;

// パブリックに型を再エクスポート
pub use lending_read_model::LendingReadModel as PostgresLendingReadModel;
pub use lending_store::LendingStore as PostgresLendingStore;

use crate::ports::{BoxError, StoreError};

/// 再試行すれば成功しうるSQLSTATE
///
/// - 55P03: lock_not_available（lock_timeout 超過）
/// - 40001: serialization_failure
/// - 40P01: deadlock_detected
const TRANSIENT_SQLSTATES: [&str; 3] = ["55P03", "40001", "40P01"];

/// 整合性制約違反のSQLSTATEクラス
const INTEGRITY_SQLSTATE_CLASS: &str = "23";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                if TRANSIENT_SQLSTATES.contains(&code.as_str()) {
                    StoreError::Transient(Box::new(err))
                } else if code.starts_with(INTEGRITY_SQLSTATE_CLASS) {
                    StoreError::Integrity(Box::new(err))
                } else {
                    StoreError::Backend(Box::new(err))
                }
            }
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Transient(Box::new(err))
            }
            _ => StoreError::Backend(Box::new(err)),
        }
    }
}

/// 行データの値がドメインの型に変換できない
fn invalid_data(message: String) -> StoreError {
    StoreError::Backend(
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)) as BoxError,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Transient(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolClosed),
            StoreError::Transient(_)
        ));
    }

    #[test]
    fn test_row_not_found_is_backend_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
