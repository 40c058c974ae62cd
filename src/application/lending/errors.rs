use crate::domain::PolicyViolation;
use crate::ports::{BoxError, StoreError};
use thiserror::Error;

/// 見つからなかったリソースの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Borrower,
    Book,
    Copy,
    Loan,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Borrower => "Borrower",
            Resource::Book => "Book",
            Resource::Copy => "Copy",
            Resource::Loan => "Loan",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 貸出管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum LendingError {
    /// 利用者・書籍・複本・貸出が存在しない
    #[error("{0} not found")]
    NotFound(Resource),

    /// 貸出ポリシー違反（想定内の結果）
    #[error(transparent)]
    PolicyViolation(#[from] PolicyViolation),

    /// 管理者以外による在庫変更
    #[error("The requester is not permitted to perform this operation")]
    Forbidden,

    /// 入力値が不正
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 一時的な障害（ロック待ちタイムアウト、直列化失敗、接続断）。再試行可能
    #[error("Temporary storage failure, please retry")]
    Transient(#[source] BoxError),

    /// 他に分類されない制約違反
    #[error("Integrity constraint violated")]
    Integrity(#[source] BoxError),

    /// その他のストレージエラー
    #[error("Storage error")]
    Store(#[source] BoxError),
}

impl LendingError {
    /// 呼び出し側が同じリクエストを再送してよいか
    pub fn is_retryable(&self) -> bool {
        matches!(self, LendingError::Transient(_))
    }
}

impl From<StoreError> for LendingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(e) => LendingError::Transient(e),
            StoreError::Integrity(e) => LendingError::Integrity(e),
            StoreError::Backend(e) => LendingError::Store(e),
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LendingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_classification_is_preserved() {
        let transient: LendingError = StoreError::Transient("lock timeout".into()).into();
        assert!(transient.is_retryable());

        let integrity: LendingError = StoreError::Integrity("duplicate key".into()).into();
        assert!(matches!(integrity, LendingError::Integrity(_)));
        assert!(!integrity.is_retryable());
    }

    #[test]
    fn test_policy_violation_message_names_the_rule() {
        let err = LendingError::from(PolicyViolation::LimitExceeded);
        assert_eq!(err.to_string(), "Maximum borrowing limit reached (3 books)");

        let err = LendingError::from(PolicyViolation::HasOverdue);
        assert!(err.to_string().contains("Overdue loans outstanding"));
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            LendingError::NotFound(Resource::Copy).to_string(),
            "Copy not found"
        );
    }
}
