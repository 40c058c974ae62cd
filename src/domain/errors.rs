use thiserror::Error;

use super::policy::MAX_OPEN_LOANS;

/// 貸出ポリシー違反
///
/// 例外ではなく想定内の結果。利用者に表示するメッセージは違反したルールを名指しする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    /// 未返却の貸出が上限に達している
    #[error("Maximum borrowing limit reached ({} books)", MAX_OPEN_LOANS)]
    LimitExceeded,

    /// 延滞中の貸出がある
    #[error("Overdue loans outstanding; return them before borrowing again")]
    HasOverdue,

    /// 同じ書籍の別の複本を既に借りている
    #[error("Another copy of this book is already borrowed")]
    DuplicateBook,

    /// 複本が存在しない、または貸出中
    #[error("This copy is not available")]
    CopyUnavailable,

    /// 他の利用者の貸出
    #[error("This loan does not belong to you")]
    NotYours,

    /// 既に返却済み
    #[error("This loan has already been returned")]
    AlreadyReturned,

    /// 貸出中の複本は削除できない
    #[error("This copy is on loan and cannot be removed")]
    CopyOnLoan,
}

impl PolicyViolation {
    /// APIで返すエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            PolicyViolation::LimitExceeded => "LIMIT_EXCEEDED",
            PolicyViolation::HasOverdue => "HAS_OVERDUE",
            PolicyViolation::DuplicateBook => "DUPLICATE_BOOK",
            PolicyViolation::CopyUnavailable => "COPY_UNAVAILABLE",
            PolicyViolation::NotYours => "NOT_YOURS",
            PolicyViolation::AlreadyReturned => "ALREADY_RETURNED",
            PolicyViolation::CopyOnLoan => "COPY_ON_LOAN",
        }
    }
}
