use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{BorrowerId, CopyId, LoanId, PolicyViolation};

/// 貸出期間（日数）
pub const LOAN_PERIOD_DAYS: i64 = 7;

/// 貸出台帳の1行 - 1冊の複本の1回の貸出
///
/// `return_date`が`None`の間は「未返却（open）」。
/// 返却期限は作成時に`loan_date + 7日`で固定され、以後変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,
    pub copy_id: CopyId,
    pub borrower_id: BorrowerId,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

impl Loan {
    /// 未返却か
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    /// 延滞判定（返却期限を過ぎた未返却の貸出）
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && is_past_due(self.due_date, now)
    }
}

/// 返却期限を過ぎているか
///
/// 期限ちょうどは過ぎていない扱い。延滞判定はすべてこの関数を通す。
pub fn is_past_due(due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    due_date < now
}

/// 返却期限を計算する
pub fn due_date_for(loan_date: DateTime<Utc>) -> DateTime<Utc> {
    loan_date + Duration::days(LOAN_PERIOD_DAYS)
}

/// 純粋関数：新しい貸出を作成する
///
/// ポリシー検証は呼び出し側の責務。ここでは値の組み立てのみ行う。
pub fn open_loan(copy_id: CopyId, borrower_id: BorrowerId, loan_date: DateTime<Utc>) -> Loan {
    Loan {
        loan_id: LoanId::new(),
        copy_id,
        borrower_id,
        loan_date,
        due_date: due_date_for(loan_date),
        return_date: None,
    }
}

/// 純粋関数：貸出を返却済みにする
///
/// 既に返却済みの貸出は`AlreadyReturned`。
pub fn close_loan(loan: &Loan, returned_at: DateTime<Utc>) -> Result<Loan, PolicyViolation> {
    if !loan.is_open() {
        return Err(PolicyViolation::AlreadyReturned);
    }

    Ok(Loan {
        return_date: Some(returned_at),
        ..loan.clone()
    })
}
