//! 貸出ポリシーエンジン
//!
//! 同一トランザクション内で読み取ったスナップショットに対する純粋な判定関数。
//! 副作用は持たない。判定の正しさはスナップショットが後続の更新と同じ
//! ロック範囲で取得されていることに依存する。

use chrono::{DateTime, Utc};

use super::loan::is_past_due;
use super::{BookCopy, BookId, BorrowerId, Loan, LoanId, PolicyViolation};

/// 利用者1人あたりの同時貸出上限
pub const MAX_OPEN_LOANS: usize = 3;

/// 利用者の未返却貸出1件分の要約
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenLoanSummary {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub due_date: DateTime<Utc>,
}

/// 貸出判定用スナップショット
#[derive(Debug, Clone)]
pub struct BorrowSnapshot {
    /// 利用者の未返却貸出
    pub open_loans: Vec<OpenLoanSummary>,
    /// 対象の複本（存在しない場合は`None`）
    pub target: Option<BookCopy>,
    /// 判定時刻
    pub now: DateTime<Utc>,
}

/// 返却判定用スナップショット
#[derive(Debug, Clone, Copy)]
pub struct ReturnSnapshot<'a> {
    pub requester: BorrowerId,
    pub loan: &'a Loan,
}

/// 貸出可否を判定する
///
/// 判定順序：
/// 1. 貸出上限（3冊）
/// 2. 延滞中の貸出
/// 3. 同一書籍の重複貸出
/// 4. 複本の貸出可能状態
pub fn validate_borrow(snapshot: &BorrowSnapshot) -> Result<(), PolicyViolation> {
    if snapshot.open_loans.len() >= MAX_OPEN_LOANS {
        return Err(PolicyViolation::LimitExceeded);
    }

    if snapshot
        .open_loans
        .iter()
        .any(|loan| is_past_due(loan.due_date, snapshot.now))
    {
        return Err(PolicyViolation::HasOverdue);
    }

    // 複本が存在しない場合は書籍が特定できないので4で判定する
    if let Some(target) = &snapshot.target {
        if snapshot
            .open_loans
            .iter()
            .any(|loan| loan.book_id == target.book_id)
        {
            return Err(PolicyViolation::DuplicateBook);
        }
    }

    match &snapshot.target {
        Some(copy) if copy.state.is_available() => Ok(()),
        _ => Err(PolicyViolation::CopyUnavailable),
    }
}

/// 返却可否を判定する
///
/// 他人の貸出は返却状態に関わらず`NotYours`。
pub fn validate_return(snapshot: ReturnSnapshot<'_>) -> Result<(), PolicyViolation> {
    if snapshot.loan.borrower_id != snapshot.requester {
        return Err(PolicyViolation::NotYours);
    }

    if !snapshot.loan.is_open() {
        return Err(PolicyViolation::AlreadyReturned);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CopyId, CopyState, loan};
    use chrono::Duration;

    fn available_copy(book_id: BookId) -> BookCopy {
        BookCopy {
            copy_id: CopyId::new(),
            book_id,
            state: CopyState::Available,
        }
    }

    fn open_loan_for(book_id: BookId, due_date: DateTime<Utc>) -> OpenLoanSummary {
        OpenLoanSummary {
            loan_id: LoanId::new(),
            book_id,
            due_date,
        }
    }

    #[test]
    fn test_validate_borrow_ok_for_fresh_borrower() {
        let snapshot = BorrowSnapshot {
            open_loans: vec![],
            target: Some(available_copy(BookId::new())),
            now: Utc::now(),
        };

        assert_eq!(validate_borrow(&snapshot), Ok(()));
    }

    #[test]
    fn test_validate_borrow_rejects_fourth_loan() {
        let now = Utc::now();
        let due = now + Duration::days(3);
        let snapshot = BorrowSnapshot {
            open_loans: vec![
                open_loan_for(BookId::new(), due),
                open_loan_for(BookId::new(), due),
                open_loan_for(BookId::new(), due),
            ],
            target: Some(available_copy(BookId::new())),
            now,
        };

        assert_eq!(
            validate_borrow(&snapshot),
            Err(PolicyViolation::LimitExceeded)
        );
    }

    #[test]
    fn test_validate_borrow_limit_checked_before_overdue() {
        let now = Utc::now();
        let past = now - Duration::days(1);
        let snapshot = BorrowSnapshot {
            open_loans: vec![
                open_loan_for(BookId::new(), past),
                open_loan_for(BookId::new(), past),
                open_loan_for(BookId::new(), past),
            ],
            target: None,
            now,
        };

        assert_eq!(
            validate_borrow(&snapshot),
            Err(PolicyViolation::LimitExceeded)
        );
    }

    #[test]
    fn test_validate_borrow_rejects_overdue_borrower() {
        let now = Utc::now();
        let book_id = BookId::new();
        let snapshot = BorrowSnapshot {
            // 延滞中の貸出が同じ書籍でも、延滞の判定が優先される
            open_loans: vec![open_loan_for(book_id, now - Duration::hours(1))],
            target: Some(available_copy(book_id)),
            now,
        };

        assert_eq!(validate_borrow(&snapshot), Err(PolicyViolation::HasOverdue));
    }

    #[test]
    fn test_validate_borrow_allows_loan_due_exactly_now() {
        let now = Utc::now();
        let snapshot = BorrowSnapshot {
            open_loans: vec![open_loan_for(BookId::new(), now)],
            target: Some(available_copy(BookId::new())),
            now,
        };

        assert_eq!(validate_borrow(&snapshot), Ok(()));

        // 1秒でも過ぎれば延滞
        let later = BorrowSnapshot {
            now: now + Duration::seconds(1),
            ..snapshot
        };
        assert_eq!(validate_borrow(&later), Err(PolicyViolation::HasOverdue));
    }

    #[test]
    fn test_validate_borrow_rejects_duplicate_book() {
        let now = Utc::now();
        let book_id = BookId::new();
        let snapshot = BorrowSnapshot {
            open_loans: vec![open_loan_for(book_id, now + Duration::days(5))],
            target: Some(available_copy(book_id)),
            now,
        };

        assert_eq!(
            validate_borrow(&snapshot),
            Err(PolicyViolation::DuplicateBook)
        );
    }

    #[test]
    fn test_validate_borrow_rejects_copy_on_loan() {
        let mut copy = available_copy(BookId::new());
        copy.state = CopyState::OnLoan;
        let snapshot = BorrowSnapshot {
            open_loans: vec![],
            target: Some(copy),
            now: Utc::now(),
        };

        assert_eq!(
            validate_borrow(&snapshot),
            Err(PolicyViolation::CopyUnavailable)
        );
    }

    #[test]
    fn test_validate_borrow_rejects_missing_copy() {
        let now = Utc::now();
        let snapshot = BorrowSnapshot {
            open_loans: vec![open_loan_for(BookId::new(), now + Duration::days(1))],
            target: None,
            now,
        };

        assert_eq!(
            validate_borrow(&snapshot),
            Err(PolicyViolation::CopyUnavailable)
        );
    }

    #[test]
    fn test_validate_return_ok_for_own_open_loan() {
        let borrower_id = BorrowerId::new();
        let loan = loan::open_loan(CopyId::new(), borrower_id, Utc::now());

        let result = validate_return(ReturnSnapshot {
            requester: borrower_id,
            loan: &loan,
        });
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_validate_return_rejects_foreign_loan() {
        let loan = loan::open_loan(CopyId::new(), BorrowerId::new(), Utc::now());

        let result = validate_return(ReturnSnapshot {
            requester: BorrowerId::new(),
            loan: &loan,
        });
        assert_eq!(result, Err(PolicyViolation::NotYours));
    }

    #[test]
    fn test_validate_return_foreign_returned_loan_is_not_yours() {
        let now = Utc::now();
        let loan = loan::open_loan(CopyId::new(), BorrowerId::new(), now);
        let closed = loan::close_loan(&loan, now + Duration::days(1)).unwrap();

        let result = validate_return(ReturnSnapshot {
            requester: BorrowerId::new(),
            loan: &closed,
        });
        assert_eq!(result, Err(PolicyViolation::NotYours));
    }

    #[test]
    fn test_validate_return_rejects_returned_loan() {
        let borrower_id = BorrowerId::new();
        let now = Utc::now();
        let loan = loan::open_loan(CopyId::new(), borrower_id, now);
        let closed = loan::close_loan(&loan, now + Duration::days(1)).unwrap();

        let result = validate_return(ReturnSnapshot {
            requester: borrower_id,
            loan: &closed,
        });
        assert_eq!(result, Err(PolicyViolation::AlreadyReturned));
    }
}
