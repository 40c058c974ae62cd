use crate::domain::loan::is_past_due;
use crate::domain::{BookId, Borrower, BorrowerId, CopyId, CopyState, LoanId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use super::lending_store::{Result, StoreError};

/// 貸出ステータス（表示用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanStatus {
    /// 貸出中
    Borrowed,
    /// 延滞中
    Overdue,
    /// 返却済み
    Returned,
}

impl LoanStatus {
    /// 返却日と返却期限から現在のステータスを判定する
    pub fn classify(
        due_date: DateTime<Utc>,
        return_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        match return_date {
            Some(_) => LoanStatus::Returned,
            None if is_past_due(due_date, now) => LoanStatus::Overdue,
            None => LoanStatus::Borrowed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
        }
    }
}

/// 貸出ビュー（貸出履歴表示用）
#[derive(Debug, Clone)]
pub struct LoanView {
    pub loan_id: LoanId,
    pub copy_id: CopyId,
    pub book_id: BookId,
    pub book_title: String,
    pub book_author: String,
    pub borrower_id: BorrowerId,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

/// 複本ビュー - 現在の借り手を含む
#[derive(Debug, Clone)]
pub struct CopyView {
    pub copy_id: CopyId,
    pub book_id: BookId,
    pub state: CopyState,
    pub loan_id: Option<LoanId>,
    pub borrower_id: Option<BorrowerId>,
    pub borrower_name: Option<String>,
    pub loan_date: Option<DateTime<Utc>>,
}

/// 貸出関連の読み取り専用ポート
///
/// 状態を変更しない。書き込みは必ず`LendingStore`のトランザクション経由で行う。
#[async_trait]
pub trait LendingReadModel: Send + Sync {
    /// IDで貸出を取得する
    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<LoanView>>;

    /// 利用者の全貸出を新しい順に取得する
    async fn find_loans_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<LoanView>>;

    /// 書籍の複本一覧を現在の借り手とともに取得する
    async fn find_copies_by_book(&self, book_id: BookId) -> Result<Vec<CopyView>>;

    /// IDで利用者を取得する（閲覧権限の判定用）
    async fn find_borrower(&self, borrower_id: BorrowerId) -> Result<Option<Borrower>>;
}
