use crate::domain::{
    Book, BookCopy, BookId, Borrower, BorrowerId, CopyId, CopyState, Loan, LoanId,
    policy::OpenLoanSummary,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, StoreError>;

/// ストレージ層のエラー
///
/// 呼び出し側が再試行の可否を判断できるように分類する。
#[derive(Debug, Error)]
pub enum StoreError {
    /// ロック待ちタイムアウト、直列化失敗、デッドロック、接続断など
    #[error("transient storage failure")]
    Transient(#[source] BoxError),

    /// 他に分類されない制約違反
    #[error("integrity constraint violated")]
    Integrity(#[source] BoxError),

    /// その他のバックエンドエラー
    #[error("storage backend error")]
    Backend(#[source] BoxError),
}

/// 在庫（複本）と貸出台帳のトランザクショナルなストレージポート
///
/// 貸出・返却・在庫変更はすべてこのポートのトランザクション経由で行う。
/// 外部から複本や貸出の状態を直接書き換える経路は存在しない。
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// 新しいトランザクションを開始する
    ///
    /// コミットせずに破棄されたトランザクションはロールバックされる。
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>>;
}

/// 1つの作業単位
///
/// `lock_*`系のメソッドは対象行の排他ロックを取得し、コミットまたは
/// ロールバックまで保持する。ロック取得後の読み取りは最新のコミット済み状態を返す。
#[async_trait]
pub trait LendingTransaction: Send {
    /// 利用者行を排他ロックして取得する
    async fn lock_borrower(&mut self, borrower_id: BorrowerId) -> Result<Option<Borrower>>;

    /// 書籍行を排他ロックして取得する
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>>;

    /// 複本行を排他ロックして取得する
    async fn lock_copy(&mut self, copy_id: CopyId) -> Result<Option<BookCopy>>;

    /// 貸出行を排他ロックして取得する
    async fn lock_loan(&mut self, loan_id: LoanId) -> Result<Option<Loan>>;

    /// 利用者をロックせずに取得する
    async fn find_borrower(&mut self, borrower_id: BorrowerId) -> Result<Option<Borrower>>;

    /// 複本をロックせずに取得する
    async fn find_copy(&mut self, copy_id: CopyId) -> Result<Option<BookCopy>>;

    /// 利用者の未返却貸出を書籍IDとともに取得する
    async fn open_loans_for_borrower(
        &mut self,
        borrower_id: BorrowerId,
    ) -> Result<Vec<OpenLoanSummary>>;

    /// 複本に未返却の貸出があるか
    async fn has_open_loan(&mut self, copy_id: CopyId) -> Result<bool>;

    async fn insert_loan(&mut self, loan: &Loan) -> Result<()>;

    async fn mark_returned(&mut self, loan_id: LoanId, return_date: DateTime<Utc>) -> Result<()>;

    async fn set_copy_state(&mut self, copy_id: CopyId, state: CopyState) -> Result<()>;

    async fn insert_book(&mut self, book: &Book) -> Result<()>;

    async fn insert_copies(&mut self, copies: &[BookCopy]) -> Result<()>;

    async fn delete_copy(&mut self, copy_id: CopyId) -> Result<()>;

    async fn count_copies(&mut self, book_id: BookId) -> Result<u64>;

    async fn delete_book(&mut self, book_id: BookId) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
