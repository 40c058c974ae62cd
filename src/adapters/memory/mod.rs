//! インメモリアダプター
//!
//! テストとローカル実行用。トランザクション全体を1つの非同期ミューテックスで
//! 直列化するため、PostgreSQL実装より強い分離レベルで動作する。

pub mod lending_read_model;
pub mod lending_store;

pub use lending_read_model::LendingReadModel as InMemoryLendingReadModel;
pub use lending_store::LendingStore as InMemoryLendingStore;

use crate::domain::{Book, BookCopy, BookId, Borrower, BorrowerId, CopyId, Loan, LoanId};
use std::collections::HashMap;

/// ストア全体の状態
#[derive(Debug, Clone, Default)]
pub(crate) struct LendingState {
    pub(crate) borrowers: HashMap<BorrowerId, Borrower>,
    pub(crate) books: HashMap<BookId, Book>,
    pub(crate) copies: HashMap<CopyId, BookCopy>,
    pub(crate) loans: HashMap<LoanId, Loan>,
}

impl LendingState {
    pub(crate) fn open_loan_for_copy(&self, copy_id: CopyId) -> Option<&Loan> {
        self.loans
            .values()
            .find(|loan| loan.copy_id == copy_id && loan.is_open())
    }
}
