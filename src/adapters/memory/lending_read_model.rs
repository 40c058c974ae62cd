use crate::domain::{BookId, Borrower, BorrowerId, Loan, LoanId};
use crate::ports::lending_read_model::{
    CopyView, LendingReadModel as LendingReadModelTrait, LoanStatus, LoanView, Result,
    StoreError,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::LendingState;

/// LendingReadModelのインメモリ実装
///
/// `InMemoryLendingStore::read_model`で作成し、コミット済みの状態だけを読む。
pub struct LendingReadModel {
    state: Arc<Mutex<LendingState>>,
}

impl LendingReadModel {
    pub(super) fn new(state: Arc<Mutex<LendingState>>) -> Self {
        Self { state }
    }
}

fn to_loan_view(state: &LendingState, loan: &Loan) -> Result<LoanView> {
    let copy = state.copies.get(&loan.copy_id).ok_or_else(|| {
        StoreError::Integrity(format!("loan {} has no copy", loan.loan_id.value()).into())
    })?;
    let book = state.books.get(&copy.book_id).ok_or_else(|| {
        StoreError::Integrity(format!("copy {} has no book", copy.copy_id.value()).into())
    })?;

    Ok(LoanView {
        loan_id: loan.loan_id,
        copy_id: loan.copy_id,
        book_id: book.book_id,
        book_title: book.title.clone(),
        book_author: book.author.clone(),
        borrower_id: loan.borrower_id,
        loan_date: loan.loan_date,
        due_date: loan.due_date,
        return_date: loan.return_date,
        status: LoanStatus::classify(loan.due_date, loan.return_date, Utc::now()),
    })
}

#[async_trait]
impl LendingReadModelTrait for LendingReadModel {
    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<LoanView>> {
        let state = self.state.lock().await;
        state
            .loans
            .get(&loan_id)
            .map(|loan| to_loan_view(&state, loan))
            .transpose()
    }

    async fn find_loans_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<LoanView>> {
        let state = self.state.lock().await;
        let mut loans: Vec<&Loan> = state
            .loans
            .values()
            .filter(|loan| loan.borrower_id == borrower_id)
            .collect();
        // 新しい順
        loans.sort_by(|a, b| {
            b.loan_date
                .cmp(&a.loan_date)
                .then_with(|| a.loan_id.value().cmp(&b.loan_id.value()))
        });

        loans
            .into_iter()
            .map(|loan| to_loan_view(&state, loan))
            .collect()
    }

    async fn find_copies_by_book(&self, book_id: BookId) -> Result<Vec<CopyView>> {
        let state = self.state.lock().await;
        let mut copies: Vec<CopyView> = state
            .copies
            .values()
            .filter(|copy| copy.book_id == book_id)
            .map(|copy| {
                let open = state.open_loan_for_copy(copy.copy_id);
                CopyView {
                    copy_id: copy.copy_id,
                    book_id: copy.book_id,
                    state: copy.state,
                    loan_id: open.map(|loan| loan.loan_id),
                    borrower_id: open.map(|loan| loan.borrower_id),
                    borrower_name: open
                        .and_then(|loan| state.borrowers.get(&loan.borrower_id))
                        .map(|borrower| borrower.name.clone()),
                    loan_date: open.map(|loan| loan.loan_date),
                }
            })
            .collect();
        copies.sort_by_key(|copy| copy.copy_id.value());

        Ok(copies)
    }

    async fn find_borrower(&self, borrower_id: BorrowerId) -> Result<Option<Borrower>> {
        let state = self.state.lock().await;
        Ok(state.borrowers.get(&borrower_id).cloned())
    }
}
