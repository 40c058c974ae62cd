use crate::domain::{
    Book, BookCopy, BookId, Borrower, BorrowerId, BorrowerRole, CopyId, CopyState, Loan, LoanId,
    inventory::new_copies, policy::OpenLoanSummary,
};
use crate::ports::{
    LendingStore as LendingStoreTrait, LendingTransaction, StoreError, lending_store::Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{InMemoryLendingReadModel, LendingState};

fn integrity(message: String) -> StoreError {
    StoreError::Integrity(message.into())
}

/// LendingStoreのインメモリ実装
///
/// `begin`でミューテックスを取得し、作業用のコピーに書き込む。
/// コミット時にのみ共有状態へ反映するため、破棄されたトランザクションは痕跡を残さない。
#[derive(Clone, Default)]
pub struct LendingStore {
    state: Arc<Mutex<LendingState>>,
    fail_copy_state_updates: Arc<AtomicBool>,
}

impl LendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同じ状態を読む読み取りモデルを作成
    pub fn read_model(&self) -> InMemoryLendingReadModel {
        InMemoryLendingReadModel::new(Arc::clone(&self.state))
    }

    /// 利用者を登録する（テスト・初期データ用）
    pub async fn add_borrower(&self, name: &str, role: BorrowerRole) -> BorrowerId {
        let borrower = Borrower {
            borrower_id: BorrowerId::new(),
            name: name.to_string(),
            role,
        };
        let borrower_id = borrower.borrower_id;
        self.state.lock().await.borrowers.insert(borrower_id, borrower);
        borrower_id
    }

    /// 書籍と複本を登録する（テスト・初期データ用）
    pub async fn add_book(&self, title: &str, author: &str, quantity: u32) -> (BookId, Vec<CopyId>) {
        let book = Book {
            book_id: BookId::new(),
            title: title.to_string(),
            author: author.to_string(),
        };
        let book_id = book.book_id;
        let copies = new_copies(book_id, quantity);
        let copy_ids = copies.iter().map(|c| c.copy_id).collect();

        let mut state = self.state.lock().await;
        state.books.insert(book_id, book);
        state
            .copies
            .extend(copies.into_iter().map(|c| (c.copy_id, c)));

        (book_id, copy_ids)
    }

    pub async fn copy_state(&self, copy_id: CopyId) -> Option<CopyState> {
        self.state.lock().await.copies.get(&copy_id).map(|c| c.state)
    }

    pub async fn book_exists(&self, book_id: BookId) -> bool {
        self.state.lock().await.books.contains_key(&book_id)
    }

    /// 複本の未返却貸出の件数
    pub async fn open_loan_count_for_copy(&self, copy_id: CopyId) -> usize {
        self.state
            .lock()
            .await
            .loans
            .values()
            .filter(|loan| loan.copy_id == copy_id && loan.is_open())
            .count()
    }

    pub async fn loan_count(&self) -> usize {
        self.state.lock().await.loans.len()
    }

    /// 以後の複本状態の更新を失敗させる（ロールバック確認用）
    pub fn fail_copy_state_updates(&self, fail: bool) {
        self.fail_copy_state_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LendingStoreTrait for LendingStore {
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            fail_copy_state_updates: Arc::clone(&self.fail_copy_state_updates),
        }))
    }
}

/// インメモリのトランザクション
///
/// ミューテックスを保持している間は他のトランザクションが開始できないので、
/// `lock_*`は単なる読み取りになる。
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<LendingState>,
    working: LendingState,
    fail_copy_state_updates: Arc<AtomicBool>,
}

#[async_trait]
impl LendingTransaction for MemoryTransaction {
    async fn lock_borrower(&mut self, borrower_id: BorrowerId) -> Result<Option<Borrower>> {
        self.find_borrower(borrower_id).await
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn lock_copy(&mut self, copy_id: CopyId) -> Result<Option<BookCopy>> {
        self.find_copy(copy_id).await
    }

    async fn lock_loan(&mut self, loan_id: LoanId) -> Result<Option<Loan>> {
        Ok(self.working.loans.get(&loan_id).cloned())
    }

    async fn find_borrower(&mut self, borrower_id: BorrowerId) -> Result<Option<Borrower>> {
        Ok(self.working.borrowers.get(&borrower_id).cloned())
    }

    async fn find_copy(&mut self, copy_id: CopyId) -> Result<Option<BookCopy>> {
        Ok(self.working.copies.get(&copy_id).cloned())
    }

    async fn open_loans_for_borrower(
        &mut self,
        borrower_id: BorrowerId,
    ) -> Result<Vec<OpenLoanSummary>> {
        self.working
            .loans
            .values()
            .filter(|loan| loan.borrower_id == borrower_id && loan.is_open())
            .map(|loan| -> Result<OpenLoanSummary> {
                let copy = self.working.copies.get(&loan.copy_id).ok_or_else(|| {
                    integrity(format!("loan {} references a missing copy", loan.loan_id.value()))
                })?;
                Ok(OpenLoanSummary {
                    loan_id: loan.loan_id,
                    book_id: copy.book_id,
                    due_date: loan.due_date,
                })
            })
            .collect()
    }

    async fn has_open_loan(&mut self, copy_id: CopyId) -> Result<bool> {
        Ok(self.working.open_loan_for_copy(copy_id).is_some())
    }

    /// 外部キーと「複本ごとに未返却は1件」の一意制約を検査する
    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        if !self.working.copies.contains_key(&loan.copy_id) {
            return Err(integrity(format!("copy {} does not exist", loan.copy_id.value())));
        }
        if !self.working.borrowers.contains_key(&loan.borrower_id) {
            return Err(integrity(format!(
                "borrower {} does not exist",
                loan.borrower_id.value()
            )));
        }
        if loan.is_open() && self.working.open_loan_for_copy(loan.copy_id).is_some() {
            return Err(integrity(format!(
                "copy {} already has an open loan",
                loan.copy_id.value()
            )));
        }
        if self.working.loans.contains_key(&loan.loan_id) {
            return Err(integrity(format!("duplicate loan id {}", loan.loan_id.value())));
        }

        self.working.loans.insert(loan.loan_id, loan.clone());
        Ok(())
    }

    async fn mark_returned(&mut self, loan_id: LoanId, return_date: DateTime<Utc>) -> Result<()> {
        match self.working.loans.get_mut(&loan_id) {
            Some(loan) if loan.is_open() => {
                loan.return_date = Some(return_date);
                Ok(())
            }
            _ => Err(integrity(format!(
                "mark loan returned: no open loan {}",
                loan_id.value()
            ))),
        }
    }

    async fn set_copy_state(&mut self, copy_id: CopyId, state: CopyState) -> Result<()> {
        if self.fail_copy_state_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected copy state failure".into()));
        }

        let copy = self
            .working
            .copies
            .get_mut(&copy_id)
            .ok_or_else(|| integrity(format!("update copy state: no copy {}", copy_id.value())))?;
        copy.state = state;
        Ok(())
    }

    async fn insert_book(&mut self, book: &Book) -> Result<()> {
        if self.working.books.contains_key(&book.book_id) {
            return Err(integrity(format!("duplicate book id {}", book.book_id.value())));
        }
        self.working.books.insert(book.book_id, book.clone());
        Ok(())
    }

    async fn insert_copies(&mut self, copies: &[BookCopy]) -> Result<()> {
        for copy in copies {
            if !self.working.books.contains_key(&copy.book_id) {
                return Err(integrity(format!("book {} does not exist", copy.book_id.value())));
            }
            self.working.copies.insert(copy.copy_id, copy.clone());
        }
        Ok(())
    }

    /// 複本とその貸出をまとめて削除する
    async fn delete_copy(&mut self, copy_id: CopyId) -> Result<()> {
        if self.working.copies.remove(&copy_id).is_none() {
            return Err(integrity(format!("delete copy: no copy {}", copy_id.value())));
        }
        self.working.loans.retain(|_, loan| loan.copy_id != copy_id);
        Ok(())
    }

    async fn count_copies(&mut self, book_id: BookId) -> Result<u64> {
        let count = self
            .working
            .copies
            .values()
            .filter(|copy| copy.book_id == book_id)
            .count();
        Ok(count as u64)
    }

    async fn delete_book(&mut self, book_id: BookId) -> Result<()> {
        if self.working.books.remove(&book_id).is_none() {
            return Err(integrity(format!("delete book: no book {}", book_id.value())));
        }

        let removed: Vec<CopyId> = self
            .working
            .copies
            .values()
            .filter(|copy| copy.book_id == book_id)
            .map(|copy| copy.copy_id)
            .collect();
        for copy_id in removed {
            self.delete_copy(copy_id).await?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::loan;

    #[tokio::test]
    async fn test_dropped_transaction_leaves_no_trace() {
        let store = LendingStore::new();
        let borrower_id = store.add_borrower("Alice", BorrowerRole::User).await;
        let (_, copy_ids) = store.add_book("Dune", "Frank Herbert", 1).await;

        {
            let mut tx = store.begin().await.unwrap();
            let loan = loan::open_loan(copy_ids[0], borrower_id, Utc::now());
            tx.insert_loan(&loan).await.unwrap();
            tx.set_copy_state(copy_ids[0], CopyState::OnLoan)
                .await
                .unwrap();
        }

        assert_eq!(store.loan_count().await, 0);
        assert_eq!(
            store.copy_state(copy_ids[0]).await,
            Some(CopyState::Available)
        );
    }

    #[tokio::test]
    async fn test_second_open_loan_for_same_copy_is_integrity_error() {
        let store = LendingStore::new();
        let alice = store.add_borrower("Alice", BorrowerRole::User).await;
        let bob = store.add_borrower("Bob", BorrowerRole::User).await;
        let (_, copy_ids) = store.add_book("Dune", "Frank Herbert", 1).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_loan(&loan::open_loan(copy_ids[0], alice, Utc::now()))
            .await
            .unwrap();
        let result = tx
            .insert_loan(&loan::open_loan(copy_ids[0], bob, Utc::now()))
            .await;

        assert!(matches!(result, Err(StoreError::Integrity(_))));
    }

    #[tokio::test]
    async fn test_commit_publishes_working_state() {
        let store = LendingStore::new();
        let (book_id, copy_ids) = store.add_book("Dune", "Frank Herbert", 2).await;

        let mut tx = store.begin().await.unwrap();
        tx.delete_copy(copy_ids[0]).await.unwrap();
        assert_eq!(tx.count_copies(book_id).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(store.copy_state(copy_ids[0]).await, None);
        assert_eq!(
            store.copy_state(copy_ids[1]).await,
            Some(CopyState::Available)
        );
    }
}
