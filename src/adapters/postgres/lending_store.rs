use crate::domain::{
    Book, BookCopy, BookId, Borrower, BorrowerId, CopyId, CopyState, Loan, LoanId,
    policy::OpenLoanSummary,
};
use crate::ports::{
    LendingStore as LendingStoreTrait, LendingTransaction, StoreError, lending_store::Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use super::invalid_data;

pub(super) fn map_row_to_borrower(row: &PgRow) -> Result<Borrower> {
    let role: String = row.try_get("role")?;
    Ok(Borrower {
        borrower_id: BorrowerId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        role: role.parse().map_err(invalid_data)?,
    })
}

fn map_row_to_copy(row: &PgRow) -> Result<BookCopy> {
    let state: String = row.try_get("state")?;
    Ok(BookCopy {
        copy_id: CopyId::from_uuid(row.try_get("id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        state: state.parse().map_err(invalid_data)?,
    })
}

fn map_row_to_loan(row: &PgRow) -> Result<Loan> {
    Ok(Loan {
        loan_id: LoanId::from_uuid(row.try_get("id")?),
        copy_id: CopyId::from_uuid(row.try_get("copy_id")?),
        borrower_id: BorrowerId::from_uuid(row.try_get("borrower_id")?),
        loan_date: row.try_get("loan_date")?,
        due_date: row.try_get("due_date")?,
        return_date: row.try_get("return_date")?,
    })
}

/// 更新件数が期待どおりでなければ整合性エラーにする
fn expect_one_row(affected: u64, what: &str) -> Result<()> {
    if affected != 1 {
        return Err(StoreError::Integrity(
            format!("{}: expected 1 row, affected {}", what, affected).into(),
        ));
    }
    Ok(())
}

/// LendingStoreのPostgreSQL実装
///
/// READ COMMITTEDのトランザクションと`SELECT ... FOR UPDATE`で行ロックを取る。
/// 各トランザクションの先頭で`lock_timeout`を設定し、ロック待ちが無期限にならないようにする。
pub struct LendingStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl LendingStore {
    /// PostgreSQLコネクションプールから新しいLendingStoreを作成
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }
}

#[async_trait]
impl LendingStoreTrait for LendingStore {
    async fn begin(&self) -> Result<Box<dyn LendingTransaction>> {
        let mut tx = self.pool.begin().await?;

        // SET LOCAL と同じくトランザクション終了までのみ有効
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgLendingTransaction { tx }))
    }
}

/// PostgreSQLのトランザクション
///
/// コミットせずに破棄された場合はsqlxがロールバックする。
pub struct PgLendingTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LendingTransaction for PgLendingTransaction {
    async fn lock_borrower(&mut self, borrower_id: BorrowerId) -> Result<Option<Borrower>> {
        let row = sqlx::query("SELECT id, name, role FROM borrowers WHERE id = $1 FOR UPDATE")
            .bind(borrower_id.value())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(map_row_to_borrower).transpose()
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query("SELECT id, title, author FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id.value())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|row| -> Result<Book> {
            Ok(Book {
                book_id: BookId::from_uuid(row.try_get("id")?),
                title: row.try_get("title")?,
                author: row.try_get("author")?,
            })
        })
        .transpose()
    }

    async fn lock_copy(&mut self, copy_id: CopyId) -> Result<Option<BookCopy>> {
        let row =
            sqlx::query("SELECT id, book_id, state FROM book_copies WHERE id = $1 FOR UPDATE")
                .bind(copy_id.value())
                .fetch_optional(&mut *self.tx)
                .await?;

        row.as_ref().map(map_row_to_copy).transpose()
    }

    async fn lock_loan(&mut self, loan_id: LoanId) -> Result<Option<Loan>> {
        let row = sqlx::query(
            r#"
            SELECT id, copy_id, borrower_id, loan_date, due_date, return_date
            FROM loans
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(loan_id.value())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn find_borrower(&mut self, borrower_id: BorrowerId) -> Result<Option<Borrower>> {
        let row = sqlx::query("SELECT id, name, role FROM borrowers WHERE id = $1")
            .bind(borrower_id.value())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(map_row_to_borrower).transpose()
    }

    async fn find_copy(&mut self, copy_id: CopyId) -> Result<Option<BookCopy>> {
        let row = sqlx::query("SELECT id, book_id, state FROM book_copies WHERE id = $1")
            .bind(copy_id.value())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(map_row_to_copy).transpose()
    }

    /// 未返却貸出を書籍IDとともに取得（利用者ロック取得後に呼ばれる）
    async fn open_loans_for_borrower(
        &mut self,
        borrower_id: BorrowerId,
    ) -> Result<Vec<OpenLoanSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, c.book_id, l.due_date
            FROM loans l
            JOIN book_copies c ON c.id = l.copy_id
            WHERE l.borrower_id = $1 AND l.return_date IS NULL
            "#,
        )
        .bind(borrower_id.value())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| -> Result<OpenLoanSummary> {
                Ok(OpenLoanSummary {
                    loan_id: LoanId::from_uuid(row.try_get("id")?),
                    book_id: BookId::from_uuid(row.try_get("book_id")?),
                    due_date: row.try_get("due_date")?,
                })
            })
            .collect()
    }

    async fn has_open_loan(&mut self, copy_id: CopyId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM loans WHERE copy_id = $1 AND return_date IS NULL)",
        )
        .bind(copy_id.value())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (id, copy_id, borrower_id, loan_date, due_date, return_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(loan.loan_id.value())
        .bind(loan.copy_id.value())
        .bind(loan.borrower_id.value())
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(loan.return_date)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn mark_returned(&mut self, loan_id: LoanId, return_date: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE loans SET return_date = $2 WHERE id = $1 AND return_date IS NULL",
        )
        .bind(loan_id.value())
        .bind(return_date)
        .execute(&mut *self.tx)
        .await?;

        expect_one_row(result.rows_affected(), "mark loan returned")
    }

    async fn set_copy_state(&mut self, copy_id: CopyId, state: CopyState) -> Result<()> {
        let result = sqlx::query("UPDATE book_copies SET state = $2 WHERE id = $1")
            .bind(copy_id.value())
            .bind(state.as_str())
            .execute(&mut *self.tx)
            .await?;

        expect_one_row(result.rows_affected(), "update copy state")
    }

    async fn insert_book(&mut self, book: &Book) -> Result<()> {
        sqlx::query("INSERT INTO books (id, title, author) VALUES ($1, $2, $3)")
            .bind(book.book_id.value())
            .bind(&book.title)
            .bind(&book.author)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    /// UNNESTを使ったバッチINSERT
    async fn insert_copies(&mut self, copies: &[BookCopy]) -> Result<()> {
        if copies.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = copies.iter().map(|c| c.copy_id.value()).collect();
        let book_ids: Vec<Uuid> = copies.iter().map(|c| c.book_id.value()).collect();
        let states: Vec<String> = copies.iter().map(|c| c.state.as_str().to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO book_copies (id, book_id, state)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::text[])
            "#,
        )
        .bind(&ids)
        .bind(&book_ids)
        .bind(&states)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_copy(&mut self, copy_id: CopyId) -> Result<()> {
        let result = sqlx::query("DELETE FROM book_copies WHERE id = $1")
            .bind(copy_id.value())
            .execute(&mut *self.tx)
            .await?;

        expect_one_row(result.rows_affected(), "delete copy")
    }

    async fn count_copies(&mut self, book_id: BookId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_copies WHERE book_id = $1")
            .bind(book_id.value())
            .fetch_one(&mut *self.tx)
            .await?;

        u64::try_from(count).map_err(|_| invalid_data(format!("negative copy count: {}", count)))
    }

    async fn delete_book(&mut self, book_id: BookId) -> Result<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id.value())
            .execute(&mut *self.tx)
            .await?;

        expect_one_row(result.rows_affected(), "delete book")
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
