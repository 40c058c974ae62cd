use crate::domain::{BookId, Borrower, BorrowerId, CopyId, LoanId};
use crate::ports::lending_read_model::{
    CopyView, LendingReadModel as LendingReadModelTrait, LoanStatus, LoanView, Result,
    StoreError,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::invalid_data;
use super::lending_store::map_row_to_borrower;

const LOAN_VIEW_COLUMNS: &str = r#"
    SELECT
        l.id AS loan_id,
        l.copy_id,
        c.book_id,
        b.title AS book_title,
        b.author AS book_author,
        l.borrower_id,
        l.loan_date,
        l.due_date,
        l.return_date
    FROM loans l
    JOIN book_copies c ON c.id = l.copy_id
    JOIN books b ON b.id = c.book_id
"#;

/// PostgreSQLの行データをLoanViewに変換する
///
/// ステータスは保存せず、読み取り時刻を基準に算出する。
fn map_row_to_loan_view(row: &PgRow) -> Result<LoanView> {
    let due_date = row.try_get("due_date")?;
    let return_date = row.try_get("return_date")?;

    Ok(LoanView {
        loan_id: LoanId::from_uuid(row.try_get("loan_id")?),
        copy_id: CopyId::from_uuid(row.try_get("copy_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        book_title: row.try_get("book_title")?,
        book_author: row.try_get("book_author")?,
        borrower_id: BorrowerId::from_uuid(row.try_get("borrower_id")?),
        loan_date: row.try_get("loan_date")?,
        due_date,
        return_date,
        status: LoanStatus::classify(due_date, return_date, Utc::now()),
    })
}

/// 複本の行と、未返却の貸出があればその借り手を変換する
fn map_row_to_copy_view(row: &PgRow) -> Result<CopyView> {
    let state: String = row.try_get("state")?;
    let loan_id: Option<Uuid> = row.try_get("loan_id")?;
    let borrower_id: Option<Uuid> = row.try_get("borrower_id")?;

    Ok(CopyView {
        copy_id: CopyId::from_uuid(row.try_get("copy_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        state: state.parse().map_err(invalid_data)?,
        loan_id: loan_id.map(LoanId::from_uuid),
        borrower_id: borrower_id.map(BorrowerId::from_uuid),
        borrower_name: row.try_get("borrower_name")?,
        loan_date: row.try_get("loan_date")?,
    })
}

/// LendingReadModelのPostgreSQL実装
///
/// 書き込み側と同じテーブルを結合して読むだけで、状態は変更しない。
pub struct LendingReadModel {
    pool: PgPool,
}

impl LendingReadModel {
    /// PostgreSQLコネクションプールから新しいLendingReadModelを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LendingReadModelTrait for LendingReadModel {
    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<LoanView>> {
        let sql = format!("{} WHERE l.id = $1", LOAN_VIEW_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(loan_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_loan_view).transpose()
    }

    /// 利用者の貸出履歴（新しい順）
    ///
    /// (borrower_id, loan_date DESC)のインデックスを使用する。
    async fn find_loans_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<LoanView>> {
        let sql = format!(
            "{} WHERE l.borrower_id = $1 ORDER BY l.loan_date DESC, l.id",
            LOAN_VIEW_COLUMNS
        );

        sqlx::query(&sql)
            .bind(borrower_id.value())
            .fetch(&self.pool)
            .map_err(StoreError::from)
            .and_then(|row| async move { map_row_to_loan_view(&row) })
            .try_collect()
            .await
    }

    async fn find_copies_by_book(&self, book_id: BookId) -> Result<Vec<CopyView>> {
        let rows = sqlx::query(
            r#"
            SELECT
                c.id AS copy_id,
                c.book_id,
                c.state,
                l.id AS loan_id,
                l.borrower_id,
                br.name AS borrower_name,
                l.loan_date
            FROM book_copies c
            LEFT JOIN loans l ON l.copy_id = c.id AND l.return_date IS NULL
            LEFT JOIN borrowers br ON br.id = l.borrower_id
            WHERE c.book_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(book_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_copy_view).collect()
    }

    async fn find_borrower(&self, borrower_id: BorrowerId) -> Result<Option<Borrower>> {
        let row = sqlx::query("SELECT id, name, role FROM borrowers WHERE id = $1")
            .bind(borrower_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_borrower).transpose()
    }
}
