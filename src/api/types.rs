use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::lending::{CopyRemoval, RegisteredBook};
use crate::domain::Loan;
use crate::ports::{CopyView, LoanView};

/// 書籍登録リクエスト（POST /books）
#[derive(Debug, Deserialize)]
pub struct RegisterBookRequest {
    pub title: String,
    pub author: String,
    /// 作成する複本数（省略時は1冊）
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

/// 複本追加リクエスト（POST /books/:id/copies）
#[derive(Debug, Deserialize)]
pub struct AddCopiesRequest {
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// 貸出・返却のレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanResponse {
    pub loan_id: Uuid,
    pub copy_id: Uuid,
    pub borrower_id: Uuid,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        Self {
            loan_id: loan.loan_id.value(),
            copy_id: loan.copy_id.value(),
            borrower_id: loan.borrower_id.value(),
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
        }
    }
}

/// 貸出詳細レスポンス（GET /loans/:id と GET /borrowers/:id/loans）
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanDetailResponse {
    pub loan_id: Uuid,
    pub copy_id: Uuid,
    pub book_id: Uuid,
    pub book_title: String,
    pub book_author: String,
    pub borrower_id: Uuid,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: String,
}

impl From<LoanView> for LoanDetailResponse {
    fn from(view: LoanView) -> Self {
        Self {
            loan_id: view.loan_id.value(),
            copy_id: view.copy_id.value(),
            book_id: view.book_id.value(),
            book_title: view.book_title,
            book_author: view.book_author,
            borrower_id: view.borrower_id.value(),
            loan_date: view.loan_date,
            due_date: view.due_date,
            return_date: view.return_date,
            status: view.status.as_str().to_string(),
        }
    }
}

/// 複本レスポンス（GET /books/:id/copies）
#[derive(Debug, Serialize, Deserialize)]
pub struct CopyResponse {
    pub copy_id: Uuid,
    pub book_id: Uuid,
    pub state: String,
    pub loan_id: Option<Uuid>,
    pub borrower_id: Option<Uuid>,
    pub borrower_name: Option<String>,
    pub loan_date: Option<DateTime<Utc>>,
}

impl From<CopyView> for CopyResponse {
    fn from(view: CopyView) -> Self {
        Self {
            copy_id: view.copy_id.value(),
            book_id: view.book_id.value(),
            state: view.state.as_str().to_string(),
            loan_id: view.loan_id.map(|id| id.value()),
            borrower_id: view.borrower_id.map(|id| id.value()),
            borrower_name: view.borrower_name,
            loan_date: view.loan_date,
        }
    }
}

/// 書籍登録レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct BookRegisteredResponse {
    pub book_id: Uuid,
    pub copy_ids: Vec<Uuid>,
}

impl From<RegisteredBook> for BookRegisteredResponse {
    fn from(registered: RegisteredBook) -> Self {
        Self {
            book_id: registered.book_id.value(),
            copy_ids: registered.copy_ids.iter().map(|id| id.value()).collect(),
        }
    }
}

/// 複本追加レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct CopiesAddedResponse {
    pub copy_ids: Vec<Uuid>,
}

/// 複本削除レスポンス（DELETE /copies/:id）
#[derive(Debug, Serialize, Deserialize)]
pub struct CopyRemovedResponse {
    pub copy_id: Uuid,
    pub book_removed: bool,
}

impl From<CopyRemoval> for CopyRemovedResponse {
    fn from(removal: CopyRemoval) -> Self {
        Self {
            copy_id: removal.copy_id.value(),
            book_removed: removal.book_removed,
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 機械可読なエラーコード
    pub error: String,
    pub message: String,
    /// 同じリクエストを再送してよいか
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}
