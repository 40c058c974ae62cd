use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, BorrowerId, CopyId, LoanId};

/// コマンド：複本を借りる
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowCopy {
    pub borrower_id: BorrowerId,
    pub copy_id: CopyId,
    pub requested_at: DateTime<Utc>,
}

/// コマンド：貸出を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLoan {
    pub borrower_id: BorrowerId,
    pub loan_id: LoanId,
    pub returned_at: DateTime<Utc>,
}

/// コマンド：書籍を登録し、最初の複本を作成する（管理者のみ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBook {
    pub actor_id: BorrowerId,
    pub title: String,
    pub author: String,
    pub quantity: u32,
}

/// コマンド：既存の書籍に複本を追加する（管理者のみ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCopies {
    pub actor_id: BorrowerId,
    pub book_id: BookId,
    pub quantity: u32,
}

/// コマンド：複本を1冊削除する（管理者のみ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCopy {
    pub actor_id: BorrowerId,
    pub copy_id: CopyId,
}
