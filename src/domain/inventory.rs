use serde::{Deserialize, Serialize};

use super::{BookId, BorrowerId, BorrowerRole, CopyId, CopyState};

/// 1回の操作で追加できる複本数の上限
pub const MAX_COPIES_PER_REQUEST: u32 = 100;

/// 書籍（タイトル単位）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
}

/// 複本 - 貸出可能な1冊
///
/// 状態は貸出・返却トランザクションでのみ変更される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCopy {
    pub copy_id: CopyId,
    pub book_id: BookId,
    pub state: CopyState,
}

/// 利用者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrower {
    pub borrower_id: BorrowerId,
    pub name: String,
    pub role: BorrowerRole,
}

/// 追加数の検証
///
/// 1以上、上限以下であること。
pub fn validate_quantity(quantity: u32) -> Result<u32, String> {
    if quantity == 0 || quantity > MAX_COPIES_PER_REQUEST {
        return Err(format!(
            "quantity must be between 1 and {}, got {}",
            MAX_COPIES_PER_REQUEST, quantity
        ));
    }
    Ok(quantity)
}

/// 純粋関数：書籍に複本をN冊作成する（すべて貸出可能状態）
pub fn new_copies(book_id: BookId, quantity: u32) -> Vec<BookCopy> {
    (0..quantity)
        .map(|_| BookCopy {
            copy_id: CopyId::new(),
            book_id,
            state: CopyState::Available,
        })
        .collect()
}
