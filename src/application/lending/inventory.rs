use crate::domain::{
    Book, BookId, BorrowerId, CopyId, CopyState,
    commands::{AddCopies, RegisterBook, RemoveCopy},
    inventory::{new_copies, validate_quantity},
    PolicyViolation,
};
use crate::ports::LendingTransaction;
use serde::Serialize;

use super::coordinator::{ServiceDependencies, finish, log_rejection};
use super::errors::{LendingError, Resource, Result};

/// 書籍登録の結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredBook {
    pub book_id: BookId,
    pub copy_ids: Vec<CopyId>,
}

/// 複本削除の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CopyRemoval {
    pub copy_id: CopyId,
    pub book_id: BookId,
    /// 最後の複本だったため書籍も削除されたか
    pub book_removed: bool,
}

async fn require_admin(tx: &mut dyn LendingTransaction, actor_id: BorrowerId) -> Result<()> {
    let actor = tx
        .find_borrower(actor_id)
        .await?
        .ok_or(LendingError::NotFound(Resource::Borrower))?;

    if !actor.role.is_admin() {
        return Err(LendingError::Forbidden);
    }
    Ok(())
}

fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LendingError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// 書籍を登録し、指定数の複本を作成する
///
/// 書籍と複本は同じトランザクションで作成される。
/// 入力の検証は管理者権限の確認後に行う。
#[tracing::instrument(skip_all, fields(actor_id = %cmd.actor_id.value(), quantity = cmd.quantity))]
pub async fn register_book(deps: &ServiceDependencies, cmd: RegisterBook) -> Result<RegisteredBook> {
    let mut tx = deps.store.begin().await?;
    let outcome = register_in_tx(tx.as_mut(), &cmd).await;
    let registered = finish(tx, outcome).await.inspect_err(log_rejection)?;

    tracing::info!(book_id = %registered.book_id.value(), "Book registered");
    Ok(registered)
}

/// 既存の書籍に複本を追加する
///
/// 追加された複本はすべて貸出可能状態で作成される。
#[tracing::instrument(skip_all, fields(actor_id = %cmd.actor_id.value(), book_id = %cmd.book_id.value(), quantity = cmd.quantity))]
pub async fn add_copies(deps: &ServiceDependencies, cmd: AddCopies) -> Result<Vec<CopyId>> {
    let mut tx = deps.store.begin().await?;
    let outcome = add_in_tx(tx.as_mut(), &cmd).await;
    let copy_ids = finish(tx, outcome).await.inspect_err(log_rejection)?;

    tracing::info!(added = copy_ids.len(), "Copies added");
    Ok(copy_ids)
}

async fn register_in_tx(
    tx: &mut dyn LendingTransaction,
    cmd: &RegisterBook,
) -> Result<RegisteredBook> {
    require_admin(tx, cmd.actor_id).await?;

    let book = Book {
        book_id: BookId::new(),
        title: required_text("title", &cmd.title)?,
        author: required_text("author", &cmd.author)?,
    };
    let quantity = validate_quantity(cmd.quantity).map_err(LendingError::InvalidInput)?;

    tx.insert_book(&book).await?;

    let copies = new_copies(book.book_id, quantity);
    tx.insert_copies(&copies).await?;

    Ok(RegisteredBook {
        book_id: book.book_id,
        copy_ids: copies.iter().map(|c| c.copy_id).collect(),
    })
}

async fn add_in_tx(tx: &mut dyn LendingTransaction, cmd: &AddCopies) -> Result<Vec<CopyId>> {
    require_admin(tx, cmd.actor_id).await?;

    let quantity = validate_quantity(cmd.quantity).map_err(LendingError::InvalidInput)?;

    tx.lock_book(cmd.book_id)
        .await?
        .ok_or(LendingError::NotFound(Resource::Book))?;

    let copies = new_copies(cmd.book_id, quantity);
    tx.insert_copies(&copies).await?;

    Ok(copies.iter().map(|c| c.copy_id).collect())
}

/// 複本を1冊削除する
///
/// ビジネスルール：
/// - 管理者のみ
/// - 貸出中の複本は削除できない（未返却の貸出を孤立させない）
/// - 最後の複本を削除した場合は書籍も削除する
///
/// 同じ書籍の複本削除は書籍行のロックで直列化されるため、
/// 最後の1冊の判定が競合しない。
#[tracing::instrument(skip_all, fields(actor_id = %cmd.actor_id.value(), copy_id = %cmd.copy_id.value()))]
pub async fn remove_copy(deps: &ServiceDependencies, cmd: RemoveCopy) -> Result<CopyRemoval> {
    let mut tx = deps.store.begin().await?;
    let outcome = remove_in_tx(tx.as_mut(), &cmd).await;
    let removal = finish(tx, outcome).await.inspect_err(log_rejection)?;

    tracing::info!(
        book_id = %removal.book_id.value(),
        book_removed = removal.book_removed,
        "Copy removed"
    );
    Ok(removal)
}

async fn remove_in_tx(tx: &mut dyn LendingTransaction, cmd: &RemoveCopy) -> Result<CopyRemoval> {
    require_admin(tx, cmd.actor_id).await?;

    // ロック順序：書籍 → 複本
    let book_id = tx
        .find_copy(cmd.copy_id)
        .await?
        .ok_or(LendingError::NotFound(Resource::Copy))?
        .book_id;

    tx.lock_book(book_id)
        .await?
        .ok_or(LendingError::NotFound(Resource::Book))?;

    // ロック待ちの間に削除されている可能性がある
    let copy = tx
        .lock_copy(cmd.copy_id)
        .await?
        .ok_or(LendingError::NotFound(Resource::Copy))?;

    if copy.state == CopyState::OnLoan || tx.has_open_loan(copy.copy_id).await? {
        return Err(PolicyViolation::CopyOnLoan.into());
    }

    tx.delete_copy(copy.copy_id).await?;

    let remaining = tx.count_copies(copy.book_id).await?;
    let book_removed = remaining == 0;
    if book_removed {
        tx.delete_book(copy.book_id).await?;
    }

    Ok(CopyRemoval {
        copy_id: copy.copy_id,
        book_id: copy.book_id,
        book_removed,
    })
}
