use crate::application::lending::{
    LendingError, ServiceDependencies, add_copies as execute_add_copies,
    borrow_copy as execute_borrow_copy, borrower_loans, register_book as execute_register_book,
    remove_copy as execute_remove_copy, return_loan as execute_return_loan, view_loan,
};
use crate::domain::{
    BookId, BorrowerId, CopyId, LoanId,
    commands::{AddCopies, BorrowCopy, RegisterBook, RemoveCopy, ReturnLoan},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    requester::Requester,
    types::{
        AddCopiesRequest, BookRegisteredResponse, CopiesAddedResponse, CopyRemovedResponse,
        CopyResponse, LoanDetailResponse, LoanResponse, RegisterBookRequest,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

// ============================================================================
// Command handlers
// ============================================================================

/// POST /copies/:id/borrow - 複本を借りる
///
/// 強制されるビジネスルール:
/// - 貸出数が上限（3冊）未満であること
/// - 延滞中の貸出がないこと
/// - 同じ書籍の別の複本を借りていないこと
/// - 複本が貸出可能であること
pub async fn borrow_copy(
    State(state): State<Arc<AppState>>,
    Requester(borrower_id): Requester,
    Path(copy_id): Path<Uuid>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let cmd = BorrowCopy {
        borrower_id,
        copy_id: CopyId::from_uuid(copy_id),
        requested_at: Utc::now(),
    };

    let loan = execute_borrow_copy(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(LoanResponse::from(loan))))
}

/// POST /loans/:id/return - 貸出を返却
///
/// 本人の未返却の貸出のみ返却できる。延滞中でも返却可能。
pub async fn return_loan(
    State(state): State<Arc<AppState>>,
    Requester(borrower_id): Requester,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = ReturnLoan {
        borrower_id,
        loan_id: LoanId::from_uuid(loan_id),
        returned_at: Utc::now(),
    };

    let loan = execute_return_loan(&state.service_deps, cmd).await?;

    Ok(Json(LoanResponse::from(loan)))
}

/// DELETE /copies/:id - 複本を削除（管理者のみ）
///
/// 最後の複本を削除した場合は書籍も削除される。
pub async fn remove_copy(
    State(state): State<Arc<AppState>>,
    Requester(actor_id): Requester,
    Path(copy_id): Path<Uuid>,
) -> Result<Json<CopyRemovedResponse>, ApiError> {
    let cmd = RemoveCopy {
        actor_id,
        copy_id: CopyId::from_uuid(copy_id),
    };

    let removal = execute_remove_copy(&state.service_deps, cmd).await?;

    Ok(Json(CopyRemovedResponse::from(removal)))
}

/// POST /books - 書籍と複本を登録（管理者のみ）
pub async fn register_book(
    State(state): State<Arc<AppState>>,
    Requester(actor_id): Requester,
    Json(req): Json<RegisterBookRequest>,
) -> Result<(StatusCode, Json<BookRegisteredResponse>), ApiError> {
    let cmd = RegisterBook {
        actor_id,
        title: req.title,
        author: req.author,
        quantity: req.quantity,
    };

    let registered = execute_register_book(&state.service_deps, cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(BookRegisteredResponse::from(registered)),
    ))
}

/// POST /books/:id/copies - 既存の書籍に複本を追加（管理者のみ）
pub async fn add_copies(
    State(state): State<Arc<AppState>>,
    Requester(actor_id): Requester,
    Path(book_id): Path<Uuid>,
    Json(req): Json<AddCopiesRequest>,
) -> Result<(StatusCode, Json<CopiesAddedResponse>), ApiError> {
    let cmd = AddCopies {
        actor_id,
        book_id: BookId::from_uuid(book_id),
        quantity: req.quantity,
    };

    let copy_ids = execute_add_copies(&state.service_deps, cmd).await?;

    let response = CopiesAddedResponse {
        copy_ids: copy_ids.iter().map(|id| id.value()).collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /loans/:id - 貸出詳細をIDで取得
///
/// 本人または管理者のみ。他人の貸出は404として扱う。
pub async fn get_loan(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanDetailResponse>, ApiError> {
    let view = view_loan(&state.service_deps, requester, LoanId::from_uuid(loan_id)).await?;

    Ok(Json(LoanDetailResponse::from(view)))
}

/// GET /borrowers/:id/loans - 利用者の貸出履歴（新しい順）
///
/// 本人または管理者のみ。それ以外は403。
pub async fn list_borrower_loans(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
    Path(borrower_id): Path<Uuid>,
) -> Result<Json<Vec<LoanDetailResponse>>, ApiError> {
    let loans = borrower_loans(
        &state.service_deps,
        requester,
        BorrowerId::from_uuid(borrower_id),
    )
    .await?;

    Ok(Json(loans.into_iter().map(LoanDetailResponse::from).collect()))
}

/// GET /books/:id/copies - 書籍の複本一覧（現在の借り手つき）
pub async fn list_book_copies(
    State(state): State<Arc<AppState>>,
    _requester: Requester,
    Path(book_id): Path<Uuid>,
) -> Result<Json<Vec<CopyResponse>>, ApiError> {
    let copies = state
        .service_deps
        .read_model
        .find_copies_by_book(BookId::from_uuid(book_id))
        .await
        .map_err(LendingError::from)?;

    Ok(Json(copies.into_iter().map(CopyResponse::from).collect()))
}
