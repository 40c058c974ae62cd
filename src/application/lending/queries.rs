use crate::domain::{BorrowerId, LoanId};
use crate::ports::{LendingReadModel, LoanView};

use super::coordinator::ServiceDependencies;
use super::errors::{LendingError, Resource, Result};

/// 利用者が管理者か
///
/// 登録されていない利用者は管理者として扱わない。
async fn is_admin(read_model: &dyn LendingReadModel, borrower_id: BorrowerId) -> Result<bool> {
    let borrower = read_model.find_borrower(borrower_id).await?;
    Ok(borrower.is_some_and(|b| b.role.is_admin()))
}

/// 貸出詳細を取得する
///
/// 本人と管理者以外には存在しない貸出と同じ`NotFound`を返す。
#[tracing::instrument(skip_all, fields(requester = %requester.value(), loan_id = %loan_id.value()))]
pub async fn view_loan(
    deps: &ServiceDependencies,
    requester: BorrowerId,
    loan_id: LoanId,
) -> Result<LoanView> {
    let read_model = deps.read_model.as_ref();
    let view = read_model
        .get_loan(loan_id)
        .await?
        .ok_or(LendingError::NotFound(Resource::Loan))?;

    if view.borrower_id != requester && !is_admin(read_model, requester).await? {
        return Err(LendingError::NotFound(Resource::Loan));
    }
    Ok(view)
}

/// 利用者の貸出履歴を新しい順に取得する
///
/// 他人の履歴は管理者のみ閲覧できる。
#[tracing::instrument(skip_all, fields(requester = %requester.value(), borrower_id = %borrower_id.value()))]
pub async fn borrower_loans(
    deps: &ServiceDependencies,
    requester: BorrowerId,
    borrower_id: BorrowerId,
) -> Result<Vec<LoanView>> {
    let read_model = deps.read_model.as_ref();
    if borrower_id != requester && !is_admin(read_model, requester).await? {
        return Err(LendingError::Forbidden);
    }

    Ok(read_model.find_loans_by_borrower(borrower_id).await?)
}
