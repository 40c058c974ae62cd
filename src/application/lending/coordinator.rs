use crate::domain::{
    CopyState, Loan,
    commands::{BorrowCopy, ReturnLoan},
    loan,
    policy::{self, BorrowSnapshot, ReturnSnapshot},
};
use crate::ports::{LendingReadModel, LendingStore, LendingTransaction};
use std::sync::Arc;

use super::errors::{LendingError, Resource, Result};

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞いは持たず、各操作の関数に明示的に渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub store: Arc<dyn LendingStore>,
    pub read_model: Arc<dyn LendingReadModel>,
}

/// トランザクションを結果に応じてコミットまたはロールバックする
///
/// 作業中のどのステップが失敗しても、それまでの書き込みはすべて取り消される。
pub(super) async fn finish<T>(tx: Box<dyn LendingTransaction>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                // 元のエラーを優先する
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

/// 複本を借りる
///
/// 1つのトランザクション内で以下を行う：
/// 1. 利用者行をロック（同じ利用者の同時貸出を直列化）
/// 2. 対象の複本行を排他ロック
/// 3. 利用者の未返却貸出を読み取り、ポリシーを判定
/// 4. 貸出を作成し、複本を貸出中にする
///
/// 同じ複本への同時リクエストは複本ロックで直列化され、後続は
/// 更新後の`on_loan`を読んで`CopyUnavailable`になる。
#[tracing::instrument(skip_all, fields(borrower_id = %cmd.borrower_id.value(), copy_id = %cmd.copy_id.value()))]
pub async fn borrow_copy(deps: &ServiceDependencies, cmd: BorrowCopy) -> Result<Loan> {
    let mut tx = deps.store.begin().await?;
    let outcome = borrow_in_tx(tx.as_mut(), &cmd).await;
    let loan = finish(tx, outcome).await.inspect_err(log_rejection)?;

    tracing::info!(
        loan_id = %loan.loan_id.value(),
        due_date = %loan.due_date,
        "Copy borrowed"
    );
    Ok(loan)
}

async fn borrow_in_tx(tx: &mut dyn LendingTransaction, cmd: &BorrowCopy) -> Result<Loan> {
    // 1. 利用者の存在確認とロック
    tx.lock_borrower(cmd.borrower_id)
        .await?
        .ok_or(LendingError::NotFound(Resource::Borrower))?;

    // 2. 複本の排他ロック（存在しない場合はポリシー側で判定）
    let target = tx.lock_copy(cmd.copy_id).await?;

    // 3. 同じトランザクション内でスナップショットを取得して判定
    let open_loans = tx.open_loans_for_borrower(cmd.borrower_id).await?;
    let snapshot = BorrowSnapshot {
        open_loans,
        target,
        now: cmd.requested_at,
    };
    policy::validate_borrow(&snapshot)?;

    // 4. 貸出の作成と複本の状態変更
    let loan = loan::open_loan(cmd.copy_id, cmd.borrower_id, cmd.requested_at);
    tx.insert_loan(&loan).await?;
    tx.set_copy_state(cmd.copy_id, CopyState::OnLoan).await?;

    Ok(loan)
}

/// 貸出を返却する
///
/// ビジネスルール：
/// - 貸出が存在すること
/// - 本人の貸出であること
/// - 未返却であること
/// - 延滞していても返却は受け付ける
#[tracing::instrument(skip_all, fields(borrower_id = %cmd.borrower_id.value(), loan_id = %cmd.loan_id.value()))]
pub async fn return_loan(deps: &ServiceDependencies, cmd: ReturnLoan) -> Result<Loan> {
    let mut tx = deps.store.begin().await?;
    let outcome = return_in_tx(tx.as_mut(), &cmd).await;
    let loan = finish(tx, outcome).await.inspect_err(log_rejection)?;

    tracing::info!(copy_id = %loan.copy_id.value(), "Loan returned");
    Ok(loan)
}

async fn return_in_tx(tx: &mut dyn LendingTransaction, cmd: &ReturnLoan) -> Result<Loan> {
    let current = tx
        .lock_loan(cmd.loan_id)
        .await?
        .ok_or(LendingError::NotFound(Resource::Loan))?;

    policy::validate_return(ReturnSnapshot {
        requester: cmd.borrower_id,
        loan: &current,
    })?;

    let returned = loan::close_loan(&current, cmd.returned_at)?;

    tx.lock_copy(current.copy_id)
        .await?
        .ok_or(LendingError::NotFound(Resource::Copy))?;
    tx.mark_returned(current.loan_id, cmd.returned_at).await?;
    tx.set_copy_state(current.copy_id, CopyState::Available).await?;

    Ok(returned)
}

pub(super) fn log_rejection(err: &LendingError) {
    match err {
        LendingError::PolicyViolation(violation) => {
            tracing::warn!(reason = violation.code(), "Request rejected by lending policy");
        }
        LendingError::NotFound(resource) => {
            tracing::warn!(resource = %resource, "Request rejected: not found");
        }
        _ => {}
    }
}
