use crate::application::lending::{LendingError, Resource};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub struct ApiError(LendingError);

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError(err)
    }
}

fn not_found_code(resource: Resource) -> &'static str {
    match resource {
        Resource::Borrower => "BORROWER_NOT_FOUND",
        Resource::Book => "BOOK_NOT_FOUND",
        Resource::Copy => "COPY_NOT_FOUND",
        Resource::Loan => "LOAN_NOT_FOUND",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, body) = match &self.0 {
            // 400 Bad Request - 貸出ポリシー違反（ルール名とメッセージを返す）
            LendingError::PolicyViolation(violation) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(violation.code(), message),
            ),
            LendingError::InvalidInput(_) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("INVALID_INPUT", message),
            ),

            // 404 Not Found - リクエストされたリソースが存在しない
            LendingError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(not_found_code(*resource), message),
            ),

            // 403 Forbidden - 管理者以外の在庫変更、他人の貸出履歴の閲覧
            LendingError::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("FORBIDDEN", message),
            ),

            // 503 Service Unavailable - ロック待ちタイムアウトなど。再試行可能
            // 一時的な障害のログはここでのみ出力する
            LendingError::Transient(e) => {
                tracing::warn!(error = %e, "Transient storage failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("TEMPORARILY_UNAVAILABLE", message).retryable(),
                )
            }

            // 500 Internal Server Error - システム障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            LendingError::Integrity(e) | LendingError::Store(e) => {
                tracing::error!(error = %e, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_ERROR", "An unexpected error occurred"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
