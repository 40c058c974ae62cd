use crate::domain::BorrowerId;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, header::LOCATION, request::Parts},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

/// 認証済み利用者IDを運ぶヘッダー
///
/// 認証そのものは前段のレイヤーが行い、このヘッダーを付与する。
pub const BORROWER_ID_HEADER: &str = "x-borrower-id";

/// Extractor for the requesting borrower
///
/// ヘッダーが無いか不正な場合はログイン画面へ302でリダイレクトする。
#[derive(Debug, Clone, Copy)]
pub struct Requester(pub BorrowerId);

#[async_trait]
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(BORROWER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(|uuid| Requester(BorrowerId::from_uuid(uuid)))
            .ok_or_else(|| (StatusCode::FOUND, [(LOCATION, "/login")]).into_response())
    }
}
