use crate::application::borrowing::BorrowingApplicationError;
use crate::domain::ValueError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::{ErrorDetail, ErrorResponse};

/// API層のエラー型
///
/// アプリケーション層のエラーと入力検証エラーをHTTPレスポンスにマッピングする。
#[derive(Debug)]
pub enum ApiError {
    Application(BorrowingApplicationError),
    BadRequest(String),
}

impl From<BorrowingApplicationError> for ApiError {
    fn from(err: BorrowingApplicationError) -> Self {
        ApiError::Application(err)
    }
}

impl From<ValueError> for ApiError {
    fn from(err: ValueError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            // 400 Bad Request - 入力の形式が不正
            ApiError::BadRequest(message) => {
                let body = Json(ErrorResponse::new("BAD_REQUEST", message));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            ApiError::Application(err) => err,
        };

        let message = err.to_string();
        let (status, error_type, body) = match &err {
            // 404 Not Found - リクエストされたリソースが存在しない
            BorrowingApplicationError::BorrowingNotFound(_) => {
                (StatusCode::NOT_FOUND, "BORROWING_NOT_FOUND", None)
            }
            BorrowingApplicationError::LineItemNotFound(_) => {
                (StatusCode::NOT_FOUND, "LINE_ITEM_NOT_FOUND", None)
            }

            // 422 Unprocessable Entity - ビジネスルール違反
            BorrowingApplicationError::CardNotFound(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "CARD_NOT_FOUND", None)
            }
            BorrowingApplicationError::BookNotFound(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "BOOK_NOT_FOUND", None)
            }
            BorrowingApplicationError::CardLocked => {
                (StatusCode::UNPROCESSABLE_ENTITY, "CARD_LOCKED", None)
            }
            BorrowingApplicationError::CardExpired => {
                (StatusCode::UNPROCESSABLE_ENTITY, "CARD_EXPIRED", None)
            }
            BorrowingApplicationError::SelectionRejected(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "SELECTION_REJECTED",
                Some(
                    ErrorResponse::new("SELECTION_REJECTED", message.clone())
                        .with_details(violations.iter().map(ErrorDetail::from).collect()),
                ),
            ),

            // 409 Conflict - 現在の状態と矛盾する
            BorrowingApplicationError::AlreadyReturned(_) => {
                (StatusCode::CONFLICT, "ALREADY_RETURNED", None)
            }
            BorrowingApplicationError::BorrowingClosed(_) => {
                (StatusCode::CONFLICT, "BORROWING_CLOSED", None)
            }
            BorrowingApplicationError::ConcurrentModification(_) => {
                (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION", None)
            }

            // 500 Internal Server Error - システム障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            BorrowingApplicationError::CorruptedHistory { .. }
            | BorrowingApplicationError::EventStoreError(_)
            | BorrowingApplicationError::ReadModelError(_)
            | BorrowingApplicationError::CardServiceError(_)
            | BorrowingApplicationError::BookServiceError(_)
            | BorrowingApplicationError::StatisticsError(_) => {
                tracing::error!(error = ?err, "{}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    Some(ErrorResponse::new(
                        "INTERNAL_ERROR",
                        "An unexpected error occurred",
                    )),
                )
            }
        };

        let body = body.unwrap_or_else(|| ErrorResponse::new(error_type, message));
        (status, Json(body)).into_response()
    }
}
