use crate::application::borrowing::{
    BorrowingApplicationError, ServiceDependencies, borrowing_statistics,
    count_unreturned_books as execute_count_unreturned_books,
    create_borrowing as execute_create_borrowing, return_all as execute_return_all,
    return_line_item as execute_return_line_item, top_borrowed_books,
};
use crate::domain::{
    commands::{ReturnAll, ReturnLineItem},
    value_objects::{BorrowingId, LineItemId},
};
use crate::ports::{StatisticsInterval, borrowing_read_model::BorrowingListQuery};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    types::{
        BorrowingListResponse, BorrowingResponse, CreateBorrowingRequest, DataResponse,
        ListBorrowingsQuery, ReturnRequest, StatisticsBucketResponse, StatisticsQuery,
        TopBookResponse, TopBooksQuery, UnreturnedCountResponse,
    },
};

/// ランキングの既定件数
const DEFAULT_TOP_BOOKS_LIMIT: u32 = 10;

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

// ============================================================================
// Command handlers (POST)
// ============================================================================

/// 返却リクエストのボディを解釈する
///
/// 空のボディは既定値（返却日時は現在時刻）として扱う。
/// それ以外は不正なJSONや日時を400で拒否する。
fn parse_return_request(body: &Bytes) -> Result<ReturnRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReturnRequest::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid return request body: {}", e)))
}

/// POST /borrowings - 新しい貸出記録を作成
///
/// 強制されるビジネスルール:
/// - 図書カードが存在し、ロックされておらず、有効期限内であること
/// - 選択された書籍が存在し、在庫が足りること
/// - 数量の合計がカードの貸出上限以下であること
///
/// クォータ違反はすべて`details`にまとめて返す。
pub async fn create_borrowing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBorrowingRequest>,
) -> Result<(StatusCode, Json<DataResponse<BorrowingResponse>>), ApiError> {
    let cmd = req.into_command(chrono::Utc::now())?;

    let view = execute_create_borrowing(&state.service_deps, cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(BorrowingResponse::from(view))),
    ))
}

/// POST /borrowings/:id/return - 未返却の明細をすべて返却
pub async fn return_all(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<DataResponse<BorrowingResponse>>, ApiError> {
    let req = parse_return_request(&body)?;

    let cmd = ReturnAll {
        borrowing_id: BorrowingId::from_uuid(borrowing_id),
        returned_at: req.returned_at.unwrap_or_else(chrono::Utc::now),
    };

    let view = execute_return_all(&state.service_deps, cmd).await?;

    Ok(Json(DataResponse::new(BorrowingResponse::from(view))))
}

/// POST /borrowings/:id/items/:item_id/return - 明細を1件返却
///
/// 最後の明細が返却されると貸出記録は返却完了になる。
pub async fn return_line_item(
    State(state): State<Arc<AppState>>,
    Path((borrowing_id, line_item_id)): Path<(Uuid, Uuid)>,
    body: Bytes,
) -> Result<Json<DataResponse<BorrowingResponse>>, ApiError> {
    let req = parse_return_request(&body)?;

    let cmd = ReturnLineItem {
        borrowing_id: BorrowingId::from_uuid(borrowing_id),
        line_item_id: LineItemId::from_uuid(line_item_id),
        returned_at: req.returned_at.unwrap_or_else(chrono::Utc::now),
    };

    let view = execute_return_line_item(&state.service_deps, cmd).await?;

    Ok(Json(DataResponse::new(BorrowingResponse::from(view))))
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /borrowings/:id - 貸出記録をIDで取得
pub async fn get_borrowing_by_id(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
) -> Result<Json<DataResponse<BorrowingResponse>>, ApiError> {
    let borrowing_id = BorrowingId::from_uuid(borrowing_id);

    let view = state
        .service_deps
        .borrowing_read_model
        .get_by_id(borrowing_id)
        .await
        .map_err(BorrowingApplicationError::ReadModelError)?
        .ok_or(BorrowingApplicationError::BorrowingNotFound(borrowing_id))?;

    Ok(Json(DataResponse::new(BorrowingResponse::from(view))))
}

/// GET /borrowings - 貸出記録の一覧取得
///
/// クエリパラメータ:
/// - is_returned: 返却状況でフィルタリング（オプション）
/// - card_number: カード番号で検索（部分一致、オプション）
/// - page, page_size: ページング（既定は1ページ目、10件）
///
/// 貸出日の新しい順に返す。
pub async fn list_borrowings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBorrowingsQuery>,
) -> Result<Json<DataResponse<BorrowingListResponse>>, ApiError> {
    let query = BorrowingListQuery::from(query);

    let page = state
        .service_deps
        .borrowing_read_model
        .list(query.clone())
        .await
        .map_err(BorrowingApplicationError::ReadModelError)?;

    Ok(Json(DataResponse::new(BorrowingListResponse::new(
        &query, page,
    ))))
}

/// GET /borrowings/unreturned-count - 未返却の書籍数（数量の合計）
pub async fn unreturned_count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse<UnreturnedCountResponse>>, ApiError> {
    let unreturned_books = execute_count_unreturned_books(&state.service_deps).await?;

    Ok(Json(DataResponse::new(UnreturnedCountResponse {
        unreturned_books,
    })))
}

/// GET /borrowings/statistics?interval=week|month|year - 区間ごとの貸出件数
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<DataResponse<Vec<StatisticsBucketResponse>>>, ApiError> {
    let interval = match query.interval.as_deref() {
        None => StatisticsInterval::Month,
        Some(value) => value
            .parse::<StatisticsInterval>()
            .map_err(ApiError::BadRequest)?,
    };

    let buckets = borrowing_statistics(&state.service_deps, interval).await?;

    Ok(Json(DataResponse::new(
        buckets.into_iter().map(Into::into).collect(),
    )))
}

/// GET /borrowings/top-books?limit= - 貸出数の多い書籍
pub async fn top_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopBooksQuery>,
) -> Result<Json<DataResponse<Vec<TopBookResponse>>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_BOOKS_LIMIT);

    let books = top_borrowed_books(&state.service_deps, limit).await?;

    Ok(Json(DataResponse::new(
        books.into_iter().map(Into::into).collect(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_empty_return_body_uses_defaults() {
        for body in ["", "  \n"] {
            let req = parse_return_request(&Bytes::from(body)).unwrap();
            assert_eq!(req.returned_at, None);
        }
    }

    #[test]
    fn test_return_body_with_date_is_parsed() {
        let req =
            parse_return_request(&Bytes::from(r#"{"returned_at":"2025-03-08T10:00:00Z"}"#))
                .unwrap();
        assert_eq!(
            req.returned_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 8, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_malformed_return_body_is_rejected() {
        for body in [r#"{"returned_at":"not-a-date"}"#, "{", "null"] {
            let result = parse_return_request(&Bytes::from(body));
            assert!(matches!(result, Err(ApiError::BadRequest(_))), "body: {}", body);
        }
    }
}
