use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    BookSelection, QuotaViolation, ValueError,
    commands::CreateBorrowing,
    value_objects::{BookId, CardNumber, EmployeeId, Quantity},
};
use crate::ports::{
    BorrowCountBucket, TopBorrowedBook,
    borrowing_read_model::{BorrowingListQuery, BorrowingPage, BorrowingView, LineItemView},
};

// ============================================================================
// Requests
// ============================================================================

/// 貸出する書籍と数量
#[derive(Debug, Deserialize)]
pub struct BookSelectionRequest {
    pub book_id: Uuid,
    pub quantity: u32,
}

/// 貸出作成リクエスト（POST /borrowings）
#[derive(Debug, Deserialize)]
pub struct CreateBorrowingRequest {
    pub card_number: String,
    pub employee_id: Uuid,
    /// 省略時は現在時刻
    pub borrow_date: Option<DateTime<Utc>>,
    pub books: Vec<BookSelectionRequest>,
}

impl CreateBorrowingRequest {
    /// 入力を検証してコマンドに変換する
    ///
    /// カード番号が空、または数量が0の場合はエラー。
    pub fn into_command(self, now: DateTime<Utc>) -> Result<CreateBorrowing, ValueError> {
        let selections = self
            .books
            .into_iter()
            .map(|book| {
                Ok(BookSelection {
                    book_id: BookId::from_uuid(book.book_id),
                    quantity: Quantity::new(book.quantity)?,
                })
            })
            .collect::<Result<Vec<_>, ValueError>>()?;

        Ok(CreateBorrowing {
            card_number: CardNumber::new(self.card_number)?,
            employee_id: EmployeeId::from_uuid(self.employee_id),
            borrow_date: self.borrow_date.unwrap_or(now),
            selections,
        })
    }
}

/// 返却リクエスト（本文は省略可）
#[derive(Debug, Default, Deserialize)]
pub struct ReturnRequest {
    /// 省略時は現在時刻
    pub returned_at: Option<DateTime<Utc>>,
}

/// 貸出一覧取得のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ListBorrowingsQuery {
    /// 返却状況でフィルタリング
    pub is_returned: Option<bool>,
    /// カード番号で検索（部分一致）
    pub card_number: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl From<ListBorrowingsQuery> for BorrowingListQuery {
    fn from(query: ListBorrowingsQuery) -> Self {
        BorrowingListQuery {
            is_returned: query.is_returned,
            card_number: query.card_number,
            page: query.page.unwrap_or(1),
            page_size: query.page_size.unwrap_or(0),
        }
        .normalized()
    }
}

/// 統計取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    /// week, month, year（省略時はmonth）
    pub interval: Option<String>,
}

/// ランキング取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct TopBooksQuery {
    /// 省略時は10件
    pub limit: Option<u32>,
}

// ============================================================================
// Responses
// ============================================================================

/// すべての成功レスポンスは`{ "data": ... }`で包む
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub line_item_id: Uuid,
    pub book_id: Uuid,
    pub book_title: String,
    pub quantity: u32,
    pub return_date: Option<DateTime<Utc>>,
    pub is_returned: bool,
}

impl From<LineItemView> for LineItemResponse {
    fn from(view: LineItemView) -> Self {
        Self {
            line_item_id: view.line_item_id.value(),
            book_id: view.book_id.value(),
            book_title: view.book_title,
            quantity: view.quantity,
            is_returned: view.return_date.is_some(),
            return_date: view.return_date,
        }
    }
}

/// 貸出記録レスポンス
#[derive(Debug, Serialize)]
pub struct BorrowingResponse {
    pub borrowing_id: Uuid,
    pub card_number: String,
    pub employee_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub status: String,
    pub is_returned: bool,
    pub total_quantity: u64,
    pub line_items: Vec<LineItemResponse>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BorrowingView> for BorrowingResponse {
    fn from(view: BorrowingView) -> Self {
        let total_quantity = view
            .line_items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum();

        Self {
            borrowing_id: view.borrowing_id.value(),
            card_number: view.card_number.to_string(),
            employee_id: view.employee_id.value(),
            borrow_date: view.borrow_date,
            status: view.status.as_str().to_string(),
            is_returned: view.is_returned,
            total_quantity,
            line_items: view.line_items.into_iter().map(Into::into).collect(),
            closed_at: view.closed_at,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

/// 貸出記録一覧レスポンス
#[derive(Debug, Serialize)]
pub struct BorrowingListResponse {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub rows: Vec<BorrowingResponse>,
}

impl BorrowingListResponse {
    pub fn new(query: &BorrowingListQuery, page: BorrowingPage) -> Self {
        Self {
            count: page.count,
            page: query.page,
            page_size: query.page_size,
            rows: page.rows.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnreturnedCountResponse {
    pub unreturned_books: u64,
}

#[derive(Debug, Serialize)]
pub struct StatisticsBucketResponse {
    pub time: String,
    pub borrow_count: i64,
}

impl From<BorrowCountBucket> for StatisticsBucketResponse {
    fn from(bucket: BorrowCountBucket) -> Self {
        Self {
            time: bucket.label,
            borrow_count: bucket.borrow_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopBookResponse {
    pub book_id: Uuid,
    pub title: String,
    pub total_borrowed: i64,
}

impl From<TopBorrowedBook> for TopBookResponse {
    fn from(book: TopBorrowedBook) -> Self {
        Self {
            book_id: book.book_id.value(),
            title: book.title,
            total_borrowed: book.total_borrowed,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// エラーの詳細（クォータ違反1件につき1件）
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl From<&QuotaViolation> for ErrorDetail {
    fn from(violation: &QuotaViolation) -> Self {
        let code = match violation {
            QuotaViolation::EmptySelection => "EMPTY_SELECTION",
            QuotaViolation::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            QuotaViolation::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
        };
        Self {
            code,
            message: violation.to_string(),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }
}
