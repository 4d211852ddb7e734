use crate::domain::{
    borrowing::BorrowingStatus,
    value_objects::{BookId, BorrowingId, CardNumber, EmployeeId, LineItemId},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 一覧取得の1ページあたりの既定件数
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// 一覧取得の1ページあたりの最大件数
pub const MAX_PAGE_SIZE: u32 = 100;

/// 貸出明細ビュー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemView {
    pub line_item_id: LineItemId,
    pub book_id: BookId,
    pub book_title: String,
    pub quantity: u32,
    pub return_date: Option<DateTime<Utc>>,
}

/// 貸出記録ビュー（Read Model）
///
/// クエリに最適化された非正規化ビュー（CQRSパターン）。
/// 集約の完全な状態を反映し、部分更新は行わない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingView {
    pub borrowing_id: BorrowingId,
    pub card_number: CardNumber,
    pub employee_id: EmployeeId,
    pub borrow_date: DateTime<Utc>,
    pub status: BorrowingStatus,
    pub is_returned: bool,
    pub line_items: Vec<LineItemView>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 貸出記録一覧の検索条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BorrowingListQuery {
    /// 返却状況でフィルタリング
    pub is_returned: Option<bool>,
    /// カード番号の部分一致（大文字小文字を区別しない）
    pub card_number: Option<String>,
    /// 1始まりのページ番号
    pub page: u32,
    pub page_size: u32,
}

impl BorrowingListQuery {
    /// ページ番号とページサイズを有効範囲に丸める
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.page_size = match self.page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// 貸出記録一覧の1ページ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingPage {
    /// 条件に一致する総件数
    pub count: u64,
    /// 貸出日の新しい順
    pub rows: Vec<BorrowingView>,
}

/// 貸出記録Read Modelポート
#[async_trait]
pub trait BorrowingReadModel: Send + Sync {
    /// 貸出記録の現在状態をRead Modelに保存
    ///
    /// 新規の場合はINSERT、既存の場合はUPDATE（upsert）を実行する。
    /// 明細も含めて1つのトランザクションで保存する。
    async fn save(&self, view: BorrowingView) -> Result<()>;

    /// IDで貸出記録を取得する
    async fn get_by_id(&self, borrowing_id: BorrowingId) -> Result<Option<BorrowingView>>;

    /// 条件に一致する貸出記録を貸出日の新しい順に取得する
    async fn list(&self, query: BorrowingListQuery) -> Result<BorrowingPage>;

    /// 未返却の冊数（未返却明細の数量の合計）
    async fn count_unreturned_books(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_normalizes_page_and_size() {
        let query = BorrowingListQuery {
            page: 0,
            page_size: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);

        let query = BorrowingListQuery {
            page: 3,
            page_size: 500,
            ..Default::default()
        }
        .normalized();
        assert_eq!(query.page_size, MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 200);
    }
}
