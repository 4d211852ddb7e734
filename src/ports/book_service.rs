use crate::domain::{book::Book, value_objects::BookId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 書籍サービスポート
///
/// 貸出コンテキストとカタログコンテキストの境界を維持する。
/// 在庫数はカタログ側が所有し、貸出コンテキストは読み取るだけ。
#[async_trait]
pub trait BookService: Send + Sync {
    /// 書籍を取得する
    ///
    /// 貸出可否の判定に現在の在庫数を使用する。存在しない場合は`None`を返す。
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;
}
