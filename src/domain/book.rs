use serde::{Deserialize, Serialize};

use super::BookId;

/// 書籍
///
/// カタログ管理コンテキストが所有するエンティティ。
/// 在庫数は符号なし整数で保持し、負の在庫は型として表現できない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub available_quantity: u32,
}
