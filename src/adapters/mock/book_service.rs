use crate::domain::{Book, value_objects::BookId};
use crate::ports::book_service::{BookService as BookServiceTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// BookServiceのモック実装
///
/// 書籍をメモリに保持する。書籍カタログAPIが設定されていない場合や
/// テストで使用する。在庫数は登録時の値から変化しない。
pub struct BookService {
    books: Mutex<HashMap<BookId, Book>>,
}

impl BookService {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
        }
    }

    /// 書籍を登録する（同じIDがあれば置き換える）
    pub fn add_book(&self, book: Book) {
        self.books
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(book.book_id, book);
    }
}

impl Default for BookService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookServiceTrait for BookService {
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let books = self.books.lock().map_err(|e| e.to_string())?;
        Ok(books.get(&book_id).cloned())
    }
}
