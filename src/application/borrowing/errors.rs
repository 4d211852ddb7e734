use thiserror::Error;

use crate::domain::{
    BookId, BorrowingId, CardNumber, CreateBorrowingError, LineItemId, QuotaViolation,
    ReplayError, ReturnError,
};

/// 貸出管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum BorrowingApplicationError {
    /// 図書カードが存在しない
    #[error("Library card {0} not found")]
    CardNotFound(CardNumber),

    /// 書籍が存在しない
    #[error("Book {0} not found")]
    BookNotFound(BookId),

    /// 貸出記録が存在しない
    #[error("Borrowing {0} not found")]
    BorrowingNotFound(BorrowingId),

    /// 図書カードがロックされている
    #[error("Library card is locked")]
    CardLocked,

    /// 図書カードの有効期限が切れている
    #[error("Library card has expired")]
    CardExpired,

    /// クォータ評価の違反（すべての違反をまとめて返す）
    #[error("Selection rejected ({} violation(s))", .0.len())]
    SelectionRejected(Vec<QuotaViolation>),

    /// 明細が貸出記録に存在しない
    #[error("Line item {0} not found in borrowing")]
    LineItemNotFound(LineItemId),

    /// 明細は既に返却済み
    #[error("Line item {0} has already been returned")]
    AlreadyReturned(LineItemId),

    /// 貸出記録は既に返却完了
    #[error("Borrowing {0} is already closed")]
    BorrowingClosed(BorrowingId),

    /// 他の操作と競合した（再評価しても要求自体は有効だった）
    #[error("Borrowing {0} was modified concurrently")]
    ConcurrentModification(BorrowingId),

    /// イベント列から貸出記録を復元できない
    #[error("Event history of borrowing {borrowing_id} is corrupted")]
    CorruptedHistory {
        borrowing_id: BorrowingId,
        #[source]
        source: ReplayError,
    },

    /// EventStoreのエラー
    #[error("Event store error")]
    EventStoreError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// ReadModelのエラー
    #[error("Read model error")]
    ReadModelError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// LibraryCardServiceのエラー
    #[error("Library card service error")]
    CardServiceError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// BookServiceのエラー
    #[error("Book service error")]
    BookServiceError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// StatisticsSourceのエラー
    #[error("Statistics source error")]
    StatisticsError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<CreateBorrowingError> for BorrowingApplicationError {
    fn from(err: CreateBorrowingError) -> Self {
        match err {
            CreateBorrowingError::CardLocked => BorrowingApplicationError::CardLocked,
            CreateBorrowingError::CardExpired => BorrowingApplicationError::CardExpired,
            CreateBorrowingError::Rejected(violations) => {
                BorrowingApplicationError::SelectionRejected(violations)
            }
        }
    }
}

impl From<ReturnError> for BorrowingApplicationError {
    fn from(err: ReturnError) -> Self {
        match err {
            ReturnError::LineItemNotFound(id) => BorrowingApplicationError::LineItemNotFound(id),
            ReturnError::AlreadyReturned(id) => BorrowingApplicationError::AlreadyReturned(id),
            ReturnError::BorrowingClosed(id) => BorrowingApplicationError::BorrowingClosed(id),
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, BorrowingApplicationError>;
