use thiserror::Error;

use super::{BookId, BorrowingId, LineItemId};

/// 貸出可否判定（クォータ評価）の違反
///
/// 1回の評価ですべての違反を収集し、呼び出し側がまとめて表示できるようにする。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaViolation {
    /// 書籍が1冊も選択されていない
    #[error("At least one book must be selected")]
    EmptySelection,

    /// 書籍の在庫が不足している
    #[error("Book {book_id}: requested {requested} copies but only {available} available")]
    InsufficientStock {
        book_id: BookId,
        requested: u64,
        available: u32,
    },

    /// 貸出数量の合計がカードの上限を超えている
    #[error("Cannot borrow {requested} books, the card allows at most {allowed}")]
    QuotaExceeded { requested: u64, allowed: u32 },
}

/// 貸出記録作成のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateBorrowingError {
    /// 図書カードがロックされている
    #[error("Library card is locked")]
    CardLocked,

    /// 図書カードの有効期限が切れている
    #[error("Library card has expired")]
    CardExpired,

    /// 選択内容がクォータ評価で拒否された
    #[error("Selection rejected: {}", format_violations(.0))]
    Rejected(Vec<QuotaViolation>),
}

/// 返却のエラー
///
/// 構造的なエラー（プログラミングエラーまたは競合）のため、1回の呼び出しにつき1件のみ返す。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReturnError {
    /// 明細が貸出記録に存在しない
    #[error("Line item {0} not found in borrowing")]
    LineItemNotFound(LineItemId),

    /// 明細は既に返却済み
    #[error("Line item {0} has already been returned")]
    AlreadyReturned(LineItemId),

    /// 貸出記録は既にすべて返却済み（Closed）
    #[error("Borrowing {0} is already closed")]
    BorrowingClosed(BorrowingId),
}

/// イベント列から貸出記録を復元できない
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    /// 最初のイベントがBorrowingCreatedではない
    #[error("Event stream for borrowing does not start with BorrowingCreated")]
    MissingCreation,

    /// 既存の貸出記録にBorrowingCreatedが再度現れた
    #[error("Borrowing {0} was created twice")]
    DuplicateCreation(BorrowingId),

    /// 別の集約のイベントが混入している
    #[error("Event for borrowing {found} found in stream of borrowing {expected}")]
    ForeignEvent {
        expected: BorrowingId,
        found: BorrowingId,
    },

    /// イベントを現在の状態に適用できない
    #[error("Invalid transition for borrowing {borrowing_id}: {reason}")]
    InvalidTransition {
        borrowing_id: BorrowingId,
        reason: String,
    },
}

fn format_violations(violations: &[QuotaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
