use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, BorrowingId, CardNumber, EmployeeId, LineItemId, Quantity};

/// 貸出作成時点の明細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowedLineItem {
    pub line_item_id: LineItemId,
    pub book_id: BookId,
    pub book_title: String,
    pub quantity: Quantity,
}

/// イベント：貸出記録が作成された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowingCreated {
    pub borrowing_id: BorrowingId,
    pub card_number: CardNumber,
    pub employee_id: EmployeeId,
    pub borrow_date: DateTime<Utc>,
    pub line_items: Vec<BorrowedLineItem>,
}

/// イベント：明細が返却された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemReturned {
    pub borrowing_id: BorrowingId,
    pub line_item_id: LineItemId,
    pub book_id: BookId,
    pub quantity: Quantity,
    pub returned_at: DateTime<Utc>,
}

/// イベント：すべての明細が返却され、貸出記録が完了した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowingClosed {
    pub borrowing_id: BorrowingId,
    pub closed_at: DateTime<Utc>,
}

/// ドメインイベント統合型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    BorrowingCreated(BorrowingCreated),
    LineItemReturned(LineItemReturned),
    BorrowingClosed(BorrowingClosed),
}

impl DomainEvent {
    /// イベントが属する集約のID
    pub fn borrowing_id(&self) -> BorrowingId {
        match self {
            DomainEvent::BorrowingCreated(e) => e.borrowing_id,
            DomainEvent::LineItemReturned(e) => e.borrowing_id,
            DomainEvent::BorrowingClosed(e) => e.borrowing_id,
        }
    }

    /// イベント種別名（永続化時の識別子）
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::BorrowingCreated(_) => "BorrowingCreated",
            DomainEvent::LineItemReturned(_) => "LineItemReturned",
            DomainEvent::BorrowingClosed(_) => "BorrowingClosed",
        }
    }

    /// イベントの発生時刻
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::BorrowingCreated(e) => e.borrow_date,
            DomainEvent::LineItemReturned(e) => e.returned_at,
            DomainEvent::BorrowingClosed(e) => e.closed_at,
        }
    }
}
