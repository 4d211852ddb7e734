use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookSelection, BorrowingId, CardNumber, EmployeeId, LineItemId};

/// コマンド：書籍を貸し出す（貸出記録を作成する）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBorrowing {
    pub card_number: CardNumber,
    pub employee_id: EmployeeId,
    pub borrow_date: DateTime<Utc>,
    pub selections: Vec<BookSelection>,
}

/// コマンド：明細を1件返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLineItem {
    pub borrowing_id: BorrowingId,
    pub line_item_id: LineItemId,
    pub returned_at: DateTime<Utc>,
}

/// コマンド：未返却の明細をすべて返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnAll {
    pub borrowing_id: BorrowingId,
    pub returned_at: DateTime<Utc>,
}
