use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Book, BookId, BookSelection, BorrowedLineItem, BorrowingClosed, BorrowingCreated,
    BorrowingId, CardNumber, CreateBorrowingError, DomainEvent, EmployeeId, LibraryCard,
    LineItemId, LineItemReturned, Quantity, QuotaViolation, ReplayError, ReturnError,
    evaluate_selection, merge_selections,
};

/// 貸出記録の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowingStatus {
    /// 未返却の明細が1件以上ある
    Open,
    /// すべての明細が返却済み（終端状態）
    Closed,
}

impl BorrowingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowingStatus::Open => "open",
            BorrowingStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for BorrowingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(BorrowingStatus::Open),
            "closed" => Ok(BorrowingStatus::Closed),
            _ => Err(format!("Invalid borrowing status: {}", s)),
        }
    }
}

/// 貸出明細 - 1冊の書籍とその数量
///
/// 作成後に変化するのは返却日のみで、変化は1回だけ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingLineItem {
    pub line_item_id: LineItemId,
    pub book_id: BookId,
    pub book_title: String,
    pub quantity: Quantity,
    pub return_date: Option<DateTime<Utc>>,
}

impl BorrowingLineItem {
    pub fn is_returned(&self) -> bool {
        self.return_date.is_some()
    }
}

// ============================================================================
// 型安全な状態パターン
// ============================================================================

/// 貸出記録の共通フィールド
///
/// 明細は貸出記録が排他的に所有する。外部から明細を書き換えられないよう、
/// 明細の一覧は読み取り専用のアクセサ経由でのみ公開する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingCore {
    // 識別子
    pub borrowing_id: BorrowingId,

    // 他の集約への参照
    pub card_number: CardNumber,
    pub employee_id: EmployeeId,

    pub borrow_date: DateTime<Utc>,
    line_items: Vec<BorrowingLineItem>,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BorrowingCore {
    /// 明細（作成時の順序）
    pub fn line_items(&self) -> &[BorrowingLineItem] {
        &self.line_items
    }

    pub fn line_item(&self, line_item_id: LineItemId) -> Option<&BorrowingLineItem> {
        self.line_items
            .iter()
            .find(|item| item.line_item_id == line_item_id)
    }

    /// 未返却の明細
    pub fn outstanding_items(&self) -> impl Iterator<Item = &BorrowingLineItem> {
        self.line_items.iter().filter(|item| !item.is_returned())
    }

    /// 数量の合計
    pub fn total_quantity(&self) -> u64 {
        self.line_items
            .iter()
            .map(|item| u64::from(item.quantity.value()))
            .sum()
    }

    fn all_returned(&self) -> bool {
        self.line_items.iter().all(BorrowingLineItem::is_returned)
    }
}

/// 貸出中状態
///
/// 不変条件：未返却の明細が1件以上ある
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBorrowing {
    core: BorrowingCore,
}

impl std::ops::Deref for OpenBorrowing {
    type Target = BorrowingCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 返却完了状態
///
/// 不変条件：すべての明細に返却日がある。
/// 最後の明細を返却する遷移でのみ生成される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedBorrowing {
    core: BorrowingCore,
    pub closed_at: DateTime<Utc>,
}

impl std::ops::Deref for ClosedBorrowing {
    type Target = BorrowingCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// Borrowing集約の統合型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Borrowing {
    Open(OpenBorrowing),
    Closed(ClosedBorrowing),
}

impl Borrowing {
    pub fn core(&self) -> &BorrowingCore {
        match self {
            Borrowing::Open(open) => &open.core,
            Borrowing::Closed(closed) => &closed.core,
        }
    }

    pub fn borrowing_id(&self) -> BorrowingId {
        self.core().borrowing_id
    }

    pub fn status(&self) -> BorrowingStatus {
        match self {
            Borrowing::Open(_) => BorrowingStatus::Open,
            Borrowing::Closed(_) => BorrowingStatus::Closed,
        }
    }

    /// すべての明細が返却済みか
    ///
    /// 状態から導出される。Closedの場合に限りtrue。
    pub fn is_returned(&self) -> bool {
        matches!(self, Borrowing::Closed(_))
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Borrowing::Open(_) => None,
            Borrowing::Closed(closed) => Some(closed.closed_at),
        }
    }
}

impl From<OpenBorrowing> for Borrowing {
    fn from(open: OpenBorrowing) -> Self {
        Borrowing::Open(open)
    }
}

impl From<ClosedBorrowing> for Borrowing {
    fn from(closed: ClosedBorrowing) -> Self {
        Borrowing::Closed(closed)
    }
}

// ============================================================================
// 純粋関数
// ============================================================================

/// 純粋関数：貸出記録を作成する
///
/// ビジネスルール：
/// - ロックされた図書カードでは貸出不可
/// - 有効期限切れの図書カードでは貸出不可（貸出日が有効期限日より後）
/// - 同じ書籍の選択は1明細にまとめる
/// - クォータ評価（在庫・貸出上限・空選択）をすべて満たすこと
///
/// `books`は選択された書籍の現在の在庫とタイトルを保持する。
///
/// 副作用なし。新しいOpenBorrowingとイベントを返す。
pub fn create_borrowing(
    card: &LibraryCard,
    employee_id: EmployeeId,
    borrow_date: DateTime<Utc>,
    selections: &[BookSelection],
    books: &HashMap<BookId, Book>,
) -> Result<(OpenBorrowing, BorrowingCreated), CreateBorrowingError> {
    if card.is_locked {
        return Err(CreateBorrowingError::CardLocked);
    }

    if card.is_expired_on(borrow_date.date_naive()) {
        return Err(CreateBorrowingError::CardExpired);
    }

    let stock: HashMap<BookId, u32> = books
        .values()
        .map(|book| (book.book_id, book.available_quantity))
        .collect();

    // 合算前の選択で評価する（合算はu64で行われる）
    evaluate_selection(card.max_books_allowed, selections, &stock)
        .map_err(CreateBorrowingError::Rejected)?;

    let selections = merge_selections(selections).ok_or_else(|| {
        let requested = selections
            .iter()
            .map(|selection| u64::from(selection.quantity.value()))
            .sum();
        CreateBorrowingError::Rejected(vec![QuotaViolation::QuotaExceeded {
            requested,
            allowed: card.max_books_allowed.value(),
        }])
    })?;

    let borrowing_id = BorrowingId::new();
    let line_items: Vec<BorrowingLineItem> = selections
        .iter()
        .map(|selection| BorrowingLineItem {
            line_item_id: LineItemId::new(),
            book_id: selection.book_id,
            book_title: books
                .get(&selection.book_id)
                .map(|book| book.title.clone())
                .unwrap_or_default(),
            quantity: selection.quantity,
            return_date: None,
        })
        .collect();

    let event = BorrowingCreated {
        borrowing_id,
        card_number: card.card_number.clone(),
        employee_id,
        borrow_date,
        line_items: line_items
            .iter()
            .map(|item| BorrowedLineItem {
                line_item_id: item.line_item_id,
                book_id: item.book_id,
                book_title: item.book_title.clone(),
                quantity: item.quantity,
            })
            .collect(),
    };

    let borrowing = OpenBorrowing {
        core: BorrowingCore {
            borrowing_id,
            card_number: card.card_number.clone(),
            employee_id,
            borrow_date,
            line_items,
            created_at: borrow_date,
            updated_at: borrow_date,
        },
    };

    Ok((borrowing, event))
}

/// 純粋関数：明細を1件返却する
///
/// ビジネスルール：
/// - 明細が貸出記録に存在すること（LineItemNotFound）
/// - 明細が未返却であること（AlreadyReturned）
/// - 返却後に全明細が返却済みになった場合、同じ操作の中でClosedへ遷移する
///
/// 副作用なし。新しい状態と、永続化すべきイベント
/// （LineItemReturned、最後の明細ならBorrowingClosedも）を返す。
/// イベントはまとめて1回の追記で保存すること。
pub fn return_line_item(
    borrowing: Borrowing,
    line_item_id: LineItemId,
    returned_at: DateTime<Utc>,
) -> Result<(Borrowing, Vec<DomainEvent>), ReturnError> {
    let mut core = match borrowing {
        Borrowing::Open(open) => open.core,
        Borrowing::Closed(closed) => {
            // Closedの明細はすべて返却済み
            return Err(match closed.line_item(line_item_id) {
                Some(_) => ReturnError::AlreadyReturned(line_item_id),
                None => ReturnError::LineItemNotFound(line_item_id),
            });
        }
    };

    let event = mark_returned(&mut core, line_item_id, returned_at)?;
    let mut events = vec![DomainEvent::LineItemReturned(event)];

    let borrowing = settle(core, returned_at);
    if let Borrowing::Closed(closed) = &borrowing {
        events.push(DomainEvent::BorrowingClosed(BorrowingClosed {
            borrowing_id: closed.borrowing_id,
            closed_at: closed.closed_at,
        }));
    }

    Ok((borrowing, events))
}

/// 純粋関数：未返却の明細をすべて返却する
///
/// ビジネスルール：
/// - Closedの貸出記録には適用できない（BorrowingClosed）
/// - 未返却の明細を保存順に返却し、Closedへ遷移する
///
/// 同じ返却日で`return_line_item`を未返却の明細ごとに呼んだ場合と
/// 同じ最終状態になる（順序に依存しない）。
pub fn return_all(
    borrowing: Borrowing,
    returned_at: DateTime<Utc>,
) -> Result<(ClosedBorrowing, Vec<DomainEvent>), ReturnError> {
    let mut core = match borrowing {
        Borrowing::Open(open) => open.core,
        Borrowing::Closed(closed) => {
            return Err(ReturnError::BorrowingClosed(closed.borrowing_id));
        }
    };

    let outstanding: Vec<LineItemId> = core
        .outstanding_items()
        .map(|item| item.line_item_id)
        .collect();

    let mut events = Vec::with_capacity(outstanding.len() + 1);
    for line_item_id in outstanding {
        let event = mark_returned(&mut core, line_item_id, returned_at)?;
        events.push(DomainEvent::LineItemReturned(event));
    }

    let closed = ClosedBorrowing {
        core,
        closed_at: returned_at,
    };
    events.push(DomainEvent::BorrowingClosed(BorrowingClosed {
        borrowing_id: closed.borrowing_id,
        closed_at: closed.closed_at,
    }));

    Ok((closed, events))
}

/// 明細に返却日を設定する
fn mark_returned(
    core: &mut BorrowingCore,
    line_item_id: LineItemId,
    returned_at: DateTime<Utc>,
) -> Result<LineItemReturned, ReturnError> {
    let item = core
        .line_items
        .iter_mut()
        .find(|item| item.line_item_id == line_item_id)
        .ok_or(ReturnError::LineItemNotFound(line_item_id))?;

    if item.is_returned() {
        return Err(ReturnError::AlreadyReturned(line_item_id));
    }

    item.return_date = Some(returned_at);
    core.updated_at = returned_at;

    Ok(LineItemReturned {
        borrowing_id: core.borrowing_id,
        line_item_id,
        book_id: item.book_id,
        quantity: item.quantity,
        returned_at,
    })
}

/// 明細の返却状況から状態を再計算する
fn settle(core: BorrowingCore, at: DateTime<Utc>) -> Borrowing {
    if core.all_returned() {
        Borrowing::Closed(ClosedBorrowing {
            core,
            closed_at: at,
        })
    } else {
        Borrowing::Open(OpenBorrowing { core })
    }
}

/// イベントを適用して新しい状態を生成する純粋関数
///
/// イベントソーシングのfoldパターンで使用される。
/// 不正な遷移はpanicせずReplayErrorとして返す。
pub fn apply_event(
    borrowing: Option<Borrowing>,
    event: &DomainEvent,
) -> Result<Borrowing, ReplayError> {
    let borrowing = match (borrowing, event) {
        // BorrowingCreated: 初期状態（None）からのみ受け入れる
        (None, DomainEvent::BorrowingCreated(e)) => {
            if e.line_items.is_empty() {
                return Err(ReplayError::InvalidTransition {
                    borrowing_id: e.borrowing_id,
                    reason: "borrowing created without line items".to_string(),
                });
            }
            let line_items = e
                .line_items
                .iter()
                .map(|item| BorrowingLineItem {
                    line_item_id: item.line_item_id,
                    book_id: item.book_id,
                    book_title: item.book_title.clone(),
                    quantity: item.quantity,
                    return_date: None,
                })
                .collect();
            return Ok(Borrowing::Open(OpenBorrowing {
                core: BorrowingCore {
                    borrowing_id: e.borrowing_id,
                    card_number: e.card_number.clone(),
                    employee_id: e.employee_id,
                    borrow_date: e.borrow_date,
                    line_items,
                    created_at: e.borrow_date,
                    updated_at: e.borrow_date,
                },
            }));
        }
        (None, _) => return Err(ReplayError::MissingCreation),
        (Some(borrowing), DomainEvent::BorrowingCreated(_)) => {
            return Err(ReplayError::DuplicateCreation(borrowing.borrowing_id()));
        }
        (Some(borrowing), _) => borrowing,
    };

    let borrowing_id = borrowing.borrowing_id();
    if event.borrowing_id() != borrowing_id {
        return Err(ReplayError::ForeignEvent {
            expected: borrowing_id,
            found: event.borrowing_id(),
        });
    }

    let invalid = |reason: String| ReplayError::InvalidTransition {
        borrowing_id,
        reason,
    };

    match (borrowing, event) {
        // LineItemReturned: Open状態からのみ可能。最後の明細ならClosedへ
        (Borrowing::Open(open), DomainEvent::LineItemReturned(e)) => {
            let mut core = open.core;
            mark_returned(&mut core, e.line_item_id, e.returned_at)
                .map_err(|err| invalid(err.to_string()))?;
            Ok(settle(core, e.returned_at))
        }
        (Borrowing::Closed(_), DomainEvent::LineItemReturned(e)) => Err(invalid(format!(
            "line item {} returned after borrowing was closed",
            e.line_item_id
        ))),

        // BorrowingClosed: 全明細が返却済み（Closed）の場合のみ有効
        (Borrowing::Closed(closed), DomainEvent::BorrowingClosed(e)) => {
            Ok(Borrowing::Closed(ClosedBorrowing {
                closed_at: e.closed_at,
                ..closed
            }))
        }
        (Borrowing::Open(_), DomainEvent::BorrowingClosed(_)) => Err(invalid(
            "borrowing closed while line items are outstanding".to_string(),
        )),

        // 上で処理済み
        (borrowing, DomainEvent::BorrowingCreated(_)) => {
            Err(ReplayError::DuplicateCreation(borrowing.borrowing_id()))
        }
    }
}

/// イベント列から現在の状態を復元する純粋関数
///
/// # 戻り値
/// * イベントが空の場合は`Ok(None)`
/// * それ以外は復元されたBorrowingを`Ok(Some)`で返す
pub fn replay_events(events: &[DomainEvent]) -> Result<Option<Borrowing>, ReplayError> {
    events.iter().try_fold(None, |borrowing, event| {
        apply_event(borrowing, event).map(Some)
    })
}
