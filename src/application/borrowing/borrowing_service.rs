use crate::domain::{
    self,
    borrowing::{Borrowing, BorrowingCore},
    commands::*,
    value_objects::*,
    Book, DomainEvent, ReturnError,
};
use crate::ports::*;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;

use super::errors::{BorrowingApplicationError, Result};

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub event_store: Arc<dyn EventStore>,
    pub borrowing_read_model: Arc<dyn BorrowingReadModel>,
    pub card_service: Arc<dyn LibraryCardService>,
    pub book_service: Arc<dyn BookService>,
    pub statistics_source: Arc<dyn StatisticsSource>,
}

/// イベントストアから貸出記録を復元するヘルパー関数
///
/// # 戻り値
/// 復元された貸出記録と、追記時に期待すべきバージョン（イベント数）
///
/// # エラー
/// - EventStoreError: イベント読み込み失敗
/// - BorrowingNotFound: イベントが存在しない
/// - CorruptedHistory: イベント列が不正で復元できない
async fn load_borrowing(
    event_store: &Arc<dyn EventStore>,
    borrowing_id: BorrowingId,
) -> Result<(Borrowing, usize)> {
    let events = event_store
        .load(borrowing_id)
        .await
        .map_err(BorrowingApplicationError::EventStoreError)?;

    let borrowing = domain::borrowing::replay_events(&events)
        .map_err(|source| BorrowingApplicationError::CorruptedHistory {
            borrowing_id,
            source,
        })?
        .ok_or(BorrowingApplicationError::BorrowingNotFound(borrowing_id))?;

    Ok((borrowing, events.len()))
}

/// 選択された書籍をまとめて取得する
///
/// 同じ書籍は1回だけ問い合わせ、問い合わせは並行に行う。
/// 1冊でも存在しなければBookNotFound。
async fn load_books(
    book_service: &Arc<dyn BookService>,
    selections: &[domain::BookSelection],
) -> Result<HashMap<BookId, Book>> {
    let mut book_ids: Vec<BookId> = Vec::with_capacity(selections.len());
    for selection in selections {
        if !book_ids.contains(&selection.book_id) {
            book_ids.push(selection.book_id);
        }
    }

    let lookups = book_ids.into_iter().map(|book_id| {
        async move {
            book_service
                .get_book(book_id)
                .await
                .map_err(BorrowingApplicationError::BookServiceError)?
                .ok_or(BorrowingApplicationError::BookNotFound(book_id))
        }
    });

    let books = try_join_all(lookups).await?;
    Ok(books.into_iter().map(|book| (book.book_id, book)).collect())
}

/// 貸出記録からRead Model用のビューを構築するヘルパー関数
///
/// 集約の完全な状態をビューに変換する（部分更新はしない）。
fn build_borrowing_view(borrowing: &Borrowing) -> BorrowingView {
    let core: &BorrowingCore = borrowing.core();
    BorrowingView {
        borrowing_id: core.borrowing_id,
        card_number: core.card_number.clone(),
        employee_id: core.employee_id,
        borrow_date: core.borrow_date,
        status: borrowing.status(),
        is_returned: borrowing.is_returned(),
        line_items: core
            .line_items()
            .iter()
            .map(|item| LineItemView {
                line_item_id: item.line_item_id,
                book_id: item.book_id,
                book_title: item.book_title.clone(),
                quantity: item.quantity.value(),
                return_date: item.return_date,
            })
            .collect(),
        closed_at: borrowing.closed_at(),
        created_at: core.created_at,
        updated_at: core.updated_at,
    }
}

/// 返却イベントを追記する
///
/// 追記がバージョン競合で拒否された場合は最新の状態を読み直し、
/// 同じ操作を`reevaluate`で再評価する。
/// - 再評価でエラーになる（既に返却済みなど）→ そのエラーを返す
/// - 再評価でも有効 → ConcurrentModification
async fn append_return_events<F>(
    deps: &ServiceDependencies,
    borrowing_id: BorrowingId,
    expected_version: usize,
    events: Vec<DomainEvent>,
    reevaluate: F,
) -> Result<()>
where
    F: FnOnce(Borrowing) -> std::result::Result<(), ReturnError>,
{
    match deps
        .event_store
        .append(borrowing_id, expected_version, events)
        .await
    {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<VersionConflict>().is_some() => {
            tracing::warn!(
                %borrowing_id,
                expected_version,
                "Concurrent update detected, re-evaluating against latest state"
            );
            let (latest, _) = load_borrowing(&deps.event_store, borrowing_id).await?;
            reevaluate(latest)?;
            Err(BorrowingApplicationError::ConcurrentModification(
                borrowing_id,
            ))
        }
        Err(err) => Err(BorrowingApplicationError::EventStoreError(err)),
    }
}

/// Read Modelを更新する（完全な状態を保存）
async fn save_view(deps: &ServiceDependencies, borrowing: &Borrowing) -> Result<BorrowingView> {
    let view = build_borrowing_view(borrowing);
    deps.borrowing_read_model
        .save(view.clone())
        .await
        .map_err(BorrowingApplicationError::ReadModelError)?;
    Ok(view)
}

/// 書籍を貸し出す（貸出記録を作成する）
///
/// ビジネスルール：
/// - 図書カードが存在すること
/// - 選択された書籍がすべて存在すること
/// - 図書カードがロックされておらず、有効期限内であること
/// - クォータ評価（在庫・貸出上限・空選択）をすべて満たすこと
///
/// 在庫の増減はこのサービスの責務ではない（在庫は外部で管理される）。
///
/// # 一貫性保証
///
/// EventStore（書き込み）とReadModel（読み取り）は独立して更新される。
/// ReadModel更新がEventStore保存後に失敗した場合、一時的に不整合が発生する。
///
/// # 戻り値
/// 作成された貸出記録のビュー
pub async fn create_borrowing(
    deps: &ServiceDependencies,
    cmd: CreateBorrowing,
) -> Result<BorrowingView> {
    // 1. 図書カードの取得
    let card = deps
        .card_service
        .get_card(&cmd.card_number)
        .await
        .map_err(BorrowingApplicationError::CardServiceError)?
        .ok_or_else(|| BorrowingApplicationError::CardNotFound(cmd.card_number.clone()))?;

    // 2. 選択された書籍の在庫とタイトルを取得
    let books = load_books(&deps.book_service, &cmd.selections).await?;

    // 3. ドメイン層の純粋関数を呼び出し（同じ書籍の選択は評価後にまとめられる）
    let (borrowing, event) = domain::borrowing::create_borrowing(
        &card,
        cmd.employee_id,
        cmd.borrow_date,
        &cmd.selections,
        &books,
    )
    .inspect_err(|err| {
        tracing::info!(card_number = %cmd.card_number, error = %err, "Borrowing rejected");
    })?;

    let borrowing_id = borrowing.borrowing_id;

    // 4. イベントストアに保存（新規なので期待バージョンは0）
    deps.event_store
        .append(borrowing_id, 0, vec![DomainEvent::BorrowingCreated(event)])
        .await
        .map_err(BorrowingApplicationError::EventStoreError)?;

    // 5. Read Modelを更新
    let view = save_view(deps, &Borrowing::Open(borrowing)).await?;

    tracing::info!(
        %borrowing_id,
        card_number = %view.card_number,
        line_items = view.line_items.len(),
        "Borrowing created"
    );

    Ok(view)
}

/// 明細を1件返却する
///
/// ビジネスルール：
/// - 貸出記録と明細が存在すること
/// - 明細が未返却であること
/// - 最後の明細の返却で貸出記録は返却完了になる（同じ追記で保存）
///
/// # 戻り値
/// 更新後の貸出記録のビュー
pub async fn return_line_item(
    deps: &ServiceDependencies,
    cmd: ReturnLineItem,
) -> Result<BorrowingView> {
    // 1. イベントストアから貸出記録を復元
    let (borrowing, version) = load_borrowing(&deps.event_store, cmd.borrowing_id).await?;

    // 2. ドメイン層の純粋関数を呼び出し
    let (borrowing, events) =
        domain::borrowing::return_line_item(borrowing, cmd.line_item_id, cmd.returned_at)?;

    // 3. イベントストアに保存（競合時は再評価）
    append_return_events(deps, cmd.borrowing_id, version, events, |latest| {
        domain::borrowing::return_line_item(latest, cmd.line_item_id, cmd.returned_at).map(|_| ())
    })
    .await?;

    // 4. Read Modelを更新
    let view = save_view(deps, &borrowing).await?;

    tracing::info!(
        borrowing_id = %cmd.borrowing_id,
        line_item_id = %cmd.line_item_id,
        status = view.status.as_str(),
        "Line item returned"
    );

    Ok(view)
}

/// 未返却の明細をすべて返却する
///
/// ビジネスルール：
/// - 貸出記録が存在し、返却完了になっていないこと
/// - 既に返却済みの明細の返却日は変更しない
///
/// # 戻り値
/// 返却完了した貸出記録のビュー
pub async fn return_all(deps: &ServiceDependencies, cmd: ReturnAll) -> Result<BorrowingView> {
    // 1. イベントストアから貸出記録を復元
    let (borrowing, version) = load_borrowing(&deps.event_store, cmd.borrowing_id).await?;

    // 2. ドメイン層の純粋関数を呼び出し
    let (closed, events) = domain::borrowing::return_all(borrowing, cmd.returned_at)?;

    // 3. イベントストアに保存（競合時は再評価）
    append_return_events(deps, cmd.borrowing_id, version, events, |latest| {
        domain::borrowing::return_all(latest, cmd.returned_at).map(|_| ())
    })
    .await?;

    // 4. Read Modelを更新
    let view = save_view(deps, &Borrowing::Closed(closed)).await?;

    tracing::info!(borrowing_id = %cmd.borrowing_id, "All line items returned");

    Ok(view)
}

/// 未返却の書籍の総数（数量の合計）
pub async fn count_unreturned_books(deps: &ServiceDependencies) -> Result<u64> {
    deps.borrowing_read_model
        .count_unreturned_books()
        .await
        .map_err(BorrowingApplicationError::ReadModelError)
}
