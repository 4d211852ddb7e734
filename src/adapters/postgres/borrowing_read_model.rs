use crate::domain::{
    borrowing::BorrowingStatus,
    value_objects::{BookId, BorrowingId, CardNumber, EmployeeId, LineItemId},
};
use crate::ports::borrowing_read_model::{
    BorrowingListQuery, BorrowingPage, BorrowingReadModel as BorrowingReadModelTrait,
    BorrowingView, LineItemView, Result,
};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

fn invalid_data(message: String) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

/// PostgreSQLの行データを明細ビューに変換する
fn map_row_to_line_item_view(row: &PgRow) -> Result<LineItemView> {
    let quantity_i64: i64 = row.get("quantity");
    let quantity: u32 = quantity_i64
        .try_into()
        .map_err(|_| invalid_data(format!("quantity out of range: {}", quantity_i64)))?;

    Ok(LineItemView {
        line_item_id: LineItemId::from_uuid(row.get("line_item_id")),
        book_id: BookId::from_uuid(row.get("book_id")),
        book_title: row.get("book_title"),
        quantity,
        return_date: row.get("return_date"),
    })
}

/// PostgreSQLの行データを貸出記録ビューに変換する（明細は別途付与）
///
/// statusの文字列とカード番号の変換でエラーハンドリングを行う。
fn map_row_to_borrowing_view(row: &PgRow, line_items: Vec<LineItemView>) -> Result<BorrowingView> {
    let status_str: &str = row.get("status");
    let status = BorrowingStatus::from_str(status_str).map_err(invalid_data)?;

    let card_number_str: String = row.get("card_number");
    let card_number = CardNumber::new(card_number_str)?;

    Ok(BorrowingView {
        borrowing_id: BorrowingId::from_uuid(row.get("borrowing_id")),
        card_number,
        employee_id: EmployeeId::from_uuid(row.get("employee_id")),
        borrow_date: row.get("borrow_date"),
        status,
        is_returned: row.get("is_returned"),
        line_items,
        closed_at: row.get("closed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// LIKE検索用にワイルドカード文字をエスケープする
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// BorrowingReadModelのPostgreSQL実装
///
/// CQRSパターンの読み取り側として、クエリに最適化された
/// 非正規化ビューを提供する。貸出記録と明細は別テーブルに保存する。
pub struct BorrowingReadModel {
    pool: PgPool,
}

impl BorrowingReadModel {
    /// PostgreSQLコネクションプールから新しいBorrowingReadModelを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 複数の貸出記録の明細をまとめて取得する
    async fn load_line_items(
        &self,
        borrowing_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<LineItemView>>> {
        let rows = sqlx::query(
            r#"
            SELECT
                borrowing_id,
                line_item_id,
                book_id,
                book_title,
                quantity,
                return_date
            FROM borrowing_line_items_view
            WHERE borrowing_id = ANY($1)
            ORDER BY borrowing_id, position ASC
            "#,
        )
        .bind(borrowing_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<LineItemView>> = HashMap::new();
        for row in &rows {
            let borrowing_id: Uuid = row.get("borrowing_id");
            grouped
                .entry(borrowing_id)
                .or_default()
                .push(map_row_to_line_item_view(row)?);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl BorrowingReadModelTrait for BorrowingReadModel {
    /// 貸出記録ビューをRead Modelに保存（upsert）
    ///
    /// 貸出記録と明細を1トランザクションで保存する。
    /// INSERT ... ON CONFLICT UPDATEで冪等性を保証する。
    async fn save(&self, view: BorrowingView) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO borrowings_view (
                borrowing_id,
                card_number,
                employee_id,
                borrow_date,
                status,
                is_returned,
                closed_at,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (borrowing_id)
            DO UPDATE SET
                status = EXCLUDED.status,
                is_returned = EXCLUDED.is_returned,
                closed_at = EXCLUDED.closed_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(view.borrowing_id.value())
        .bind(view.card_number.as_str())
        .bind(view.employee_id.value())
        .bind(view.borrow_date)
        .bind(view.status.as_str())
        .bind(view.is_returned)
        .bind(view.closed_at)
        .bind(view.created_at)
        .bind(view.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut positions = Vec::with_capacity(view.line_items.len());
        let mut line_item_ids = Vec::with_capacity(view.line_items.len());
        let mut book_ids = Vec::with_capacity(view.line_items.len());
        let mut book_titles = Vec::with_capacity(view.line_items.len());
        let mut quantities = Vec::with_capacity(view.line_items.len());
        let mut return_dates = Vec::with_capacity(view.line_items.len());

        for (i, item) in view.line_items.iter().enumerate() {
            positions.push(i32::try_from(i)?);
            line_item_ids.push(item.line_item_id.value());
            book_ids.push(item.book_id.value());
            book_titles.push(item.book_title.clone());
            quantities.push(i64::from(item.quantity));
            return_dates.push(item.return_date);
        }

        sqlx::query(
            r#"
            INSERT INTO borrowing_line_items_view (
                borrowing_id,
                position,
                line_item_id,
                book_id,
                book_title,
                quantity,
                return_date
            )
            SELECT $1, * FROM UNNEST($2::int[], $3::uuid[], $4::uuid[], $5::text[], $6::bigint[], $7::timestamptz[])
            ON CONFLICT (line_item_id)
            DO UPDATE SET return_date = EXCLUDED.return_date
            "#,
        )
        .bind(view.borrowing_id.value())
        .bind(&positions)
        .bind(&line_item_ids)
        .bind(&book_ids)
        .bind(&book_titles)
        .bind(&quantities)
        .bind(&return_dates)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// IDで貸出記録を取得
    async fn get_by_id(&self, borrowing_id: BorrowingId) -> Result<Option<BorrowingView>> {
        let row = sqlx::query(
            r#"
            SELECT
                borrowing_id,
                card_number,
                employee_id,
                borrow_date,
                status,
                is_returned,
                closed_at,
                created_at,
                updated_at
            FROM borrowings_view
            WHERE borrowing_id = $1
            "#,
        )
        .bind(borrowing_id.value())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut line_items = self.load_line_items(&[borrowing_id.value()]).await?;
        let items = line_items.remove(&borrowing_id.value()).unwrap_or_default();
        map_row_to_borrowing_view(&row, items).map(Some)
    }

    /// 貸出記録の一覧を取得
    ///
    /// 返却状況とカード番号（部分一致、大文字小文字を区別しない）で絞り込み、
    /// 貸出日の新しい順に1ページ分を返す。
    async fn list(&self, query: BorrowingListQuery) -> Result<BorrowingPage> {
        let query = query.normalized();
        let card_pattern = query
            .card_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM borrowings_view
            WHERE ($1::boolean IS NULL OR is_returned = $1)
              AND ($2::text IS NULL OR card_number ILIKE $2)
            "#,
        )
        .bind(query.is_returned)
        .bind(&card_pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT
                borrowing_id,
                card_number,
                employee_id,
                borrow_date,
                status,
                is_returned,
                closed_at,
                created_at,
                updated_at
            FROM borrowings_view
            WHERE ($1::boolean IS NULL OR is_returned = $1)
              AND ($2::text IS NULL OR card_number ILIKE $2)
            ORDER BY borrow_date DESC, borrowing_id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.is_returned)
        .bind(&card_pattern)
        .bind(i64::from(query.page_size))
        .bind(i64::try_from(query.offset())?)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.get("borrowing_id")).collect();
        let mut line_items = self.load_line_items(&ids).await?;

        let rows = rows
            .iter()
            .map(|row| {
                let borrowing_id: Uuid = row.get("borrowing_id");
                let items = line_items.remove(&borrowing_id).unwrap_or_default();
                map_row_to_borrowing_view(row, items)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BorrowingPage {
            count: u64::try_from(count)?,
            rows,
        })
    }

    /// 未返却の明細の数量の合計
    async fn count_unreturned_books(&self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM borrowing_line_items_view
            WHERE return_date IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(total)?)
    }
}
