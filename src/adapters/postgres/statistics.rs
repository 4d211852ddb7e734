use crate::domain::value_objects::BookId;
use crate::ports::statistics_source::{
    BorrowCountBucket, Result, StatisticsInterval, StatisticsSource as StatisticsSourceTrait,
    TopBorrowedBook,
};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

/// DATE_TRUNCの単位とTO_CHARの書式
fn bucket_format(interval: StatisticsInterval) -> (&'static str, &'static str) {
    match interval {
        StatisticsInterval::Week => ("week", r#"IYYY-"W"IW"#),
        StatisticsInterval::Month => ("month", "YYYY-MM"),
        StatisticsInterval::Year => ("year", "YYYY"),
    }
}

/// StatisticsSourceのPostgreSQL実装
///
/// Read Modelのテーブルを集計する。区間はUTCで切り捨てる。
pub struct StatisticsSource {
    pool: PgPool,
}

impl StatisticsSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatisticsSourceTrait for StatisticsSource {
    async fn get_statistics(&self, interval: StatisticsInterval) -> Result<Vec<BorrowCountBucket>> {
        let (unit, format) = bucket_format(interval);

        let rows = sqlx::query(
            r#"
            SELECT TO_CHAR(bucket, $2) AS label, borrow_count
            FROM (
                SELECT
                    DATE_TRUNC($1, borrow_date AT TIME ZONE 'UTC') AS bucket,
                    COUNT(*)::BIGINT AS borrow_count
                FROM borrowings_view
                GROUP BY 1
            ) buckets
            ORDER BY bucket ASC
            "#,
        )
        .bind(unit)
        .bind(format)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| BorrowCountBucket {
                label: row.get("label"),
                borrow_count: row.get("borrow_count"),
            })
            .collect())
    }

    async fn get_top_borrowed_books(&self, limit: u32) -> Result<Vec<TopBorrowedBook>> {
        let rows = sqlx::query(
            r#"
            SELECT
                book_id,
                MAX(book_title) AS title,
                SUM(quantity)::BIGINT AS total_borrowed
            FROM borrowing_line_items_view
            GROUP BY book_id
            ORDER BY total_borrowed DESC, title ASC, book_id ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TopBorrowedBook {
                book_id: BookId::from_uuid(row.get("book_id")),
                title: row.get("title"),
                total_borrowed: row.get("total_borrowed"),
            })
            .collect())
    }
}
