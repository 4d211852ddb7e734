use crate::ports::{BorrowCountBucket, StatisticsInterval, TopBorrowedBook};

use super::borrowing_service::ServiceDependencies;
use super::errors::{BorrowingApplicationError, Result};

/// ランキングで返す最大件数
pub const MAX_TOP_BOOKS: u32 = 100;

/// 区間ごとの貸出件数を取得する
///
/// 集計は統計ソース側で行われ、ここでは受け渡すのみ。
pub async fn borrowing_statistics(
    deps: &ServiceDependencies,
    interval: StatisticsInterval,
) -> Result<Vec<BorrowCountBucket>> {
    deps.statistics_source
        .get_statistics(interval)
        .await
        .map_err(BorrowingApplicationError::StatisticsError)
}

/// 貸出数の多い書籍を取得する
///
/// `limit`が0なら問い合わせずに空を返す。上限は`MAX_TOP_BOOKS`に丸める。
pub async fn top_borrowed_books(
    deps: &ServiceDependencies,
    limit: u32,
) -> Result<Vec<TopBorrowedBook>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    deps.statistics_source
        .get_top_borrowed_books(limit.min(MAX_TOP_BOOKS))
        .await
        .map_err(BorrowingApplicationError::StatisticsError)
}
