use crate::domain::value_objects::BookId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 集計の時間単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsInterval {
    Week,
    Month,
    Year,
}

impl StatisticsInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticsInterval::Week => "week",
            StatisticsInterval::Month => "month",
            StatisticsInterval::Year => "year",
        }
    }
}

impl std::str::FromStr for StatisticsInterval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "week" => Ok(StatisticsInterval::Week),
            "month" => Ok(StatisticsInterval::Month),
            "year" => Ok(StatisticsInterval::Year),
            _ => Err(format!("Invalid statistics interval: {}", s)),
        }
    }
}

/// 時間区間ごとの貸出件数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowCountBucket {
    /// 区間ラベル（週: `2024-W07`、月: `2024-02`、年: `2024`）
    pub label: String,
    pub borrow_count: i64,
}

/// 貸出数ランキングの1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopBorrowedBook {
    pub book_id: BookId,
    pub title: String,
    pub total_borrowed: i64,
}

/// 統計集計ポート
///
/// 集計そのものは外部（データストア側）で行われる。
#[async_trait]
pub trait StatisticsSource: Send + Sync {
    /// 区間ごとの貸出件数を時間の昇順で返す
    ///
    /// 貸出のない区間は含まれない（連続性を前提にしないこと）。
    async fn get_statistics(&self, interval: StatisticsInterval) -> Result<Vec<BorrowCountBucket>>;

    /// 貸出数の多い順に最大`limit`件の書籍を返す
    ///
    /// 同数の場合はタイトル、書籍IDの順で並べる。
    async fn get_top_borrowed_books(&self, limit: u32) -> Result<Vec<TopBorrowedBook>>;
}
