use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{CardNumber, MaxBooksAllowed};

/// 図書カード
///
/// 会員管理コンテキストが所有するエンティティ。貸出コンテキストは
/// 貸出可否の判定（ロック、有効期限、貸出上限）にのみ使用する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryCard {
    pub card_number: CardNumber,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub holder_name: String,
    pub address: String,
    pub max_books_allowed: MaxBooksAllowed,
    pub is_locked: bool,
}

impl LibraryCard {
    /// 指定日時点で有効期限切れか
    ///
    /// 有効期限日の当日までは有効。
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        date > self.expiry_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(expiry_date: NaiveDate) -> LibraryCard {
        LibraryCard {
            card_number: CardNumber::new("LC-100").unwrap(),
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expiry_date,
            holder_name: "Nguyen Van A".to_string(),
            address: "12 Le Loi".to_string(),
            max_books_allowed: MaxBooksAllowed::new(3).unwrap(),
            is_locked: false,
        }
    }

    #[test]
    fn test_card_valid_on_expiry_date() {
        let expiry = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert!(!card(expiry).is_expired_on(expiry));
    }

    #[test]
    fn test_card_expired_day_after_expiry_date() {
        let expiry = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let next_day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(card(expiry).is_expired_on(next_day));
    }

    #[test]
    fn test_card_deserialize_rejects_zero_quota() {
        let json = serde_json::json!({
            "card_number": "LC-100",
            "issue_date": "2024-01-01",
            "expiry_date": "2025-01-01",
            "holder_name": "Tran Thi B",
            "address": "1 Hai Ba Trung",
            "max_books_allowed": 0,
            "is_locked": false
        });
        let result: Result<LibraryCard, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
