use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{BookId, MaxBooksAllowed, Quantity, QuotaViolation};

/// 貸出対象として選択された書籍と数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSelection {
    pub book_id: BookId,
    pub quantity: Quantity,
}

/// 同じ書籍の選択を1件にまとめる
///
/// 数量は合算し、最初に現れた順序を保つ。
/// 合算した数量がu32に収まらない場合はNone。
/// `evaluate_selection`を通過した選択は在庫数以下なので必ず収まる。
pub fn merge_selections(selections: &[BookSelection]) -> Option<Vec<BookSelection>> {
    let mut merged: Vec<BookSelection> = Vec::with_capacity(selections.len());
    for selection in selections {
        match merged.iter_mut().find(|m| m.book_id == selection.book_id) {
            Some(existing) => existing.quantity = existing.quantity.checked_add(selection.quantity)?,
            None => merged.push(*selection),
        }
    }
    Some(merged)
}

/// 純粋関数：選択内容が図書カードで貸出可能か評価する
///
/// ビジネスルール：
/// - 1冊以上選択されていること（EmptySelection）
/// - 書籍ごとの要求数量が在庫数以下であること（InsufficientStock）
/// - 要求数量の合計がカードの貸出上限以下であること（QuotaExceeded）
///
/// 違反は途中で打ち切らず、上記の順にすべて収集して返す。
/// 在庫は呼び出し側から渡される。`stock`に存在しない書籍は在庫0として扱う。
///
/// 副作用なし。
pub fn evaluate_selection(
    max_books_allowed: MaxBooksAllowed,
    selections: &[BookSelection],
    stock: &HashMap<BookId, u32>,
) -> Result<(), Vec<QuotaViolation>> {
    let mut violations = Vec::new();

    if selections.is_empty() {
        violations.push(QuotaViolation::EmptySelection);
    }

    // 書籍ごとの要求数量（同じ書籍が複数回選ばれても合計で判定する）
    let mut per_book: Vec<(BookId, u64)> = Vec::new();
    for selection in selections {
        let requested = u64::from(selection.quantity.value());
        match per_book.iter_mut().find(|(id, _)| *id == selection.book_id) {
            Some((_, total)) => *total += requested,
            None => per_book.push((selection.book_id, requested)),
        }
    }

    for (book_id, requested) in &per_book {
        let available = stock.get(book_id).copied().unwrap_or(0);
        if *requested > u64::from(available) {
            violations.push(QuotaViolation::InsufficientStock {
                book_id: *book_id,
                requested: *requested,
                available,
            });
        }
    }

    let total: u64 = per_book.iter().map(|(_, requested)| requested).sum();
    let allowed = max_books_allowed.value();
    if total > u64::from(allowed) {
        violations.push(QuotaViolation::QuotaExceeded {
            requested: total,
            allowed,
        });
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max(n: u32) -> MaxBooksAllowed {
        MaxBooksAllowed::new(n).unwrap()
    }

    fn select(book_id: BookId, quantity: u32) -> BookSelection {
        BookSelection {
            book_id,
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    #[test]
    fn test_accepts_selection_within_stock_and_quota() {
        let x = BookId::new();
        let y = BookId::new();
        let stock = HashMap::from([(x, 5), (y, 2)]);

        let result = evaluate_selection(max(3), &[select(x, 2), select(y, 1)], &stock);
        assert!(result.is_ok());
    }

    #[test]
    fn test_empty_selection() {
        let result = evaluate_selection(max(3), &[], &HashMap::new());
        assert_eq!(result.unwrap_err(), vec![QuotaViolation::EmptySelection]);
    }

    #[test]
    fn test_quota_exceeded_by_one_for_every_limit() {
        for n in 1..=10 {
            let book = BookId::new();
            let stock = HashMap::from([(book, 100)]);

            let result = evaluate_selection(max(n), &[select(book, n + 1)], &stock);
            assert_eq!(
                result.unwrap_err(),
                vec![QuotaViolation::QuotaExceeded {
                    requested: u64::from(n + 1),
                    allowed: n,
                }]
            );

            // ちょうど上限までは許可される
            assert!(evaluate_selection(max(n), &[select(book, n)], &stock).is_ok());
        }
    }

    #[test]
    fn test_insufficient_stock_by_one_for_every_quantity() {
        for q in 0..10u32 {
            let book = BookId::new();
            let stock = HashMap::from([(book, q)]);

            let result = evaluate_selection(max(100), &[select(book, q + 1)], &stock);
            assert_eq!(
                result.unwrap_err(),
                vec![QuotaViolation::InsufficientStock {
                    book_id: book,
                    requested: u64::from(q + 1),
                    available: q,
                }]
            );
        }
    }

    #[test]
    fn test_quota_counts_sum_of_quantities_not_distinct_books() {
        let a = BookId::new();
        let b = BookId::new();
        let stock = HashMap::from([(a, 10), (b, 10)]);

        // 2冊の異なる書籍だが数量の合計は4
        let result = evaluate_selection(max(3), &[select(a, 2), select(b, 2)], &stock);
        assert_eq!(
            result.unwrap_err(),
            vec![QuotaViolation::QuotaExceeded {
                requested: 4,
                allowed: 3,
            }]
        );
    }

    #[test]
    fn test_collects_all_violations_in_one_pass() {
        let a = BookId::new();
        let b = BookId::new();
        let stock = HashMap::from([(a, 1), (b, 1)]);

        let result = evaluate_selection(max(2), &[select(a, 2), select(b, 3)], &stock);
        assert_eq!(
            result.unwrap_err(),
            vec![
                QuotaViolation::InsufficientStock {
                    book_id: a,
                    requested: 2,
                    available: 1,
                },
                QuotaViolation::InsufficientStock {
                    book_id: b,
                    requested: 3,
                    available: 1,
                },
                QuotaViolation::QuotaExceeded {
                    requested: 5,
                    allowed: 2,
                },
            ]
        );
    }

    #[test]
    fn test_unknown_book_treated_as_out_of_stock() {
        let book = BookId::new();
        let result = evaluate_selection(max(5), &[select(book, 1)], &HashMap::new());
        assert_eq!(
            result.unwrap_err(),
            vec![QuotaViolation::InsufficientStock {
                book_id: book,
                requested: 1,
                available: 0,
            }]
        );
    }

    #[test]
    fn test_duplicate_selections_checked_against_stock_together() {
        let book = BookId::new();
        let stock = HashMap::from([(book, 2)]);

        let result = evaluate_selection(max(5), &[select(book, 1), select(book, 2)], &stock);
        assert_eq!(
            result.unwrap_err(),
            vec![QuotaViolation::InsufficientStock {
                book_id: book,
                requested: 3,
                available: 2,
            }]
        );
    }

    #[test]
    fn test_merge_selections_keeps_first_seen_order() {
        let a = BookId::new();
        let b = BookId::new();

        let merged = merge_selections(&[select(a, 1), select(b, 2), select(a, 3)]);
        assert_eq!(merged, Some(vec![select(a, 4), select(b, 2)]));
    }

    #[test]
    fn test_duplicate_selections_beyond_u32_are_rejected_not_truncated() {
        let book = BookId::new();
        let stock = HashMap::from([(book, u32::MAX)]);
        let selections = [select(book, u32::MAX), select(book, 1)];

        let result = evaluate_selection(max(u32::MAX), &selections, &stock);
        assert_eq!(
            result.unwrap_err(),
            vec![
                QuotaViolation::InsufficientStock {
                    book_id: book,
                    requested: u64::from(u32::MAX) + 1,
                    available: u32::MAX,
                },
                QuotaViolation::QuotaExceeded {
                    requested: u64::from(u32::MAX) + 1,
                    allowed: u32::MAX,
                },
            ]
        );
        assert_eq!(merge_selections(&selections), None);
    }

    #[test]
    fn test_violation_messages_are_distinct() {
        let book = BookId::new();
        let messages = [
            QuotaViolation::EmptySelection.to_string(),
            QuotaViolation::InsufficientStock {
                book_id: book,
                requested: 2,
                available: 1,
            }
            .to_string(),
            QuotaViolation::QuotaExceeded {
                requested: 4,
                allowed: 3,
            }
            .to_string(),
        ];
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert!(messages[1].contains(&book.to_string()));
        assert!(messages[2].contains('4') && messages[2].contains('3'));
    }
}
