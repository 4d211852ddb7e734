mod borrowing_service;
mod errors;
mod statistics;

pub use borrowing_service::{
    ServiceDependencies, count_unreturned_books, create_borrowing, return_all, return_line_item,
};
pub use errors::{BorrowingApplicationError, Result};
pub use statistics::{MAX_TOP_BOOKS, borrowing_statistics, top_borrowed_books};
