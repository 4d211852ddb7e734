pub mod book_service;
pub mod borrowing_read_model;
pub mod event_store;
pub mod library_card_service;
pub mod statistics_source;

pub use book_service::*;
pub use borrowing_read_model::*;
pub use event_store::*;
pub use library_card_service::*;
pub use statistics_source::*;
